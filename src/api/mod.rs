//! HTTP surface: routing, request parsing and the report handlers.

pub mod handlers;
pub mod helpers;
pub mod routes;
pub mod session;
pub mod upload;
pub mod vapt;

pub use routes::{AppState, router};
