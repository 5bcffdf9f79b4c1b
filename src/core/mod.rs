//! Configuration and the domain types shared by every report flow.

pub mod config;
pub mod form;
pub mod models;
