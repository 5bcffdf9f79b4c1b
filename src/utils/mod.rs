//! Shared helpers for uploads and cell text.

pub mod cells;
pub mod upload;
