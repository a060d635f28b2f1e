//! Per-user linear edit history with undo/redo.

pub mod handlers;
pub mod service;
pub mod store;
pub mod timeline;
