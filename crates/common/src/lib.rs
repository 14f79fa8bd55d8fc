pub mod api;
pub mod classify;
pub mod config;
pub mod format;
pub mod logging;
