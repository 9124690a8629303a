//! Logging setup and event macros

pub mod logging;

pub use logging::*;
