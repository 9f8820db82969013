//! The `utils` module provides shared definitions used across the broker:
//! error types for connections and startup, and logging setup.

pub mod error;
pub mod logging;
