//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http_source;
pub mod telemetry;
