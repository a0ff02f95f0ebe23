//! Shared leaf code for the Lighthouse services.

pub mod backoff;
pub mod image;
pub mod ports;
pub mod shutdown;
pub mod tracing;
