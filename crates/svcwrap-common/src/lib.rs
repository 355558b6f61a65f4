//! # svcwrap-common
//!
//! Shared error types for the svcwrap supervisor.
//!
//! Every other svcwrap crate builds on the `ServiceError` taxonomy defined
//! here; lifecycle failures propagate to the caller that triggered them,
//! while log-tailing failures stay local to the tail loop.

pub mod errors;

pub use errors::{ServiceError, ServiceResult};
