//! # svcwrap-service
//!
//! The service controller for the svcwrap supervisor.
//!
//! This crate ties the lifecycle state machine to the process backend and
//! the log-tailing subsystem:
//! - `ServiceOptions` / configuration normalization
//! - Lifecycle event hooks (ready, start, stop, restart)
//! - The `Service` controller: start/stop/restart/kill, exit detection,
//!   and the print toggle for live log tailing

pub mod config;
pub mod events;
pub mod service;

pub use config::{LogConfig, LogFileSpec, ServiceOptions};
pub use events::ServiceEvent;
pub use service::{Service, ServiceStatus};

// Re-exported so embedders only need this crate for everyday use.
pub use svcwrap_process::Signal;
pub use svcwrap_state::ServiceState;
pub use svcwrap_tail::RetryTtl;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
