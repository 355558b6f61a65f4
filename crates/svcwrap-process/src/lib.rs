//! # svcwrap-process
//!
//! Low-level process primitives for the svcwrap supervisor.
//!
//! This crate provides the backend the service controller relies on but
//! does not implement itself:
//! - Process spawning with redirected standard I/O
//! - Signal delivery with benign-race handling
//! - Process existence checking
//! - Delay primitives (asynchronous and blocking)

pub mod delay;
pub mod execute;
pub mod signal;

pub use execute::{spawn_command, SpawnOptions};
pub use signal::{process_exists, send_signal, Signal};
