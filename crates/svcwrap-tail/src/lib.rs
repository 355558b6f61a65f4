//! # svcwrap-tail
//!
//! Log capture and live-tailing for the svcwrap supervisor.
//!
//! Two pieces:
//! - [`LogSink`] — the truncate-on-open write handle the child's standard
//!   I/O is redirected into.
//! - [`LogTailer`] — a timer-driven loop that forwards newly written bytes
//!   of the log file to the supervisor's own stdout, with an idle
//!   retry/backoff budget that bounds how long a quiet file is polled.

pub mod sink;
pub mod tailer;

pub use sink::LogSink;
pub use tailer::{LogTailer, RetryTtl, TailStats, POLL_INTERVAL};
