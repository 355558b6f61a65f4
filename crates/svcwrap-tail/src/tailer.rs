//! Live-tail loop: forwards newly written log bytes to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use svcwrap_state::ServiceState;

/// Fixed cadence of the tail poll loop.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default idle budget: consecutive no-growth cycles before the tailer
/// stops rescheduling itself.
pub const DEFAULT_PRINT_TTL: RetryTtl = RetryTtl::Cycles(4);

/// Idle retry budget for the tail loop.
///
/// Deserializes from a cycle count (`4`) or the string `"infinite"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTtl {
    /// Disarm after this many consecutive idle cycles.
    Cycles(u32),
    /// Never give up on a quiet file.
    Infinite,
}

impl Default for RetryTtl {
    fn default() -> Self {
        DEFAULT_PRINT_TTL
    }
}

impl std::str::FromStr for RetryTtl {
    type Err = svcwrap_common::ServiceError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let trimmed = spec.trim();
        if trimmed.eq_ignore_ascii_case("infinite") {
            return Ok(RetryTtl::Infinite);
        }
        trimmed
            .parse::<u32>()
            .map(RetryTtl::Cycles)
            .map_err(|_| {
                svcwrap_common::ServiceError::configuration(format!(
                    "invalid print TTL {:?} (expected a cycle count or \"infinite\")",
                    spec
                ))
            })
    }
}

impl<'de> Deserialize<'de> for RetryTtl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Cycles(u32),
            Word(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Cycles(n) => Ok(RetryTtl::Cycles(n)),
            Raw::Word(w) if w.eq_ignore_ascii_case("infinite") => Ok(RetryTtl::Infinite),
            Raw::Word(w) => Err(D::Error::custom(format!(
                "invalid print TTL {:?} (expected a cycle count or \"infinite\")",
                w
            ))),
        }
    }
}

/// Byte counters for one tail session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailStats {
    /// Bytes already forwarded to stdout.
    pub streamed: u64,
    /// Snapshot of `streamed` at the start of the previous cycle.
    pub tail: u64,
    /// Consecutive idle cycles observed.
    pub retries: u32,
}

/// Timer-driven tail loop over a service's log file.
///
/// Armed by the controller when a log path is configured and print mode is
/// enabled. Each cycle reads the bytes written since the last cycle and
/// forwards them to stdout; a configurable number of consecutive idle
/// cycles disarms the loop so a quiet file does not pin a timer and a read
/// handle forever.
pub struct LogTailer {
    path: PathBuf,
    ttl: RetryTtl,
    poll_interval: Duration,
    stats: Mutex<TailStats>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl LogTailer {
    pub fn new(path: PathBuf, ttl: RetryTtl) -> Self {
        Self {
            path,
            ttl,
            poll_interval: POLL_INTERVAL,
            stats: Mutex::new(TailStats::default()),
            cancel: Mutex::new(None),
        }
    }

    /// Override the poll cadence. Intended for tests; production tailing
    /// always runs at [`POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Snapshot of the current byte counters.
    pub fn stats(&self) -> TailStats {
        *self.stats.lock()
    }

    /// Reset all counters. Called by the controller at each service start,
    /// when the log file is truncated and offsets restart from zero.
    pub fn reset_stats(&self) {
        *self.stats.lock() = TailStats::default();
    }

    /// Whether a poll loop is currently scheduled.
    pub fn is_armed(&self) -> bool {
        self.cancel
            .lock()
            .as_ref()
            .map(|token| !token.is_cancelled())
            .unwrap_or(false)
    }

    /// Start the poll loop. No-op if already armed.
    ///
    /// `gate` reports the owning service's state; the loop reschedules
    /// only while it returns `Ready` or `Started`. Re-arming grants a
    /// fresh idle budget but keeps the streamed-byte offset, so a
    /// re-enabled tailer continues where it left off.
    pub fn arm<F>(self: &Arc<Self>, gate: F)
    where
        F: Fn() -> ServiceState + Send + Sync + 'static,
    {
        let token = {
            let mut slot = self.cancel.lock();
            if slot.as_ref().map(|t| !t.is_cancelled()).unwrap_or(false) {
                return;
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        self.stats.lock().retries = 0;

        let tailer = Arc::clone(self);
        tokio::spawn(async move {
            tailer.run(gate, token).await;
        });
        debug!(path = %self.path.display(), "log tailer armed");
    }

    /// Cancel the pending poll timer, if any.
    pub fn disarm(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
            debug!(path = %self.path.display(), "log tailer disarmed");
        }
    }

    async fn run<F>(self: Arc<Self>, gate: F, token: CancellationToken)
    where
        F: Fn() -> ServiceState + Send + Sync + 'static,
    {
        loop {
            // Cadence first: each cycle fires one poll interval after the
            // previous one, so an arm issued mid-transition polls against
            // the settled state.
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            // Snapshot the previous offset, then forward anything written
            // since.
            let offset = {
                let mut stats = self.stats.lock();
                stats.tail = stats.streamed;
                stats.streamed
            };

            let path = self.path.clone();
            let read = tokio::task::spawn_blocking(move || forward_new_bytes(&path, offset)).await;
            let advanced = match read {
                Ok(Ok(n)) => n,
                // A missing or unreadable file fails the cycle silently;
                // the idle budget bounds how long we keep trying.
                Ok(Err(e)) => {
                    debug!(path = %self.path.display(), error = %e, "tail cycle failed");
                    0
                }
                Err(e) => {
                    debug!(error = %e, "tail read task failed");
                    0
                }
            };
            // A cancel may have landed during the read; a superseded loop
            // must not touch counters a newly armed loop now owns.
            if token.is_cancelled() {
                break;
            }
            if advanced > 0 {
                self.stats.lock().streamed += advanced;
            }

            // Idle budget check precedes this cycle's bookkeeping: the
            // budget counts full intervals with no growth.
            if let RetryTtl::Cycles(limit) = self.ttl {
                if self.stats.lock().retries >= limit {
                    debug!(
                        path = %self.path.display(),
                        limit,
                        "idle budget exhausted, tailer going quiet"
                    );
                    break;
                }
            }

            {
                let mut stats = self.stats.lock();
                if stats.streamed > stats.tail {
                    stats.retries = 0;
                } else {
                    stats.retries += 1;
                }
            }

            if !gate().allows_tailing() {
                debug!(path = %self.path.display(), "service no longer active, tailer stopping");
                break;
            }
        }

        // Mark ourselves disarmed so an explicit print(true) can re-arm.
        token.cancel();
    }
}

/// Read all bytes past `offset` and forward them to stdout.
fn forward_new_bytes(path: &Path, offset: u64) -> std::io::Result<u64> {
    use std::io::{Read, Seek, SeekFrom, Write};

    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut buf = Vec::new();
    let count = file.read_to_end(&mut buf)? as u64;
    if count > 0 {
        let mut out = std::io::stdout().lock();
        out.write_all(&buf)?;
        out.flush()?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FAST_POLL: Duration = Duration::from_millis(20);

    fn temp_log(initial: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc.log");
        std::fs::write(&path, initial).unwrap();
        (dir, path)
    }

    async fn settle(cycles: u32) {
        tokio::time::sleep(FAST_POLL * cycles).await;
    }

    #[test]
    fn test_retry_ttl_deserializes_from_number_and_word() {
        let ttl: RetryTtl = serde_yaml::from_str("7").unwrap();
        assert_eq!(ttl, RetryTtl::Cycles(7));
        let ttl: RetryTtl = serde_yaml::from_str("infinite").unwrap();
        assert_eq!(ttl, RetryTtl::Infinite);
        assert!(serde_yaml::from_str::<RetryTtl>("sometimes").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_forwards_available_bytes() {
        let (_dir, path) = temp_log(b"hello");
        let tailer =
            Arc::new(LogTailer::new(path, RetryTtl::Infinite).with_poll_interval(FAST_POLL));
        tailer.arm(|| ServiceState::Started);

        settle(5).await;
        assert_eq!(tailer.stats().streamed, 5);
        tailer.disarm();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_disarms_after_idle_budget() {
        let (_dir, path) = temp_log(b"data");
        let tailer = Arc::new(
            LogTailer::new(path.clone(), RetryTtl::Cycles(2)).with_poll_interval(FAST_POLL),
        );
        tailer.arm(|| ServiceState::Started);

        // First cycle forwards the 4 bytes, then two idle cycles exhaust
        // the budget.
        settle(10).await;
        assert!(!tailer.is_armed());
        assert_eq!(tailer.stats().streamed, 4);

        // Quiet tailer must not resurrect itself on new data.
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"more").unwrap();
        settle(5).await;
        assert_eq!(tailer.stats().streamed, 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_growth_resets_idle_count() {
        let (_dir, path) = temp_log(b"start");
        let tailer =
            Arc::new(LogTailer::new(path.clone(), RetryTtl::Infinite).with_poll_interval(FAST_POLL));
        tailer.arm(|| ServiceState::Started);

        settle(5).await;
        assert!(tailer.stats().retries >= 1);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"-grow").unwrap();
        settle(3).await;
        assert_eq!(tailer.stats().streamed, 10);

        tailer.disarm();
        assert!(!tailer.is_armed());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stops_when_service_not_active() {
        let (_dir, path) = temp_log(b"bytes");
        let tailer =
            Arc::new(LogTailer::new(path, RetryTtl::Infinite).with_poll_interval(FAST_POLL));
        tailer.arm(|| ServiceState::Stopped);

        settle(3).await;
        // One cycle still runs (bytes get forwarded), but the loop must
        // not reschedule against a stopped service.
        assert!(!tailer.is_armed());
        assert_eq!(tailer.stats().streamed, 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rearm_continues_from_previous_offset() {
        let (_dir, path) = temp_log(b"first");
        let tailer = Arc::new(
            LogTailer::new(path.clone(), RetryTtl::Infinite).with_poll_interval(FAST_POLL),
        );
        tailer.arm(|| ServiceState::Started);
        settle(3).await;
        tailer.disarm();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"-second").unwrap();

        tailer.arm(|| ServiceState::Started);
        settle(3).await;
        assert_eq!(tailer.stats().streamed, 12);
        tailer.disarm();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_file_counts_as_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-created.log");
        let tailer = Arc::new(
            LogTailer::new(path, RetryTtl::Cycles(1)).with_poll_interval(FAST_POLL),
        );
        tailer.arm(|| ServiceState::Started);

        settle(8).await;
        assert!(!tailer.is_armed());
        assert_eq!(tailer.stats().streamed, 0);
    }
}
