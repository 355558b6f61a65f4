//! The service controller: lifecycle state machine, process handle, and
//! exit detection.
//!
//! One `Service` wraps one external executable. All lifecycle operations
//! route teardown through a single termination routine guarded by the
//! runtime generation counter, so the asynchronous exit watcher and
//! caller-initiated stops cannot double-fire the stop transition.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::process::Child;
use tracing::{debug, info, warn};

use svcwrap_common::ServiceResult;
use svcwrap_process::{delay, send_signal, spawn_command, Signal};
use svcwrap_state::ServiceState;
use svcwrap_tail::{LogSink, LogTailer};

use crate::config::{ServiceConfig, ServiceOptions};
use crate::events::{EventHooks, ServiceEvent};

/// Point-in-time snapshot of a service for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub start_count: u32,
}

/// Supervisor for a single external process.
///
/// Cheap to clone; clones share the same underlying service. A service is
/// created once with fixed configuration and driven through
/// start/stop/restart/kill any number of times; it is never reused for a
/// different command.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: ServiceConfig,
    hooks: EventHooks,
    state: Mutex<ServiceState>,
    runtime: Mutex<Runtime>,
    tailer: Option<Arc<LogTailer>>,
}

/// Mutable per-generation runtime state.
///
/// `epoch` increments on every spawn and every teardown; an exit watcher
/// carrying a stale epoch has been superseded and must do nothing.
#[derive(Default)]
struct Runtime {
    epoch: u64,
    pid: Option<u32>,
    sink: Option<LogSink>,
    started_at: Option<DateTime<Utc>>,
    start_count: u32,
}

impl Service {
    /// Construct a service.
    ///
    /// With a command the service lands in `Ready` and fires `on_ready`.
    /// Without one it lands in `Undefined`: permanently inert, every
    /// lifecycle method a silent no-op, no event ever fired.
    pub fn new(options: ServiceOptions) -> Self {
        let (config, hooks) = options.normalize();

        let tailer = config
            .log
            .as_ref()
            .map(|log| Arc::new(LogTailer::new(log.path.clone(), log.print_ttl)));

        let state = if config.command.is_some() {
            ServiceState::Ready
        } else {
            warn!(
                service = %config.name,
                "constructed without a command; service is permanently inert"
            );
            ServiceState::Undefined
        };

        let inner = Arc::new(ServiceInner {
            config,
            hooks,
            state: Mutex::new(state),
            runtime: Mutex::new(Runtime::default()),
            tailer,
        });

        if state == ServiceState::Ready {
            inner.fire(ServiceEvent::Ready);
        }
        Self { inner }
    }

    /// Start the service with the configured warm-up wait.
    pub async fn start(&self) -> ServiceResult<()> {
        self.start_after(None).await
    }

    /// Start the service, overriding the warm-up wait.
    ///
    /// An unspecified or zero `wait` falls back to the configured
    /// `start_wait`. The caller is suspended for the warm-up only; the
    /// child keeps initializing on its own.
    pub async fn start_after(&self, wait: Option<Duration>) -> ServiceResult<()> {
        if !self.state().accepts_control() {
            debug!(service = %self.inner.config.name, "start ignored on undefined service");
            return Ok(());
        }
        self.launch(wait).await
    }

    /// Stop the service.
    ///
    /// Runs the termination routine, then transitions to `Stopped` and
    /// fires `on_stop` unless the exit watcher got there first. Calling
    /// stop on an already-stopped service is a no-op success.
    pub async fn stop(&self) -> ServiceResult<()> {
        if !self.state().accepts_control() {
            debug!(service = %self.inner.config.name, "stop ignored on undefined service");
            return Ok(());
        }

        self.inner.teardown(Signal::default());
        if self.inner.enter_stopped() {
            info!(service = %self.inner.config.name, "service stopped");
            self.inner.fire(ServiceEvent::Stop);
        }
        Ok(())
    }

    /// Restart the service with the configured warm-up wait.
    pub async fn restart(&self) -> ServiceResult<()> {
        self.restart_after(None).await
    }

    /// Restart the service, overriding the warm-up wait.
    ///
    /// Observably transitions through `Restarting` before settling on
    /// `Started`. A restart issued during a previous start's warm-up
    /// supersedes that start.
    pub async fn restart_after(&self, wait: Option<Duration>) -> ServiceResult<()> {
        if !self.state().accepts_control() {
            debug!(service = %self.inner.config.name, "restart ignored on undefined service");
            return Ok(());
        }

        *self.inner.state.lock() = ServiceState::Restarting;
        self.inner.teardown(Signal::default());
        self.inner.fire(ServiceEvent::Restart);
        self.launch(wait).await
    }

    /// Send a signal to the child and release runtime resources.
    ///
    /// This is the raw termination primitive: it neither changes state nor
    /// fires callbacks. Follow up with [`Service::stop`] to record the
    /// stop transition.
    pub async fn kill(&self, signal: Option<Signal>) -> ServiceResult<()> {
        if !self.state().accepts_control() {
            debug!(service = %self.inner.config.name, "kill ignored on undefined service");
            return Ok(());
        }
        self.inner.teardown(signal.unwrap_or_default());
        Ok(())
    }

    /// Toggle live-tailing of the log file to stdout.
    ///
    /// Enabling while disarmed starts a fresh poll loop that continues
    /// from the already-streamed offset. No-op when no log file was
    /// configured.
    pub fn print(&self, enable: bool) {
        if !self.state().accepts_control() {
            debug!(service = %self.inner.config.name, "print ignored on undefined service");
            return;
        }
        let Some(tailer) = &self.inner.tailer else {
            debug!(
                service = %self.inner.config.name,
                "print toggle ignored; no log file configured"
            );
            return;
        };
        if enable {
            ServiceInner::arm_tailer(&self.inner, tailer);
        } else {
            tailer.disarm();
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        *self.inner.state.lock()
    }

    /// PID of the running child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.inner.runtime.lock().pid
    }

    /// Display name of the service.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Tail counters for the configured log file, if any.
    pub fn tail_stats(&self) -> Option<svcwrap_tail::TailStats> {
        self.inner.tailer.as_ref().map(|t| t.stats())
    }

    /// Diagnostic snapshot.
    pub fn status(&self) -> ServiceStatus {
        let runtime = self.inner.runtime.lock();
        ServiceStatus {
            name: self.inner.config.name.clone(),
            state: *self.inner.state.lock(),
            pid: runtime.pid,
            started_at: runtime.started_at,
            start_count: runtime.start_count,
        }
    }

    /// Shared start path for `start` and `restart`.
    async fn launch(&self, wait: Option<Duration>) -> ServiceResult<()> {
        let inner = &self.inner;
        let Some(command) = inner.config.command.clone() else {
            return Ok(());
        };

        inner.fire(ServiceEvent::Start);

        // Fresh log generation: stop any running tail loop, zero its
        // offsets, truncate the file.
        if let Some(tailer) = &inner.tailer {
            tailer.disarm();
            tailer.reset_stats();
        }
        let sink = match &inner.config.log {
            Some(log) => Some(LogSink::open(&log.path)?),
            None => None,
        };

        let child = spawn_command(
            &command,
            &inner.config.args,
            sink.as_ref().map(|s| s.handle()),
            &inner.config.spawn,
        )?;
        let pid = child.id();

        let epoch = {
            let mut runtime = inner.runtime.lock();
            runtime.epoch += 1;
            runtime.pid = pid;
            runtime.sink = sink;
            runtime.started_at = Some(Utc::now());
            runtime.start_count += 1;
            runtime.epoch
        };

        self.spawn_exit_watcher(child, epoch);

        if let (Some(tailer), Some(log)) = (&inner.tailer, &inner.config.log) {
            if log.print {
                ServiceInner::arm_tailer(inner, tailer);
            }
        }

        let warmup = wait
            .filter(|w| !w.is_zero())
            .unwrap_or(inner.config.start_wait);
        if !warmup.is_zero() {
            debug!(
                service = %inner.config.name,
                wait_ms = warmup.as_millis() as u64,
                "waiting for service warm-up"
            );
            delay::delay(warmup).await;
        }

        *inner.state.lock() = ServiceState::Started;
        info!(
            service = %inner.config.name,
            pid = pid.unwrap_or(0),
            "service started"
        );
        Ok(())
    }

    /// Watch for the child ending on its own.
    ///
    /// A child can exit without the supervisor initiating it; this task
    /// reaps it and, unless the runtime generation moved on, records the
    /// stop transition.
    fn spawn_exit_watcher(&self, mut child: Child, epoch: u64) {
        let weak = Arc::downgrade(&self.inner);
        let name = self.inner.config.name.clone();

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(service = %name, "process exited cleanly");
                }
                Ok(status) => {
                    warn!(
                        service = %name,
                        code = ?status.code(),
                        "process exited with non-zero status"
                    );
                }
                Err(e) => {
                    warn!(service = %name, error = %e, "failed to await process exit");
                }
            }

            if let Some(inner) = weak.upgrade() {
                ServiceInner::handle_child_exit(&inner, epoch);
            }
        });
    }
}

impl ServiceInner {
    fn fire(&self, event: ServiceEvent) {
        self.hooks.fire(event, &self.config.name);
    }

    /// Termination routine shared by stop, restart, kill, and the exit
    /// watcher: advance the generation, signal the child (benign races
    /// swallowed), release the log write handle, cancel the tail timer.
    fn teardown(&self, signal: Signal) {
        let (pid, sink) = {
            let mut runtime = self.runtime.lock();
            runtime.epoch += 1;
            runtime.started_at = None;
            (runtime.pid.take(), runtime.sink.take())
        };
        if sink.is_some() {
            debug!(service = %self.config.name, "log write handle released");
        }

        if let Some(pid) = pid {
            debug!(service = %self.config.name, pid, %signal, "signalling child");
            if let Err(e) = send_signal(pid, signal) {
                // Teardown must not fail over an unexpected signalling
                // problem; the exit watcher still reaps the child.
                warn!(service = %self.config.name, pid, error = %e, "signal delivery failed");
            }
        }

        if let Some(tailer) = &self.tailer {
            tailer.disarm();
        }
    }

    /// Claim the stop transition. Returns false if some other path (the
    /// exit watcher, an earlier stop) already performed it.
    fn enter_stopped(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ServiceState::Stopped {
            false
        } else {
            *state = ServiceState::Stopped;
            true
        }
    }

    fn handle_child_exit(inner: &Arc<ServiceInner>, epoch: u64) {
        {
            let runtime = inner.runtime.lock();
            if runtime.epoch != epoch {
                // An explicit stop/restart/kill already tore this
                // generation down.
                return;
            }
        }

        inner.teardown(Signal::default());
        if inner.enter_stopped() {
            info!(service = %inner.config.name, "service stopped (process exited on its own)");
            inner.fire(ServiceEvent::Stop);
        }
    }

    fn arm_tailer(inner: &Arc<ServiceInner>, tailer: &Arc<LogTailer>) {
        let weak: Weak<ServiceInner> = Arc::downgrade(inner);
        tailer.arm(move || {
            weak.upgrade()
                .map(|inner| *inner.state.lock())
                .unwrap_or(ServiceState::Stopped)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn hook_counter() -> (Arc<AtomicU32>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&count);
        (count, move || {
            counted.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_undefined_service_is_inert() {
        let (ready, on_ready) = hook_counter();
        let (stop, on_stop) = hook_counter();

        let service = Service::new(
            ServiceOptions::default()
                .on_ready(on_ready)
                .on_stop(on_stop),
        );

        assert_eq!(service.state(), ServiceState::Undefined);
        service.start().await.unwrap();
        service.stop().await.unwrap();
        service.restart().await.unwrap();
        service.kill(None).await.unwrap();
        assert_eq!(service.state(), ServiceState::Undefined);
        assert_eq!(service.pid(), None);
        assert_eq!(ready.load(Ordering::SeqCst), 0);
        assert_eq!(stop.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_construction_fires_on_ready() {
        let (ready, on_ready) = hook_counter();
        let service = Service::new(ServiceOptions::new("true").on_ready(on_ready));
        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(ready.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_print_without_log_file_is_noop() {
        let service = Service::new(ServiceOptions::new("true"));
        service.print(true);
        service.print(false);
    }

    #[tokio::test]
    async fn test_initial_status_snapshot() {
        let service = Service::new(ServiceOptions::new("true").name("probe"));
        let status = service.status();
        assert_eq!(status.name, "probe");
        assert_eq!(status.state, ServiceState::Ready);
        assert_eq!(status.pid, None);
        assert_eq!(status.start_count, 0);
        assert!(status.started_at.is_none());
    }
}
