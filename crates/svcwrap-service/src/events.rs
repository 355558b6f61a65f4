//! Named lifecycle event hooks.
//!
//! Exactly one callback is retained per event; unset entries default to a
//! no-op. Hooks are fixed at construction time and never rebound.

use std::fmt;

use tracing::debug;

/// A zero-argument lifecycle callback.
pub type Hook = Box<dyn Fn() + Send + Sync>;

/// Lifecycle events a service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    Ready,
    Start,
    Stop,
    Restart,
}

impl ServiceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceEvent::Ready => "ready",
            ServiceEvent::Start => "start",
            ServiceEvent::Stop => "stop",
            ServiceEvent::Restart => "restart",
        }
    }
}

/// Callback table for the four lifecycle events.
#[derive(Default)]
pub struct EventHooks {
    pub(crate) on_ready: Option<Hook>,
    pub(crate) on_start: Option<Hook>,
    pub(crate) on_stop: Option<Hook>,
    pub(crate) on_restart: Option<Hook>,
}

impl EventHooks {
    /// Invoke the hook registered for `event`, if any.
    pub(crate) fn fire(&self, event: ServiceEvent, service: &str) {
        debug!(service, event = event.as_str(), "lifecycle event");
        let hook = match event {
            ServiceEvent::Ready => &self.on_ready,
            ServiceEvent::Start => &self.on_start,
            ServiceEvent::Stop => &self.on_stop,
            ServiceEvent::Restart => &self.on_restart,
        };
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHooks")
            .field("on_ready", &self.on_ready.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .field("on_restart", &self.on_restart.is_some())
            .finish()
    }
}
