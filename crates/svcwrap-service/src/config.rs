//! Service configuration and option normalization.
//!
//! `ServiceOptions` is the caller-facing bag: every field optional, serde
//! deserializable (YAML via the CLI), with lifecycle hooks attached
//! through builder-style setters. `normalize()` turns it into the fixed
//! `ServiceConfig` the controller runs on.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use svcwrap_process::SpawnOptions;
use svcwrap_tail::RetryTtl;

use crate::events::EventHooks;

/// Display name used when neither a name nor a command was supplied.
const UNNAMED: &str = "undefined";

/// Caller-facing construction options for a [`crate::Service`].
///
/// `command` is optional but effectively required: constructing without
/// one yields a permanently inert service rather than an error.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceOptions {
    /// Executable name or path.
    pub command: Option<String>,

    /// Ordered arguments for the executable.
    #[serde(default)]
    pub args: Vec<String>,

    /// Display label; defaults to the command.
    pub name: Option<String>,

    /// Warm-up wait in milliseconds before the service reports started.
    #[serde(default)]
    pub start_wait_ms: u64,

    /// Combined-output log file: a bare path or a detailed table.
    pub log_file: Option<LogFileSpec>,

    /// Working directory for the child (pass-through spawn option).
    pub working_directory: Option<PathBuf>,

    /// Extra environment for the child (pass-through spawn option).
    #[serde(default)]
    pub environment: HashMap<String, String>,

    #[serde(skip)]
    pub(crate) hooks: EventHooks,
}

impl ServiceOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Default::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn start_wait(mut self, wait: Duration) -> Self {
        self.start_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn log_file(mut self, spec: LogFileSpec) -> Self {
        self.log_file = Some(spec);
        self
    }

    pub fn on_ready(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_ready = Some(Box::new(hook));
        self
    }

    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_stop = Some(Box::new(hook));
        self
    }

    pub fn on_restart(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_restart = Some(Box::new(hook));
        self
    }

    /// Split into the fixed runtime configuration and the hook table.
    pub(crate) fn normalize(self) -> (ServiceConfig, EventHooks) {
        let name = self
            .name
            .or_else(|| self.command.clone())
            .unwrap_or_else(|| UNNAMED.to_string());

        let config = ServiceConfig {
            name,
            command: self.command,
            args: self.args,
            start_wait: Duration::from_millis(self.start_wait_ms),
            spawn: SpawnOptions {
                working_directory: self.working_directory,
                environment: self.environment,
            },
            log: self.log_file.map(LogFileSpec::normalize),
        };
        (config, self.hooks)
    }
}

/// Log-file setting: a bare path, or a table with print controls.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LogFileSpec {
    /// Just a path; capture only, printing off until enabled explicitly.
    Path(PathBuf),
    /// Path plus tail controls.
    Detailed {
        path: PathBuf,
        print: Option<bool>,
        print_ttl: Option<RetryTtl>,
    },
}

impl LogFileSpec {
    /// Resolve defaults.
    ///
    /// Print mode defaults to on when an idle TTL was explicitly supplied,
    /// otherwise off unless explicitly requested.
    pub fn normalize(self) -> LogConfig {
        match self {
            LogFileSpec::Path(path) => LogConfig {
                path,
                print: false,
                print_ttl: RetryTtl::default(),
            },
            LogFileSpec::Detailed {
                path,
                print,
                print_ttl,
            } => LogConfig {
                path,
                print: print.unwrap_or(print_ttl.is_some()),
                print_ttl: print_ttl.unwrap_or_default(),
            },
        }
    }
}

/// Normalized log-capture configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub path: PathBuf,
    pub print: bool,
    pub print_ttl: RetryTtl,
}

/// Fixed configuration a service runs on; immutable after construction.
#[derive(Debug)]
pub(crate) struct ServiceConfig {
    pub name: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub start_wait: Duration,
    pub spawn: SpawnOptions,
    pub log: Option<LogConfig>,
}
