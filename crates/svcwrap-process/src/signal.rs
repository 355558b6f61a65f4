//! Signal delivery and process existence checking.
//!
//! Signal sends distinguish benign races from real failures: a process
//! that already exited (or that we lost permission to signal mid-exit)
//! is treated as successfully terminated, not as an error.

use std::str::FromStr;

use svcwrap_common::{ServiceError, ServiceResult};

/// A signal to deliver to a supervised process.
///
/// Parses from a name (`"SIGTERM"`, `"term"`) or a raw signal number
/// (`"15"`). The default signal for teardown is interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
    Kill,
    Hangup,
    Quit,
    User1,
    User2,
    Other(i32),
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Interrupt
    }
}

impl Signal {
    /// The raw POSIX signal number.
    pub fn as_raw(&self) -> i32 {
        match self {
            Signal::Hangup => 1,
            Signal::Interrupt => 2,
            Signal::Quit => 3,
            Signal::Kill => 9,
            Signal::User1 => 10,
            Signal::User2 => 12,
            Signal::Terminate => 15,
            Signal::Other(n) => *n,
        }
    }

    fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Signal::Hangup,
            2 => Signal::Interrupt,
            3 => Signal::Quit,
            9 => Signal::Kill,
            10 => Signal::User1,
            12 => Signal::User2,
            15 => Signal::Terminate,
            n => Signal::Other(n),
        }
    }
}

impl FromStr for Signal {
    type Err = ServiceError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let trimmed = spec.trim();
        if let Ok(raw) = trimmed.parse::<i32>() {
            if raw <= 0 {
                return Err(ServiceError::invalid_signal(spec));
            }
            return Ok(Signal::from_raw(raw));
        }

        let name = trimmed.to_ascii_uppercase();
        let name = name.strip_prefix("SIG").unwrap_or(&name);
        match name {
            "HUP" => Ok(Signal::Hangup),
            "INT" => Ok(Signal::Interrupt),
            "QUIT" => Ok(Signal::Quit),
            "KILL" => Ok(Signal::Kill),
            "USR1" => Ok(Signal::User1),
            "USR2" => Ok(Signal::User2),
            "TERM" => Ok(Signal::Terminate),
            _ => Err(ServiceError::invalid_signal(spec)),
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Hangup => write!(f, "SIGHUP"),
            Signal::Interrupt => write!(f, "SIGINT"),
            Signal::Quit => write!(f, "SIGQUIT"),
            Signal::Kill => write!(f, "SIGKILL"),
            Signal::User1 => write!(f, "SIGUSR1"),
            Signal::User2 => write!(f, "SIGUSR2"),
            Signal::Terminate => write!(f, "SIGTERM"),
            Signal::Other(n) => write!(f, "signal {}", n),
        }
    }
}

/// Send a signal to a process.
///
/// Returns `Ok(())` when the process no longer exists or cannot be
/// signalled due to permissions; both are expected races during teardown
/// and must not surface to the caller.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: Signal) -> ServiceResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let nix_signal = nix::sys::signal::Signal::try_from(signal.as_raw())
        .map_err(|_| ServiceError::invalid_signal(signal.as_raw().to_string()))?;

    match kill(Pid::from_raw(pid as i32), nix_signal) {
        Ok(()) => Ok(()),
        // Already exited, or exiting under another owner.
        Err(Errno::ESRCH) | Err(Errno::EPERM) => {
            tracing::debug!(pid, %signal, "signal target already gone");
            Ok(())
        }
        Err(e) => Err(ServiceError::signal_failed(pid, e.to_string())),
    }
}

#[cfg(not(unix))]
pub fn send_signal(pid: u32, signal: Signal) -> ServiceResult<()> {
    let _ = signal;
    Err(ServiceError::signal_failed(
        pid,
        "signal delivery is not supported on this platform",
    ))
}

/// Check if a process with the given PID exists and is running.
///
/// Non-destructive: sends no signal, only probes for existence.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> ServiceResult<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        // Exists, but owned by someone we cannot signal.
        Err(Errno::EPERM) => Ok(true),
        Err(e) => Err(ServiceError::configuration(format!(
            "failed to check process {}: {}",
            pid, e
        ))),
    }
}

#[cfg(not(unix))]
pub fn process_exists(pid: u32) -> ServiceResult<bool> {
    Err(ServiceError::configuration(format!(
        "process existence check is not supported on this platform (pid {})",
        pid
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("SIGTERM".parse::<Signal>().unwrap(), Signal::Terminate);
        assert_eq!("term".parse::<Signal>().unwrap(), Signal::Terminate);
        assert_eq!("Int".parse::<Signal>().unwrap(), Signal::Interrupt);
        assert_eq!("sigusr1".parse::<Signal>().unwrap(), Signal::User1);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!("9".parse::<Signal>().unwrap(), Signal::Kill);
        assert_eq!("15".parse::<Signal>().unwrap(), Signal::Terminate);
        assert_eq!("31".parse::<Signal>().unwrap(), Signal::Other(31));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("SIGBOGUS".parse::<Signal>().is_err());
        assert!("-3".parse::<Signal>().is_err());
        assert!("0".parse::<Signal>().is_err());
        assert!("".parse::<Signal>().is_err());
    }

    #[test]
    fn test_default_is_interrupt() {
        assert_eq!(Signal::default(), Signal::Interrupt);
        assert_eq!(Signal::default().as_raw(), 2);
    }

    #[test]
    #[cfg(unix)]
    fn test_current_process_exists() {
        assert!(process_exists(std::process::id()).unwrap());
    }

    #[test]
    #[cfg(unix)]
    fn test_signal_to_missing_pid_is_benign() {
        // Unlikely-to-exist PID; ESRCH must be swallowed.
        assert!(send_signal(9_999_999, Signal::Interrupt).is_ok());
    }
}
