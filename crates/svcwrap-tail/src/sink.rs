//! Log sink: the write handle the child's output is redirected into.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use svcwrap_common::{ServiceError, ServiceResult};

/// Write handle for a service's log file.
///
/// The file is truncated on open: each service start begins a fresh log.
/// Tail offsets are therefore only valid for the sink generation they were
/// taken against, which is why the controller resets the tail counters on
/// every start.
#[derive(Debug)]
pub struct LogSink {
    file: File,
    path: PathBuf,
}

impl LogSink {
    /// Open (and truncate) the log file, creating parent directories.
    pub fn open(path: &Path) -> ServiceResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ServiceError::log_io(
                        path.display().to_string(),
                        format!("failed to create log directory: {}", e),
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                ServiceError::log_io(
                    path.display().to_string(),
                    format!("failed to open log file: {}", e),
                )
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Borrow the underlying write handle.
    pub fn handle(&self) -> &File {
        &self.file
    }

    /// Duplicate the underlying handle for redirecting a child stream.
    pub fn duplicate(&self) -> ServiceResult<File> {
        self.file.try_clone().map_err(|e| {
            ServiceError::log_io(
                self.path.display().to_string(),
                format!("failed to duplicate log handle: {}", e),
            )
        })
    }

    /// Path of the log file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_truncates_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc.log");
        std::fs::write(&path, "stale content from a previous run").unwrap();

        let _sink = LogSink::open(&path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/svc.log");

        let sink = LogSink::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(sink.path(), path);
    }

    #[test]
    fn test_duplicated_handles_share_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc.log");

        let sink = LogSink::open(&path).unwrap();
        let mut a = sink.duplicate().unwrap();
        let mut b = sink.duplicate().unwrap();
        a.write_all(b"one ").unwrap();
        b.write_all(b"two").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one two");
    }
}
