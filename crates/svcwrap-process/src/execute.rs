//! Process spawning.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::info;

use svcwrap_common::{ServiceError, ServiceResult};

/// Backend-specific spawn options forwarded verbatim to the child.
///
/// These are pass-through settings the supervisor core does not interpret.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Working directory for the child process.
    pub working_directory: Option<PathBuf>,
    /// Extra environment variables for the child process.
    pub environment: HashMap<String, String>,
}

/// Spawn a child process with standard I/O redirected to the given sink.
///
/// Stdin is always closed. When `output` is provided, stdout and stderr
/// both write to duplicated handles of that file; otherwise the child's
/// output is discarded.
pub fn spawn_command(
    program: &str,
    args: &[String],
    output: Option<&File>,
    options: &SpawnOptions,
) -> ServiceResult<Child> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(ref dir) = options.working_directory {
        cmd.current_dir(dir);
    }
    for (key, value) in &options.environment {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    match output {
        Some(sink) => {
            let stdout = sink
                .try_clone()
                .map_err(|e| ServiceError::spawn_failed(program, e.to_string()))?;
            let stderr = sink
                .try_clone()
                .map_err(|e| ServiceError::spawn_failed(program, e.to_string()))?;
            cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
        }
        None => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    // Reap-or-kill safety net: if the supervisor itself goes away, the
    // child must not be left running unobserved.
    cmd.kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| ServiceError::spawn_failed(program, e.to_string()))?;

    info!(
        program,
        pid = child.id().unwrap_or(0),
        "process spawned"
    );
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_executable_fails() {
        let result = spawn_command(
            "/nonexistent/definitely-not-a-binary",
            &[],
            None,
            &SpawnOptions::default(),
        );
        assert!(matches!(result, Err(ServiceError::SpawnFailed { .. })));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_spawn_redirects_output_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let sink = File::create(&path).unwrap();

        let mut child = spawn_command(
            "sh",
            &["-c".to_string(), "echo captured".to_string()],
            Some(&sink),
            &SpawnOptions::default(),
        )
        .unwrap();
        child.wait().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("captured"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_spawn_applies_environment_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.log");
        let sink = File::create(&path).unwrap();

        let mut options = SpawnOptions::default();
        options.working_directory = Some(dir.path().to_path_buf());
        options
            .environment
            .insert("SVCWRAP_TEST_VAR".to_string(), "present".to_string());

        let mut child = spawn_command(
            "sh",
            &["-c".to_string(), "echo $SVCWRAP_TEST_VAR; pwd".to_string()],
            Some(&sink),
            &options,
        )
        .unwrap();
        child.wait().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("present"));
        assert!(contents.contains(dir.path().file_name().unwrap().to_str().unwrap()));
    }
}
