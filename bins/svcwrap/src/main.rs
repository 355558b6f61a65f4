use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use svcwrap_service::{LogFileSpec, RetryTtl, Service, ServiceOptions};

/// Supervise a single executable: capture its output, tail the log, and
/// tear it down cleanly on SIGINT/SIGTERM.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file with service options
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Display name for the service
    #[arg(short, long)]
    name: Option<String>,

    /// Warm-up wait in milliseconds before the service reports started
    #[arg(long, value_name = "MS")]
    start_wait_ms: Option<u64>,

    /// Capture the child's combined output to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Live-tail the log file to stdout
    #[arg(long)]
    print: bool,

    /// Idle poll cycles before the tailer gives up (count or "infinite")
    #[arg(long, value_name = "TTL")]
    print_ttl: Option<RetryTtl>,

    /// Working directory for the child process
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Extra environment variables (KEY=VALUE, repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// The command to supervise, followed by its arguments
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    initialize_logging(args.debug);

    let options = build_options(&args)?;
    if options.command.is_none() {
        anyhow::bail!("no command to supervise (pass one on the command line or via --config)");
    }

    let options = options
        .on_start(|| info!("service starting"))
        .on_stop(|| info!("service stopped"))
        .on_restart(|| info!("service restarting"));

    let service = Service::new(options);
    service
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("start failed: {}", e))?;

    wait_for_shutdown_signal().await;

    info!("shutting down supervised service");
    service
        .stop()
        .await
        .map_err(|e| anyhow::anyhow!("stop failed: {}", e))?;

    let status = service.status();
    info!(
        name = %status.name,
        state = %status.state,
        starts = status.start_count,
        "final status"
    );
    Ok(())
}

/// Merge the optional config file with command-line overrides.
fn build_options(args: &Args) -> Result<ServiceOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => ServiceOptions::default(),
    };

    if !args.command.is_empty() {
        options.command = Some(args.command[0].clone());
        options.args = args.command[1..].to_vec();
    }
    if let Some(name) = &args.name {
        options.name = Some(name.clone());
    }
    if let Some(ms) = args.start_wait_ms {
        options.start_wait_ms = ms;
    }
    if let Some(dir) = &args.cwd {
        options.working_directory = Some(dir.clone());
    }
    for pair in &args.env {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid --env {:?} (expected KEY=VALUE)", pair))?;
        options
            .environment
            .insert(key.to_string(), value.to_string());
    }
    if let Some(path) = &args.log_file {
        options.log_file = Some(LogFileSpec::Detailed {
            path: path.clone(),
            print: args.print.then_some(true),
            print_ttl: args.print_ttl,
        });
    }

    Ok(options)
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("received Ctrl+C");
    }
}
