mod config;
mod probe;
mod signals;

use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vigil::{Environment, Notifier, NotifyError, Watchdog};

/// Report service readiness, status, and watchdog liveness to systemd
/// over the sd_notify socket.
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "vigil.toml")]
    config: PathBuf,

    /// Extra logging (every pulse and skipped report)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send READY=1
    Ready,
    /// Send RELOADING=1 with the current monotonic time
    Reloading,
    /// Send STOPPING=1
    Stopping,
    /// Send a single WATCHDOG=1 pulse
    Watchdog,
    /// Send STATUS=<TEXT>
    Status {
        /// Status text, sent verbatim
        text: String,
    },
    /// Send arbitrary KEY=VALUE fields as one datagram
    Send {
        #[arg(value_name = "KEY=VALUE", required = true, value_parser = parse_field)]
        fields: Vec<String>,
    },
    /// Print the watchdog interval in microseconds, or "disabled"
    Interval,
    /// Run the watchdog loop until unhealthy or interrupted
    Watch {
        /// Only stay healthy while this process is alive (overrides config)
        #[arg(long)]
        pid: Option<i32>,

        /// Become unhealthy once this file exists (overrides config)
        #[arg(long)]
        stop_file: Option<PathBuf>,

        /// Status text to send before the loop starts (overrides config)
        #[arg(long)]
        status: Option<String>,

        /// Don't send READY=1 before the loop starts
        #[arg(long)]
        no_ready: bool,
    },
}

/// Accept a `KEY=VALUE` field with a non-empty key and no embedded newline.
fn parse_field(s: &str) -> Result<String, String> {
    match s.split_once('=') {
        Some((key, _)) if !key.is_empty() && !s.contains('\n') => Ok(s.to_string()),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        config.logging.filter.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(cli.command, config).await {
        tracing::error!(error = %e, "vigil failed");
        std::process::exit(1);
    }
}

async fn run(command: Command, config: config::VigilConfig) -> Result<(), Box<dyn std::error::Error>> {
    let notifier = Notifier::new();
    match command {
        Command::Ready => notifier.ready()?,
        Command::Reloading => notifier.reloading()?,
        Command::Stopping => notifier.stopping()?,
        Command::Watchdog => notifier.watchdog()?,
        Command::Status { text } => notifier.status(&text)?,
        Command::Send { fields } => notifier.report(&fields.join("\n"))?,
        Command::Interval => match Watchdog::new().interval()? {
            Some(interval) => println!("{}", interval.as_micros()),
            None => println!("disabled"),
        },
        Command::Watch {
            pid,
            stop_file,
            status,
            no_ready,
        } => {
            let mut watch = config.watch;
            watch.pid = pid.or(watch.pid);
            watch.stop_file = stop_file.or(watch.stop_file);
            watch.status = status.or(watch.status);
            watch.notify_ready = watch.notify_ready && !no_ready;
            watch_loop(Watchdog::new(), watch, shutdown_signal()).await?;
        }
    }
    Ok(())
}

/// Announce readiness, run the watchdog until it ends, then report STOPPING=1.
///
/// When the supervisor has not enabled the watchdog for us (or for the
/// watched pid) nothing is sent at all, so a live service is never told it
/// is stopping.
async fn watch_loop<E, F>(
    watchdog: Watchdog<E>,
    watch: config::WatchConfig,
    shutdown: F,
) -> Result<(), NotifyError>
where
    E: Environment,
    F: Future,
{
    let watchdog = match watch.pid.and_then(|pid| u32::try_from(pid).ok()) {
        Some(pid) => watchdog.for_pid(pid),
        None => watchdog,
    };
    match watchdog.interval()? {
        Some(interval) if !interval.is_zero() => {}
        _ => {
            tracing::warn!(
                pid = ?watch.pid,
                "watchdog is not enabled for this service, nothing to supervise"
            );
            return Ok(());
        }
    }

    let notifier = watchdog.notifier();
    if watch.notify_ready {
        notifier.ready()?;
    }
    if let Some(status) = &watch.status {
        notifier.status(status)?;
    }

    let probe = probe::Probe::new(watch.pid, watch.stop_file);
    tracing::info!(pid = ?watch.pid, "watch started");

    let result = watchdog.run_until(|| probe.healthy(), shutdown).await;

    if let Err(e) = notifier.stopping() {
        tracing::warn!(error = %e, "failed to report stopping");
    }
    result
}

/// Resolve on SIGINT/SIGTERM, or never if the handlers can't be installed.
async fn shutdown_signal() {
    match signals::SignalHandler::install() {
        Ok(handler) => {
            handler.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install signal handlers, running without them");
            std::future::pending::<()>().await;
        }
    }
}
