use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_RETENTION: Duration = Duration::from_secs(60 * 60 * 24 * 14);

/// Keeps the non-blocking writer alive for the life of the process.
#[allow(dead_code)]
pub struct LoggerGuard(WorkerGuard);

/// Daily-rotated file log plus an ANSI console log. `RUST_LOG` overrides
/// the configured level.
pub fn init_logging(log_dir: impl AsRef<Path>, prefix: &str, level: &str) -> LoggerGuard {
    let level = match level {
        "trace" | "debug" | "info" | "warn" | "error" => level,
        other => {
            eprintln!("invalid log level '{other}', defaulting to 'info'");
            "info"
        }
    };

    let builder = EnvFilter::builder().with_default_directive(level.parse().expect("level parses"));
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let console_filter = builder.clone().parse_lossy(&env);
    let file_filter = builder.parse_lossy(&env);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir.as_ref())
        .expect("failed to create file appender");
    let (non_blocking, guard) = NonBlocking::new(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(file_filter);
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();

    if let Err(e) = prune_old_logs(log_dir.as_ref(), prefix) {
        tracing::warn!("could not prune old log files: {e}");
    }

    LoggerGuard(guard)
}

/// Delete rotated log files older than the retention window. Runs once at
/// startup.
fn prune_old_logs(log_dir: &Path, prefix: &str) -> std::io::Result<()> {
    let now = SystemTime::now();
    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.starts_with(prefix) || !file_name.ends_with(".log") {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if now.duration_since(modified).unwrap_or_default() > LOG_RETENTION {
            fs::remove_file(&path)?;
            tracing::info!("old log file deleted: {file_name}");
        }
    }
    Ok(())
}
