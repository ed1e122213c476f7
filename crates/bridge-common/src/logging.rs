use std::sync::OnceLock;

use anyhow::Result;
use tracing::info;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "MESH_BRIDGE_LOG";

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initialize the tracing subscriber for a binary in this workspace.
///
/// `MESH_BRIDGE_LOG` overrides the filter directive; `RUST_LOG` is honoured
/// as a fallback, and `info` is the final default. Pretty output goes to
/// stdout, structured JSON goes to a daily rolling file under
/// `config.directory` for post-mortem analysis.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;

    let file_appender = daily(&config.directory, format!("{service_name}.log"));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);

    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|err| {
        eprintln!("invalid {LOG_ENV} directive ({err}); defaulting to info logging");
        EnvFilter::new("info")
    });

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(stdout_writer);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(service = %service_name, log_dir = %config.directory, "tracing initialised");
    Ok(())
}
