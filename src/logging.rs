use std::path::{Path, PathBuf};

use anyhow::Context;
use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::AppConfig;

pub const LOG_FILE_PREFIX: &str = "homeledger.log";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn stderr_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339());
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Install the stderr subscriber. A subscriber installed earlier wins.
pub fn init_logging(config: &AppConfig) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(stderr_layer(config.log_json))
        .try_init();
}

/// Install the stderr subscriber plus a daily-rolling JSON file sink under `dir`.
pub fn init_file_logging(config: &AppConfig, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer);

    let installed = tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(stderr_layer(config.log_json))
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        let _ = FILE_GUARD.set(guard);
    }
    Ok(dir.to_path_buf())
}
