// ABOUTME: Tracing bootstrap for binaries: env filter, pretty or JSON stderr output, optional daily log file
// ABOUTME: The file writer guard is kept for the life of the process so buffered lines get flushed

use once_cell::sync::OnceCell;
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_DIR_VAR: &str = "NIP55_LOG_DIR";
const LOG_FILE_PREFIX: &str = "nip55.log";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

pub fn is_production() -> bool {
    env::var("RUST_ENV").unwrap_or_default() == "production"
}

/// Stdout stays free for the harness protocol, console logs go to stderr
pub fn init() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = env::var(LOG_DIR_VAR)
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(|dir| {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
        });

    let subscriber = tracing_subscriber::registry().with(env_filter).with(file_layer);

    if is_production() {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    }
}
