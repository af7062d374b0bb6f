use std::{io, path::Path};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::env::LoggingConfig;

const LOG_FILE_PREFIX: &str = "feedguard.log";
// HTTP plumbing is chatty at debug; keep it quiet unless RUST_LOG asks for it.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<WorkerGuard> = OnceCell::new();

pub fn init_tracing(logging: &LoggingConfig, logs_dir: &Path) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter_directives(&logging.level)))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_target(true)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        tracing::info!(logs = %logs_dir.display(), level = %logging.level, "tracing initialized");
        Ok(())
    })?;
    Ok(())
}

fn filter_directives(level: &str) -> String {
    format!("{level},{QUIET_DEPENDENCIES}")
}
