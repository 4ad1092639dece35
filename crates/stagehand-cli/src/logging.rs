use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize diagnostics logging.
///
/// The level defaults to `warn` (`debug` with `--verbose`) and can be
/// overridden via the `STAGEHAND_LOG` or `RUST_LOG` environment variables.
/// Without `log_dir`, records go to stderr. With it, they go to a daily
/// rotated `stagehand.YYYY-MM-DD` file in that directory, and the returned
/// [`WorkerGuard`] **must** be held until exit so buffered records are flushed.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_env("STAGEHAND_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "stagehand");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .with(env_filter)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .with(env_filter)
                .init();

            None
        }
    }
}
