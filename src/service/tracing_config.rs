use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::config::LogConfig;
use crate::AppResult;

/// Keeps the non-blocking file writer alive for the life of the process.
/// Dropping it flushes and stops the background logging thread.
pub struct TracingGuard {
    _worker_guard: Option<WorkerGuard>,
}

/// Installs the global tracing subscriber.
///
/// Events go to stdout, and additionally to an hourly-rotated file under
/// `log_dir` when one is configured. A nonzero `verbose` count picks the
/// level directly; otherwise the filter comes from `RUST_LOG`, falling
/// back to `info`.
pub fn setup_tracing(config: &LogConfig, verbose: u8) -> AppResult<TracingGuard> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.6f".to_string());

    match &config.log_dir {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::hourly(log_dir, &config.file_prefix);
            let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);

            let writer = non_blocking.and(std::io::stdout);

            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_target(true)
                .with_thread_names(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(true)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(fmt_layer)
                .with(filter)
                .init();

            Ok(TracingGuard {
                _worker_guard: Some(worker_guard),
            })
        }
        None => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_target(true)
                .with_thread_names(true)
                .with_thread_ids(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(fmt_layer)
                .with(filter)
                .init();

            Ok(TracingGuard {
                _worker_guard: None,
            })
        }
    }
}
