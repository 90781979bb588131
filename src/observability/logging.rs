use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "powercheck=info";

/// Initializes the logging system with both console and file output.
///
/// Console output goes to stderr so stdout stays reserved for the JSON the
/// CLI prints. The returned guard must be held until exit or buffered file
/// lines are lost.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    // Ensure logs directory exists; fall back to console-only if it can't be created
    if let Err(e) = fs::create_dir_all("logs") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        tracing::warn!("File logging disabled, could not create logs/: {}", e);
        return None;
    }

    // Create a non-blocking file appender for daily log rotation
    let file_appender = tracing_appender::rolling::daily("logs", "powercheck.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    // JSON lines for the file, human-readable for the console
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_with_file_output() {
        let guard = init_logging();
        assert!(guard.is_some());
        assert!(std::path::Path::new("logs").is_dir());
        tracing::info!("logging initialized");
    }
}
