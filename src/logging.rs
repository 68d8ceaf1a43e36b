use crate::config::HarnessConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// JSON trace file used by `--logs`.
pub fn trace_log_path() -> PathBuf {
    env::var("SYNTHCHECK_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("synthcheck_trace.jsonl"))
}

/// Install the global subscriber once. `--no-logs` wins over everything.
pub fn init_logging(config: &HarnessConfig) {
    if !config.logging_enabled() {
        return;
    }

    let _ = TRACING_INIT.get_or_init(|| {
        let file_layer = if config.logs {
            let path = trace_log_path();
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => Some(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_timer(UtcTime::rfc_3339())
                        .with_writer(file)
                        .with_current_span(false)
                        .with_span_list(false)
                        .with_filter(LevelFilter::DEBUG),
                ),
                Err(err) => {
                    eprintln!("synthcheck: cannot open trace log {}: {err}", path.display());
                    None
                }
            }
        } else {
            None
        };

        let stderr_layer = config.verbose.then(|| {
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::DEBUG)
        });

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer);
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
