pub mod config;
pub mod pipeline;

pub use pipeline::{
    Analysis, DemoContent, ExtractionError, HealthAnalyzer, PanelContent, RemoteCallError,
};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to `config::default_log_filter()`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} logging initialized", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_repeatable() {
        init_logging();
        init_logging();
    }
}
