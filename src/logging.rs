use tracing_subscriber::EnvFilter;

use crate::config::LoggingYamlConfig;
use crate::SpladeError;

/// Installs the global `tracing` subscriber. Events go to stderr so stdout
/// carries only the flow's own output. `RUST_LOG` overrides `cfg.level`.
pub fn init_logging(cfg: &LoggingYamlConfig) -> Result<(), SpladeError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level).map_err(|e| SpladeError::Logging(e.to_string()))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if cfg.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| SpladeError::Logging(e.to_string()))
}
