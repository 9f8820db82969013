//! Configuration loading.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! `config/default.{toml,yaml,json}` file, and `MQBROKER_`-prefixed
//! environment variables using `__` between sections and keys
//! (`MQBROKER_SERVER__PORT=6000`).

mod settings;

use config::{Config, ConfigError, Environment, File};
use tokio::sync::Semaphore;

use settings::PartialSettings;

pub use settings::{BrokerSettings, LoggingSettings, ServerSettings, Settings};

pub const DEFAULT_CONFIG_FILE: &str = "config/default";
pub const ENV_PREFIX: &str = "MQBROKER";

/// Loads settings from the default file location and the environment.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Loads settings using `path` as the optional config file (extension
/// inferred by the `config` crate).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    let settings = partial.merge_onto(Settings::default());
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    let max = settings.broker.max_connections;
    if max == 0 || max > Semaphore::MAX_PERMITS {
        return Err(ConfigError::Message(format!(
            "broker.max_connections must be between 1 and {}, got {max}",
            Semaphore::MAX_PERMITS
        )));
    }
    Ok(())
}
