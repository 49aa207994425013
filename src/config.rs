//! Repository configuration.
//!
//! Settings are read from `config/config.toml` (optional) and then from
//! `LIFEGUARD__*` environment variables, e.g. `LIFEGUARD__REPOSITORY__PUBLISH_EVENTS=false`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "LIFEGUARD";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// TOML file holding `[named_queries.<Domain>]` tables.
    #[serde(default = "default_named_queries_location")]
    pub named_queries_location: String,
    /// When `false`, after-load events are not published (callbacks still run).
    #[serde(default = "default_publish_events")]
    pub publish_events: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            named_queries_location: default_named_queries_location(),
            publish_events: default_publish_events(),
        }
    }
}

fn default_named_queries_location() -> String {
    "config/named-queries.toml".to_string()
}

fn default_publish_events() -> bool {
    true
}

impl RepositoryConfig {
    /// Load the repository configuration from `config/config.toml`, falling back to env vars.
    ///
    /// A missing `repository` section yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("failed to load {CONFIG_FILE}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<RepositoryConfig>("repository") {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Repository configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }
}
