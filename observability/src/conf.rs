use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use typed_builder::TypedBuilder;

const DEFAULT_SERVICE_NAME: &str = "neural-sync";
const DEFAULT_LOG_FILTER: &str = "info";

lazy_static::lazy_static! {
    pub(crate) static ref ENVIRONMENT: ExecutionEnvironment = mode();
}

#[derive(
    Default, Display, Deserialize, Serialize, Clone, Copy, EnumString, AsRefStr, Eq, PartialEq, Debug,
)]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionEnvironment {
    #[default]
    Local,
    #[strum(serialize = "dev")]
    Development,
    Stage,
    #[strum(serialize = "prod")]
    Production,
    Integration,
}

/// The execution environment selected through `RUN_MODE`, read once per process.
pub fn execution_environment() -> ExecutionEnvironment {
    *ENVIRONMENT
}

fn mode() -> ExecutionEnvironment {
    env::var("RUN_MODE")
        .map(|enum_str| ExecutionEnvironment::from_str(enum_str.as_str()).unwrap_or_default())
        .unwrap_or_else(|_| ExecutionEnvironment::Local)
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, TypedBuilder, Default)]
pub struct TelemetryConfig {
    /// Name reported by every log line and metric of this process.
    #[builder(default, setter(strip_option, into))]
    service_name: Option<String>,

    /// Emit log lines as JSON objects instead of human readable text.
    #[builder(default, setter(strip_option))]
    json_logs: Option<bool>,

    /// `EnvFilter` directive used when `RUST_LOG` is not set, e.g. `info,neural_sync_client=debug`.
    #[builder(default, setter(strip_option, into))]
    log_filter: Option<String>,
}

impl TelemetryConfig {
    pub fn service_name(&self) -> &str {
        self.service_name.as_deref().unwrap_or(DEFAULT_SERVICE_NAME)
    }

    pub fn json_logs(&self) -> bool {
        self.json_logs.unwrap_or(false)
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[derive(TypedBuilder, Debug)]
pub struct Settings<'a> {
    #[builder(setter(strip_option), default = None)]
    path: Option<&'a str>,
    env_prefix: &'a str,
    #[builder(default)]
    parse_keys: Vec<&'a str>,
}

impl Settings<'_> {
    /// Loads a configuration value of type `T`.
    ///
    /// Sources are layered from lowest to highest precedence: `config/default`,
    /// `config/<prefix>`, `config/<prefix>-<RUN_MODE>`, `/etc/config/<prefix>.toml`,
    /// the explicit `path` (required when set) and finally the `<PREFIX>__<KEY>`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required source is missing or the merged
    /// configuration cannot be deserialized into `T`.
    pub fn init_conf<'de, T: Deserialize<'de> + std::fmt::Debug>(&self) -> Result<T, ConfigError> {
        let mut env_conf = config::Environment::default()
            .prefix(self.env_prefix)
            .separator("__")
            .list_separator(",");
        if !self.parse_keys.is_empty() {
            env_conf = env_conf.try_parsing(true);
        }
        for key in &self.parse_keys {
            env_conf = env_conf.with_list_parse_key(key);
        }
        let prefix = self.env_prefix.to_lowercase();
        let mut config_builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{prefix}")).required(false))
            .add_source(
                File::with_name(&format!("config/{prefix}-{}", *ENVIRONMENT)).required(false),
            )
            .add_source(File::with_name(&format!("/etc/config/{prefix}.toml")).required(false));

        if let Some(path) = self.path {
            config_builder = config_builder.add_source(File::with_name(path).required(true))
        };

        let config = config_builder.add_source(env_conf).build()?;

        let settings: T = config.try_deserialize()?;

        tracing::debug!("loaded settings: {:?}", settings);

        Ok(settings)
    }
}
