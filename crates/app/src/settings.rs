//! Settings for the application, read from an optional `settings.toml`
//! and `ACCOUNTING__*` environment variables (`ACCOUNTING__SERVER__PORT`).
use chrono::TimeDelta;
use config::{Config, ConfigError, Environment, File};
use engine::EngineSettings;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
    pub api_secret: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Throttle {
    pub failure_limit: Option<u64>,
    pub cooloff_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Confirmation {
    pub grace_period_secs: Option<i64>,
    pub mail_interval_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Plans {
    pub default_plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Server,
    #[serde(default)]
    pub throttle: Throttle,
    #[serde(default)]
    pub confirmation: Confirmation,
    #[serde(default)]
    pub plans: Plans,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("ACCOUNTING").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Engine tunables; anything left unset keeps the engine default.
    pub fn engine(&self) -> Result<EngineSettings, ConfigError> {
        let defaults = EngineSettings::default();
        Ok(EngineSettings {
            failure_limit: self
                .throttle
                .failure_limit
                .unwrap_or(defaults.failure_limit),
            cooloff: seconds("throttle.cooloff_secs", self.throttle.cooloff_secs)?
                .unwrap_or(defaults.cooloff),
            confirmation_grace_period: seconds(
                "confirmation.grace_period_secs",
                self.confirmation.grace_period_secs,
            )?
            .unwrap_or(defaults.confirmation_grace_period),
            confirmation_mail_interval: seconds(
                "confirmation.mail_interval_secs",
                self.confirmation.mail_interval_secs,
            )?
            .unwrap_or(defaults.confirmation_mail_interval),
            default_plan: self
                .plans
                .default_plan
                .clone()
                .unwrap_or(defaults.default_plan),
        })
    }
}

fn seconds(key: &str, value: Option<i64>) -> Result<Option<TimeDelta>, ConfigError> {
    value
        .map(|secs| {
            TimeDelta::try_seconds(secs)
                .filter(|delta| *delta >= TimeDelta::zero())
                .ok_or_else(|| ConfigError::Message(format!("{key} out of range: {secs}")))
        })
        .transpose()
}
