use std::env;
use config::{Config, File, ConfigError};
use dotenv::dotenv;
use secrecy::SecretString;
use serde::Deserialize;

use crate::config::settings::configuration_directory;

fn default_batch_size() -> usize {
    200
}

fn default_max_retries() -> u32 {
    3
}

fn default_sync_interval_seconds() -> u64 {
    900
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Settings for the on-device sync agent.
#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    /// Full URL of the ingestion endpoint.
    pub ingest_url: String,
    /// sqlx connection string of the local reading queue.
    pub queue_database_url: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_secret: Option<SecretString>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_sync_interval_seconds")]
    pub sync_interval_seconds: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

pub fn get_agent_config() -> Result<AgentSettings, ConfigError> {
    dotenv().ok();

    let config = Config::builder()
        .add_source(File::from(configuration_directory()?.join("agent.yml")).required(false))
        .add_source(
            config::Environment::default()
                .prefix("AGENT")
                .prefix_separator("__")
                .separator("__")
        )
        .build()?;

    let mut settings = config.try_deserialize::<AgentSettings>()?;

    if let Ok(secret) = env::var("VERI_DEVICE_SECRET") {
        settings.device_secret = Some(SecretString::new(secret.into_boxed_str()));
    }

    Ok(settings)
}
