use std::env;
use config::{Config, File, ConfigError};
use dotenv::dotenv;
use secrecy::{ExposeSecret, SecretString};

use crate::config::ingestion::IngestionSettings;
use crate::config::redis::RedisSettings;

#[derive(serde::Deserialize, Debug)]
pub struct Settings{
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    #[serde(default)]
    pub ingestion: IngestionSettings,
    #[serde(default)]
    pub redis: Option<RedisSettings>,
}

#[derive(serde::Deserialize, Debug)]
pub struct DatabaseSettings{
    pub user: String,
    pub password: SecretString,
    pub port: u16,
    pub host: String,
    pub db_name: String,
    #[serde(default)]
    pub db_url: Option<SecretString>
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> SecretString {
        match &self.db_url {
            Some(db_url) => db_url.clone(),
            None => {
                SecretString::new(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    self.user, self.password.expose_secret(), self.host, self.port, self.db_name
                ).into_boxed_str())
            }
        }
    }

    /// Server address without a database, for creating one.
    pub fn connection_string_without_db(&self) -> SecretString {
        SecretString::new(format!(
            "postgres://{}:{}@{}:{}",
            self.user, self.password.expose_secret(), self.host, self.port
        ).into_boxed_str())
    }
}

#[derive(serde::Deserialize, Debug)]
pub struct ApplicationSettings{
    pub port: u16,
    pub host: String,
    pub log_level: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Directory holding the layered YAML configuration files.
pub fn configuration_directory() -> Result<std::path::PathBuf, ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| ConfigError::Message(format!("Failed to determine the current directory: {}", e)))?;
    Ok(base_path.join("configuration"))
}

pub fn get_config() -> Result<Settings, ConfigError> {
    let configuration_directory = configuration_directory()?;

    dotenv().ok();

    let environment: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigError::Message)?;

    let env_filename = format!("{}.yml", environment.as_str());
    let config = Config::builder()
        .add_source(File::from(configuration_directory.join("base.yml")))
        .add_source(File::from(configuration_directory.join(env_filename)))
        .add_source(
            config::Environment::default()
                .prefix("POSTGRES")
                .prefix_separator("__")
                .separator("__")
        )
        .add_source(
            config::Environment::default()
                .prefix("APP")
                .prefix_separator("__")
                .separator("__")
        )
        .build()?;

    let mut settings = config.try_deserialize::<Settings>()?;

    // Hosted platforms expose the database as a single URL
    if let Ok(db_url) = env::var("DATABASE_URL") {
        settings.database.db_url = Some(SecretString::new(db_url.into_boxed_str()));
    }

    if let Ok(signing_secret) = env::var("INGESTION_SIGNING_SECRET") {
        settings.ingestion.signing_secret = Some(SecretString::new(signing_secret.into_boxed_str()));
    }

    check_ingestion_settings(&environment, &settings.ingestion)?;

    Ok(settings)
}

/// Unsigned uploads are only accepted outside production.
pub fn check_ingestion_settings(
    environment: &Environment,
    ingestion: &IngestionSettings,
) -> Result<(), ConfigError> {
    let has_secret = ingestion
        .signing_secret
        .as_ref()
        .is_some_and(|secret| !secret.expose_secret().trim().is_empty());

    match environment {
        Environment::Production if !has_secret => Err(ConfigError::Message(
            "ingestion.signing_secret must be set in production. \
            Provide it through INGESTION_SIGNING_SECRET or APP__INGESTION__SIGNING_SECRET."
                .to_string(),
        )),
        _ => Ok(()),
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. \
                Use either `local` or `production`.",
                other
            )),
        }
    }
}
