use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub password: Option<SecretString>,
}

impl RedisSettings {
    pub fn get_redis_url(&self) -> SecretString {
        let url = match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}",
                password.expose_secret(),
                self.host,
                self.port
            ),
            None => format!("redis://{}:{}", self.host, self.port),
        };
        SecretString::new(url.into_boxed_str())
    }
}
