use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Secure storage unavailable: {0}")]
    Unavailable(String),
}

/// Secure on-device slots written at provisioning time.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Key used to sign uploads. Never logged.
    async fn device_secret(&self) -> Result<Option<SecretString>, CredentialError>;

    /// Identifier of the one wearable this installation connects to.
    async fn device_id(&self) -> Result<Option<String>, CredentialError>;
}

/// Credentials fixed at startup, e.g. from the agent configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    device_id: Option<String>,
    device_secret: Option<SecretString>,
}

impl StaticCredentials {
    pub fn new(device_id: Option<String>, device_secret: Option<SecretString>) -> Self {
        Self {
            device_id: device_id.filter(|id| !id.trim().is_empty()),
            device_secret,
        }
    }

    pub fn unprovisioned() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn device_secret(&self) -> Result<Option<SecretString>, CredentialError> {
        Ok(self.device_secret.clone())
    }

    async fn device_id(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.device_id.clone())
    }
}
