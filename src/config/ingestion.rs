use secrecy::SecretString;
use serde::Deserialize;

fn default_max_clock_skew_seconds() -> i64 {
    300
}

fn default_max_batch_size() -> usize {
    1000
}

/// Settings for the wearable ingestion endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestionSettings {
    /// HMAC key uploads are verified against. Verification is skipped when unset.
    #[serde(default)]
    pub signing_secret: Option<SecretString>,
    /// How far `x-veri-timestamp` may drift from the server clock.
    #[serde(default = "default_max_clock_skew_seconds")]
    pub max_clock_skew_seconds: i64,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            signing_secret: None,
            max_clock_skew_seconds: default_max_clock_skew_seconds(),
            max_batch_size: default_max_batch_size(),
        }
    }
}
