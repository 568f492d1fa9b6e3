use thiserror::Error;

/// Errors that can occur when interacting with the local reading queue
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to open queue storage: {0}")]
    Open(String),

    #[error("Queue operation failed: {0}")]
    Operation(String),

    #[error("Stored reading {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
