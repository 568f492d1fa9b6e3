//! Server-side boundary where device readings become patient data.

pub mod authorization;
pub mod error;
pub mod service;
pub mod validation;

pub use error::IngestError;
pub use service::{ingest_batch, IngestSummary};
pub use validation::{parse_batch, validate_batch, IncomingBatch, ValidatedReading};
