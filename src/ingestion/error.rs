use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::db::store::StoreError;
use crate::models::common::ErrorResponse;
use crate::utils::signature::SignatureError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported_content_type")]
    UnsupportedContentType,

    #[error("malformed_json: {0}")]
    MalformedJson(String),

    #[error("batch_too_large: {size} readings exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("invalid_reading at index {index}: {reason}")]
    InvalidReading { index: usize, reason: &'static str },

    #[error("invalid_signature")]
    Signature(#[from] SignatureError),

    #[error("device_not_authorized: {device_id}")]
    DeviceNotAuthorized { device_id: String },

    // Storage detail goes to the logs only
    #[error("storage_failure")]
    Storage(#[from] StoreError),
}

impl ResponseError for IngestError {
    fn status_code(&self) -> StatusCode {
        match self {
            IngestError::UnsupportedContentType
            | IngestError::MalformedJson(_)
            | IngestError::BatchTooLarge { .. }
            | IngestError::InvalidReading { .. } => StatusCode::BAD_REQUEST,
            IngestError::Signature(_) => StatusCode::UNAUTHORIZED,
            IngestError::DeviceNotAuthorized { .. } => StatusCode::FORBIDDEN,
            IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.to_string()))
    }
}
