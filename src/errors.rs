#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
#[cfg(feature = "server")]
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    #[error("Log source unavailable: {0}")]
    LogSource(String),

    #[error("Network timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] tokio::io::Error),

    #[error("Response too large")]
    ResponseTooLarge,

    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,

    #[error("No whois information found for {0}")]
    WhoisNotFound(String),

    #[error("Storage error: {0}")]
    StoreError(#[from] crate::store::StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<tokio::time::error::Elapsed> for ServiceError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ServiceError::Timeout
    }
}

#[cfg(feature = "server")]
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServiceError::InvalidIp(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServiceError::WhoisNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServiceError::LogSource(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServiceError::Timeout => (StatusCode::REQUEST_TIMEOUT, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
