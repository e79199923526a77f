//! HTTP service error type

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blurplefier::RemapError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the HTTP service
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Remap(#[from] RemapError),

    #[error("Image processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("Image processing failed: {0}")]
    Processing(String),

    #[error("Image too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("External fetch error: {0}")]
    ExternalFetch(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Remap(RemapError::InvalidAnimation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Remap(RemapError::Encode(_)) | AppError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Remap(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ExternalFetch(_) | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        (status, self.to_string()).into_response()
    }
}
