use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dlms_shared::error::{FieldError, SessionError, ValidationErrors};
use dlms_shared::protocol::ErrorResponse;
use dlms_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] SessionError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    #[error("Database error: {0}")]
    Store(StoreError),

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("License not found".to_string()),
            StoreError::Conflict(_) => {
                ServerError::Conflict("A license with this number already exists".to_string())
            }
            other => ServerError::Store(other),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Validation(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServerError::BlobStorage(_) | ServerError::Store(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, fields): (String, Vec<FieldError>) = match self {
            ServerError::Unauthorized(_) => ("Unauthorized".to_string(), Vec::new()),
            ServerError::Validation(errors) => (
                "Invalid license data".to_string(),
                errors.errors,
            ),
            ServerError::BlobStorage(e) => {
                tracing::error!(error = %e, "Blob storage failure");
                ("Blob storage error".to_string(), Vec::new())
            }
            ServerError::Store(e) => {
                tracing::error!(error = %e, "Store failure");
                ("Database error".to_string(), Vec::new())
            }
            ServerError::Conflict(message) => (message, Vec::new()),
            ServerError::Internal(e) => {
                tracing::error!(error = %e, "Internal failure");
                ("Internal server error".to_string(), Vec::new())
            }
            other => (other.to_string(), Vec::new()),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            fields,
        };

        (status, axum::Json(body)).into_response()
    }
}
