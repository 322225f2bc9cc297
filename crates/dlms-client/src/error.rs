use dlms_shared::error::ValidationErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("License not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The server answered with an error status.
    #[error("Server error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// One-line message suitable for a toast.
    pub fn notification(&self) -> String {
        match self {
            ClientError::Validation(errors) => match errors.errors.first() {
                Some(first) if errors.errors.len() == 1 => first.message.clone(),
                _ => "Please correct the highlighted fields".to_string(),
            },
            ClientError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            ClientError::NotFound => "License not found".to_string(),
            ClientError::Conflict(message) => message.clone(),
            ClientError::Upstream { message, .. } => format!("Error: {message}"),
            ClientError::Http(e) if e.is_timeout() => "The server took too long to respond".to_string(),
            ClientError::Http(_) => "Could not reach the server".to_string(),
            ClientError::Storage(_) => "Could not save the session on this device".to_string(),
            ClientError::Serialization(_) => "Unexpected response from the server".to_string(),
        }
    }
}
