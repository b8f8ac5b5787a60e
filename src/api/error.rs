//! Typed errors for the remote API.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response other than an exhausted 503.
    #[error("API error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Service unavailable after {attempts} attempts")]
    ServiceUnavailable { attempts: usize },

    #[error("Cannot connect to API at {0}. Is the server running?")]
    Connect(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Not signed in. Run `climadash login` or pass --token.")]
    NotAuthenticated,

    #[error("This action requires the super_admin role")]
    Forbidden,
}

impl ApiError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::ServiceUnavailable { .. } => Some(503),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks for `message`, `developerMessage` or `userMessage` in a JSON body
/// and falls back to the raw text.
pub fn extract_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "developerMessage", "userMessage", "error"] {
            if let Some(msg) = json.get(key).and_then(|v| v.as_str()) {
                if !msg.trim().is_empty() {
                    return msg.to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "An error occurred while processing your request".to_string()
    } else {
        trimmed.to_string()
    }
}
