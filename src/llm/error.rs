use thiserror::Error;

/// Failure of the model call itself.
///
/// None of these are recovered inside the loops; they end the current
/// invocation and reach the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited or quota exceeded: {0}")]
    RateLimited(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl LlmError {
    /// Whether the caller could reasonably try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Auth(_) | Self::Decode(_) => false,
        }
    }
}
