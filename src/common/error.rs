use thiserror::Error;

use crate::client::services::ai::AiProvider;

/// Error type of every client operation. Validation variants are raised
/// locally before any backend call.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("User is already a member")]
    AlreadyMember,

    #[error("Only group admins can {0}")]
    PermissionDenied(&'static str),

    #[error("Please confirm twice before deleting the group")]
    ConfirmationRequired,

    #[error("No active conversation")]
    NoActiveConversation,

    /// Unique-constraint violation reported by the backend (HTTP 409 / 23505).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} API key not configured")]
    MissingCredential(AiProvider),

    #[error("No AI service configured. Please add an API key.")]
    NoProviderConfigured,

    #[error("Unsupported AI service: {0}")]
    UnsupportedProvider(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ChatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ChatError::Validation(msg.into())
    }

    /// True for errors raised before contacting the backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ChatError::Validation(_)
                | ChatError::AlreadyMember
                | ChatError::PermissionDenied(_)
                | ChatError::ConfirmationRequired
                | ChatError::NoActiveConversation
                | ChatError::MissingCredential(_)
                | ChatError::NoProviderConfigured
                | ChatError::UnsupportedProvider(_)
        )
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Backend configuration problems. The only condition the GUI treats as fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("{0} still holds the placeholder value")]
    Placeholder(&'static str),

    #[error("invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}
