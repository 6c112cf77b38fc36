//! Application error types.

use thiserror::Error;

/// Application error types.
///
/// The first four variants are user-input validation failures: rejected
/// synchronously, surfaced as a transient notice, no state change.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Nothing to send")]
    EmptySubmission,

    #[error("Please select a model first")]
    NoModelSelected,

    #[error("No active conversation")]
    NoActiveConversation,

    #[error("A response is already being generated")]
    AlreadyGenerating,

    #[error("Conversation has no messages to export")]
    EmptyExport,

    #[error(transparent)]
    Api(#[from] verdant_engine::ApiError),

    #[error(transparent)]
    Storage(#[from] verdant_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, AppError>;
