//! Error types for envcompose operations.

use thiserror::Error;

/// A specialized `Result` type for envcompose operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that can occur while reconciling a project's environment files.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Failed to read an environment file.
    #[error("env file read failed for {path}: {reason}")]
    EnvFileReadFailed {
        /// The path to the file that couldn't be read.
        path: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Failed to write an environment file.
    #[error("env file write failed for {path}: {reason}")]
    EnvFileWriteFailed {
        /// The path to the file that couldn't be written.
        path: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A file the operation requires does not exist.
    #[error("file not found: {path}")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// Fetching a remote `.env.example` failed.
    #[error("fetch failed for {url}: {reason}")]
    FetchFailed {
        /// The URL that was requested.
        url: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Failed to load the encryption key.
    #[error("key load failed: {0}")]
    KeyLoadFailed(String),

    /// Failed to save the encryption key.
    #[error("key save failed: {0}")]
    KeySaveFailed(String),

    /// Failed to encrypt a value.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Failed to decrypt a value (e.g., wrong key, corrupted data).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The path memory backing store failed.
    #[error("store failed: {0}")]
    StoreFailed(String),

    /// The service catalog violates a uniqueness rule.
    #[error("invalid service catalog: {0}")]
    CatalogInvalid(String),

    /// A prompt could not be shown or read.
    #[error("prompt failed: {0}")]
    PromptFailed(String),

    /// The user aborted a prompt.
    #[error("cancelled by user")]
    Cancelled,
}

impl ComposeError {
    /// Returns `true` if this error is a user cancellation rather than a
    /// failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
