//! Error types for ValetChat

use thiserror::Error;

/// Main error type for ValetChat operations
#[derive(Error, Debug)]
pub enum ChatError {
    /// The store rejected the operation for the signed-in user
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No authenticated user for an operation that needs one
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Media upload or download URL resolution failed
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Media download failed (transport error or non-success status)
    #[error("Download failed: {0}")]
    Download(String),

    /// A record fetched from the store is malformed
    #[error("Malformed record at {path}: {reason}")]
    Decode {
        /// Store path of the offending record
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// User, profile, or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic store failure (transport, quota, unavailable)
    #[error("Store error: {0}")]
    Store(String),

    /// Caller supplied invalid input (empty name, empty message, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Image could not be decoded or re-encoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Audio capture failed or was not permitted
    #[error("Unable to record: {0}")]
    Recording(String),

    /// The timeline or roster was already closed
    #[error("Subscription closed")]
    Closed,

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Build a decode error for the record at `path`.
    pub fn decode(path: impl ToString, reason: impl Into<String>) -> Self {
        ChatError::Decode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from an access-control rejection.
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            ChatError::PermissionDenied(_) | ChatError::Unauthenticated(_)
        )
    }
}

/// Result type alias using ChatError
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatError::NotFound("users/555".to_string());
        assert_eq!(format!("{}", err), "Not found: users/555");
    }

    #[test]
    fn test_decode_error_display() {
        let err = ChatError::decode("messages/abc", "missing senderId");
        assert_eq!(
            err.to_string(),
            "Malformed record at messages/abc: missing senderId"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let chat_err: ChatError = io_err.into();
        assert!(matches!(chat_err, ChatError::Io(_)));
    }

    #[test]
    fn test_access_errors() {
        assert!(ChatError::PermissionDenied("rules".into()).is_access_error());
        assert!(ChatError::Unauthenticated("no token".into()).is_access_error());
        assert!(!ChatError::Store("timeout".into()).is_access_error());
    }
}
