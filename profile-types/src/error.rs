//! Error types for the profile wire format.

use thiserror::Error;

/// Errors that can occur while parsing or building wire types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Public key is not 64 hexadecimal characters
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Relay or client message does not have the expected shape
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// JSON encoding or decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::InvalidPublicKey("abc".into());
        assert_eq!(err.to_string(), "invalid public key: abc");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
