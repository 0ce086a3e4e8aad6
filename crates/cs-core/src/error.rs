use thiserror::Error;

pub type CsResult<T> = Result<T, CsError>;

/// Error kinds surfaced by the engine and the store.
///
/// Messages never carry plaintext, keywords, or key material.
#[derive(Debug, Error)]
pub enum CsError {
    /// The KDF could not produce keys (bad parameters or primitive failure).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD tag or associated data did not verify.
    #[error("authentication failed: ciphertext, nonce, or document id does not verify")]
    Authentication,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CsError {
    /// Whether the caller can reasonably handle this error and carry on
    /// (tampered ciphertext, bad arguments) as opposed to an operation-level
    /// failure of storage or key setup.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CsError::Authentication | CsError::InvalidInput(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CsError::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(CsError::Authentication.is_recoverable());
        assert!(CsError::invalid("empty token list").is_recoverable());
        assert!(!CsError::Storage("disk full".into()).is_recoverable());
        assert!(!CsError::KeyDerivation("iterations".into()).is_recoverable());
    }

    #[test]
    fn test_authentication_message_is_generic() {
        let msg = CsError::Authentication.to_string();
        assert!(msg.starts_with("authentication failed"));
    }
}
