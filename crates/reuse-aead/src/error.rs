//! AEAD error types.

use thiserror::Error;

use crate::primitive::PrimitiveError;

/// Errors returned by the engine, its contexts and the session layer.
///
/// Decryption failures are deliberately collapsed into
/// [`AeadError::Authentication`]: a wrong key, nonce or associated data, a
/// tampered or truncated ciphertext all look the same to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AeadError {
    /// Key is not exactly 32 bytes
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKey {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Nonce is not exactly 12 bytes
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonce {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Input is not a well-formed byte sequence for the operation
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Plaintext or associated data exceeds the supported size
    #[error("input too large: {len} bytes exceeds maximum of {max}")]
    TooLarge {
        /// Length that was supplied
        len: u64,
        /// Largest accepted length
        max: u64,
    },

    /// AEAD decryption failed (authentication failure)
    #[error("decryption failed: authentication failure")]
    Authentication,

    /// The cipher context misbehaved during setup or encryption
    #[error("internal cipher error: {0}")]
    Internal(#[from] PrimitiveError),

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,

    /// Nonce counter exhausted (counter-nonce sessions only)
    #[error("nonce counter exhausted, rekey required")]
    NonceExhausted,

    /// Invalid session configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AeadError {
    /// Whether the error points at a fault in the cipher context rather than
    /// at caller input.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
