//! Public AEAD engine.
//!
//! [`AeadEngine`] owns a key and up to two [`ReusableAeadContext`]s, one per
//! direction. Each context is created the first time its direction is used
//! and then kept for the engine's lifetime, so a caller alternating between
//! `encrypt` and `decrypt` never pays the setup cost twice.
//!
//! All caller input is validated before the cipher context is touched.

use core::fmt;

use crate::context::ReusableAeadContext;
use crate::key::AeadKey;
use crate::primitive::{ChaCha20Poly1305Context, CipherContext, Direction};
use crate::{AeadError, KEY_SIZE, MAX_INPUT_LEN, NONCE_SIZE};

/// Generate a fresh 32-byte key from the OS CSPRNG.
///
/// # Errors
///
/// Returns `AeadError::RandomFailed` if the OS CSPRNG fails.
pub fn generate_key() -> Result<[u8; KEY_SIZE], AeadError> {
    let mut key = [0u8; KEY_SIZE];
    getrandom::fill(&mut key).map_err(|_| AeadError::RandomFailed)?;
    Ok(key)
}

/// ChaCha20-Poly1305 engine with lazily bound, reusable per-direction contexts.
///
/// # Threading
///
/// Single-owner. The engine may be moved to another thread but must not be
/// used from two threads at once; `&mut self` on `encrypt`/`decrypt`
/// enforces this at compile time. See [`crate::SharedAeadEngine`] for a
/// locking wrapper.
///
/// # Nonces
///
/// The caller must never repeat a nonce under the same key. The engine does
/// not track nonces.
pub struct AeadEngine<C: CipherContext = ChaCha20Poly1305Context> {
    key: AeadKey,
    encrypt_ctx: Option<ReusableAeadContext<C>>,
    decrypt_ctx: Option<ReusableAeadContext<C>>,
}

impl AeadEngine {
    /// Create an engine from raw key bytes.
    ///
    /// No cipher context is allocated until the first call in each direction.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::InvalidKey` unless `key` is exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, AeadError> {
        Ok(Self::with_key(AeadKey::from_slice(key)?))
    }

    /// Create an engine that takes ownership of `key`.
    #[must_use]
    pub fn from_key(key: AeadKey) -> Self {
        Self::with_key(key)
    }

    /// Generate a fresh 32-byte key from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::RandomFailed` if the OS CSPRNG fails.
    pub fn generate_key() -> Result<[u8; KEY_SIZE], AeadError> {
        generate_key()
    }
}

impl<C: CipherContext> AeadEngine<C> {
    /// Create an engine over a specific [`CipherContext`] implementation.
    #[must_use]
    pub fn with_key(key: AeadKey) -> Self {
        Self {
            key,
            encrypt_ctx: None,
            decrypt_ctx: None,
        }
    }

    /// Encrypt `plaintext`, returning `ciphertext || tag` (16 bytes longer).
    ///
    /// `None` associated data is identical to empty associated data.
    ///
    /// # Errors
    ///
    /// - `AeadError::InvalidNonce` if `nonce` is not 12 bytes
    /// - `AeadError::TooLarge` if `plaintext` or `associated_data` is 2^32
    ///   bytes or longer
    /// - `AeadError::Internal` if the cipher context fails
    pub fn encrypt(
        &mut self,
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, AeadError> {
        let nonce = check_nonce(nonce)?;
        let aad = associated_data.unwrap_or_default();
        check_len(plaintext.len())?;
        check_len(aad.len())?;

        bind_once(&mut self.encrypt_ctx, &self.key, Direction::Encrypt)?
            .run_encrypt(nonce, plaintext, aad)
    }

    /// Verify and decrypt `ciphertext || tag`.
    ///
    /// `None` associated data is identical to empty associated data. The
    /// plaintext is only returned if the whole message authenticates.
    ///
    /// # Errors
    ///
    /// - `AeadError::InvalidNonce` if `nonce` is not 12 bytes
    /// - `AeadError::Authentication` if the input is shorter than the tag or
    ///   fails verification (wrong key, nonce, associated data, or tampering)
    /// - `AeadError::Internal` if the cipher context fails before verification
    pub fn decrypt(
        &mut self,
        nonce: &[u8],
        data: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, AeadError> {
        let nonce = check_nonce(nonce)?;
        let aad = associated_data.unwrap_or_default();

        bind_once(&mut self.decrypt_ctx, &self.key, Direction::Decrypt)?
            .run_decrypt(nonce, data, aad)
    }

    /// Whether the context for `direction` has been bound yet.
    #[must_use]
    pub fn has_context(&self, direction: Direction) -> bool {
        match direction {
            Direction::Encrypt => self.encrypt_ctx.is_some(),
            Direction::Decrypt => self.decrypt_ctx.is_some(),
        }
    }
}

impl<C: CipherContext> fmt::Debug for AeadEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadEngine")
            .field("key", &self.key)
            .field("encrypt_bound", &self.encrypt_ctx.is_some())
            .field("decrypt_bound", &self.decrypt_ctx.is_some())
            .finish()
    }
}

/// Return the context in `slot`, creating it on first use.
///
/// A failed creation leaves the slot empty so the next call retries.
fn bind_once<'a, C: CipherContext>(
    slot: &'a mut Option<ReusableAeadContext<C>>,
    key: &AeadKey,
    direction: Direction,
) -> Result<&'a mut ReusableAeadContext<C>, AeadError> {
    match slot {
        Some(ctx) => Ok(ctx),
        empty @ None => Ok(empty.insert(ReusableAeadContext::create(key, direction)?)),
    }
}

fn check_nonce(nonce: &[u8]) -> Result<&[u8; NONCE_SIZE], AeadError> {
    nonce.try_into().map_err(|_| AeadError::InvalidNonce {
        expected: NONCE_SIZE,
        actual: nonce.len(),
    })
}

/// Reject plaintext or associated data of 2^32 bytes or more.
pub(crate) fn check_len(len: usize) -> Result<(), AeadError> {
    let len = len as u64;
    if len > MAX_INPUT_LEN {
        return Err(AeadError::TooLarge {
            len,
            max: MAX_INPUT_LEN,
        });
    }
    Ok(())
}
