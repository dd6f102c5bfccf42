//! Reusable per-direction AEAD context.
//!
//! A [`ReusableAeadContext`] holds one cipher context bound to exactly one
//! key and one direction. The algorithm lookup, key binding and nonce length
//! are paid once in [`ReusableAeadContext::create`]; every message afterwards
//! only rebinds the nonce on the existing handle.

use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::key::AeadKey;
use crate::primitive::{
    Algorithm, CHACHA20_POLY1305, ChaCha20Poly1305Context, CipherContext, Direction,
    PrimitiveError,
};
use crate::{AeadError, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Cipher context bound once to a key and a direction, reused per message.
///
/// Not safe for concurrent use: every `run_*` call rebinds the nonce and then
/// drives the message through the same handle.
#[derive(Debug)]
pub struct ReusableAeadContext<C: CipherContext = ChaCha20Poly1305Context> {
    inner: C,
    direction: Direction,
}

impl<C: CipherContext> ReusableAeadContext<C> {
    /// Allocate a cipher context and bind it to `key` and `direction`.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::Internal` if any setup step fails. A partially set
    /// up handle is released before returning.
    pub fn create(key: &AeadKey, direction: Direction) -> Result<Self, AeadError> {
        let algorithm =
            Algorithm::by_name(CHACHA20_POLY1305).ok_or(PrimitiveError::UnknownAlgorithm)?;

        let mut inner = C::new(algorithm, direction)?;
        inner.set_key_length(KEY_SIZE)?;
        inner.set_key(key.as_bytes())?;
        inner.set_nonce_length(NONCE_SIZE)?;

        debug!(
            ?direction,
            algorithm = algorithm.name(),
            "bound reusable AEAD context"
        );

        Ok(Self { inner, direction })
    }

    /// Direction fixed at creation.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Encrypt one message, returning `ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::Internal` if the context is bound for decryption
    /// or the primitive misbehaves.
    pub fn run_encrypt(
        &mut self,
        nonce: &[u8; NONCE_SIZE],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        self.expect_direction(Direction::Encrypt)?;

        self.inner.set_nonce(nonce)?;
        self.inner.update_aad(aad)?;

        let len = plaintext.len();
        let mut out = vec![0u8; len + TAG_SIZE];
        let written = self.inner.update(plaintext, &mut out[..len])?;
        if written != len {
            return Err(PrimitiveError::OutputLength {
                expected: len,
                actual: written,
            }
            .into());
        }

        // Stream cipher: nothing is held back until finalization.
        let extra = self.inner.finalize()?;
        if extra != 0 {
            return Err(PrimitiveError::UnexpectedOutput(extra).into());
        }

        let tag = self.inner.tag()?;
        out[len..].copy_from_slice(&tag);
        Ok(out)
    }

    /// Verify and decrypt one `ciphertext || tag` message.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::Authentication` if the input is shorter than a tag
    /// or verification fails for any reason. Returns `AeadError::Internal` if
    /// the context is bound for encryption or the primitive misbehaves before
    /// finalization.
    pub fn run_decrypt(
        &mut self,
        nonce: &[u8; NONCE_SIZE],
        data: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        self.expect_direction(Direction::Decrypt)?;

        if data.len() < TAG_SIZE {
            return Err(AeadError::Authentication);
        }
        let (ciphertext, tag) = data.split_at(data.len() - TAG_SIZE);

        self.inner.set_nonce(nonce)?;
        self.inner.set_expected_tag(tag)?;
        self.inner.update_aad(aad)?;

        // Unverified plaintext is wiped unless finalization accepts the tag.
        let mut plaintext = Zeroizing::new(vec![0u8; ciphertext.len()]);
        let written = self.inner.update(ciphertext, &mut plaintext)?;
        if written != ciphertext.len() {
            return Err(PrimitiveError::OutputLength {
                expected: ciphertext.len(),
                actual: written,
            }
            .into());
        }

        match self.inner.finalize() {
            Ok(0) => Ok(core::mem::take(&mut *plaintext)),
            Ok(extra) => Err(PrimitiveError::UnexpectedOutput(extra).into()),
            Err(_) => {
                trace!("decryption rejected");
                Err(AeadError::Authentication)
            }
        }
    }

    fn expect_direction(&self, wanted: Direction) -> Result<(), AeadError> {
        if self.direction == wanted {
            Ok(())
        } else {
            Err(PrimitiveError::WrongDirection(self.direction).into())
        }
    }
}

/// Cipher context stub that counts live handles and fails on demand.
#[cfg(test)]
pub(crate) mod stub {
    use std::cell::Cell;

    use crate::TAG_SIZE;
    use crate::primitive::{Algorithm, CipherContext, Direction, PrimitiveError};

    thread_local! {
        static LIVE: Cell<isize> = const { Cell::new(0) };
        static FAIL_AT: Cell<Option<&'static str>> = const { Cell::new(None) };
    }

    fn fail_at(step: &'static str) -> Result<(), PrimitiveError> {
        if FAIL_AT.with(Cell::get) == Some(step) {
            Err(PrimitiveError::UnknownAlgorithm)
        } else {
            Ok(())
        }
    }

    pub(crate) struct StubContext {
        direction: Direction,
    }

    impl Drop for StubContext {
        fn drop(&mut self) {
            LIVE.with(|live| live.set(live.get() - 1));
        }
    }

    impl CipherContext for StubContext {
        fn new(_algorithm: Algorithm, direction: Direction) -> Result<Self, PrimitiveError> {
            fail_at("new")?;
            LIVE.with(|live| live.set(live.get() + 1));
            Ok(Self { direction })
        }

        fn direction(&self) -> Direction {
            self.direction
        }

        fn set_key_length(&mut self, _len: usize) -> Result<(), PrimitiveError> {
            fail_at("set_key_length")
        }

        fn set_key(&mut self, _key: &[u8]) -> Result<(), PrimitiveError> {
            fail_at("set_key")
        }

        fn set_nonce_length(&mut self, _len: usize) -> Result<(), PrimitiveError> {
            fail_at("set_nonce_length")
        }

        fn set_nonce(&mut self, _nonce: &[u8]) -> Result<(), PrimitiveError> {
            fail_at("set_nonce")
        }

        fn set_expected_tag(&mut self, _tag: &[u8]) -> Result<(), PrimitiveError> {
            Ok(())
        }

        fn update_aad(&mut self, _aad: &[u8]) -> Result<(), PrimitiveError> {
            Ok(())
        }

        fn update(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, PrimitiveError> {
            output[..input.len()].copy_from_slice(input);
            if FAIL_AT.with(Cell::get) == Some("short_update") {
                return Ok(input.len().saturating_sub(1));
            }
            Ok(input.len())
        }

        fn finalize(&mut self) -> Result<usize, PrimitiveError> {
            match FAIL_AT.with(Cell::get) {
                Some("finalize_output") => Ok(3),
                Some("finalize") => Err(PrimitiveError::KeystreamExhausted),
                _ => Ok(0),
            }
        }

        fn tag(&self) -> Result<[u8; TAG_SIZE], PrimitiveError> {
            Ok([0u8; TAG_SIZE])
        }
    }

    pub(crate) fn with_failure<T>(step: Option<&'static str>, f: impl FnOnce() -> T) -> T {
        LIVE.with(|live| live.set(0));
        FAIL_AT.with(|fail| fail.set(step));
        let out = f();
        FAIL_AT.with(|fail| fail.set(None));
        out
    }

    /// Handles currently alive on this thread.
    pub(crate) fn live() -> isize {
        LIVE.with(Cell::get)
    }
}
