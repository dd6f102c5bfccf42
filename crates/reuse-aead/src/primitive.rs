//! Low-level cipher context capability.
//!
//! A [`CipherContext`] is a stateful handle in the style of a classic
//! cipher-context API: it is allocated for one algorithm and one direction,
//! receives its key once, and can then be driven through any number of
//! messages by rebinding the nonce:
//!
//! ```text
//! new ─► set_key_length ─► set_key ─► set_nonce_length
//!                                          │
//!        ┌─────────────────────────────────┘
//!        ▼
//!    set_nonce ─► [set_expected_tag] ─► update_aad ─► update ─► finalize ─► [tag]
//!        ▲                                                          │
//!        └──────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ChaCha20Poly1305Context`] implements the RFC 8439 construction on top of
//! the RustCrypto `chacha20` keystream and `poly1305` universal hash. Each
//! message is fed in a single `update_aad` and a single `update` call.

use core::fmt;

use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use poly1305::Poly1305;
use poly1305::universal_hash::{KeyInit, UniversalHash};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::constant_time::verify_16;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Registry name of the ChaCha20-Poly1305 algorithm.
pub const CHACHA20_POLY1305: &str = "chacha20-poly1305";

/// Keystream offset of the first payload byte; block 0 yields the Poly1305 key.
const PAYLOAD_OFFSET: u64 = 64;

/// Operation direction a context is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Plaintext in, ciphertext and tag out
    Encrypt,
    /// Ciphertext and expected tag in, plaintext out
    Decrypt,
}

/// Cipher algorithms known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ChaCha20-Poly1305 as specified in RFC 8439
    ChaCha20Poly1305,
}

impl Algorithm {
    /// Look an algorithm up by its registry name (ASCII case-insensitive).
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case(CHACHA20_POLY1305) {
            Some(Self::ChaCha20Poly1305)
        } else {
            None
        }
    }

    /// Registry name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ChaCha20Poly1305 => CHACHA20_POLY1305,
        }
    }
}

/// Where a context is in its message lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Allocated, no key yet
    Unkeyed,
    /// Key bound, no nonce yet
    Keyed,
    /// Nonce bound, waiting for associated data or payload
    NonceSet,
    /// Associated data absorbed
    AadFed,
    /// Payload transformed
    PayloadFed,
    /// Message complete; rebinding the nonce starts the next one
    Finalized,
}

/// Failures reported by a cipher context.
///
/// Apart from [`PrimitiveError::TagMismatch`] these indicate misuse of the
/// context or a broken primitive, never bad caller data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// Algorithm name not present in the registry
    #[error("unknown cipher algorithm")]
    UnknownAlgorithm,

    /// Key length not supported by the algorithm
    #[error("unsupported key length {0}")]
    KeyLength(usize),

    /// Nonce length not supported by the algorithm
    #[error("unsupported nonce length {0}")]
    NonceLength(usize),

    /// Tag length not supported by the algorithm
    #[error("unsupported tag length {0}")]
    TagLength(usize),

    /// Operation issued out of order
    #[error("operation not valid in stage {0:?}")]
    InvalidState(Stage),

    /// Operation not valid for the bound direction
    #[error("operation not valid for {0:?} context")]
    WrongDirection(Direction),

    /// Output buffer shorter than the input
    #[error("output buffer too small: need {needed}, have {available}")]
    OutputTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// `update` produced a different amount of output than it consumed
    #[error("expected {expected} output bytes, got {actual}")]
    OutputLength {
        /// Bytes expected
        expected: usize,
        /// Bytes produced
        actual: usize,
    },

    /// `finalize` produced output although the algorithm never pads
    #[error("unexpected {0} bytes of final output")]
    UnexpectedOutput(usize),

    /// Decrypt finalized without an expected tag
    #[error("expected tag not set")]
    TagNotSet,

    /// Computed tag differs from the expected tag
    #[error("authentication tag mismatch")]
    TagMismatch,

    /// Keystream position would overflow the block counter
    #[error("keystream exhausted")]
    KeystreamExhausted,
}

/// Low-level AEAD cipher context.
///
/// Implementations own their handle exclusively and release it on drop.
/// Every method either succeeds or reports a [`PrimitiveError`]; none of them
/// panic on bad ordering.
pub trait CipherContext: Sized {
    /// Allocate a context bound to `algorithm` and `direction`.
    fn new(algorithm: Algorithm, direction: Direction) -> Result<Self, PrimitiveError>;

    /// Direction fixed at allocation.
    fn direction(&self) -> Direction;

    /// Declare the key length that `set_key` will receive.
    fn set_key_length(&mut self, len: usize) -> Result<(), PrimitiveError>;

    /// Bind the key. Only valid once, before any nonce.
    fn set_key(&mut self, key: &[u8]) -> Result<(), PrimitiveError>;

    /// Declare the nonce length that `set_nonce` will receive.
    fn set_nonce_length(&mut self, len: usize) -> Result<(), PrimitiveError>;

    /// Bind a fresh nonce, discarding any in-progress message.
    fn set_nonce(&mut self, nonce: &[u8]) -> Result<(), PrimitiveError>;

    /// Provide the tag `finalize` must verify (decrypt only).
    fn set_expected_tag(&mut self, tag: &[u8]) -> Result<(), PrimitiveError>;

    /// Absorb associated data (authenticated, not transformed).
    fn update_aad(&mut self, aad: &[u8]) -> Result<(), PrimitiveError>;

    /// Transform `input` into `output`, returning the number of bytes written.
    fn update(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, PrimitiveError>;

    /// Complete the message, returning the number of trailing output bytes.
    ///
    /// For decryption this is where authentication fails.
    fn finalize(&mut self) -> Result<usize, PrimitiveError>;

    /// Tag produced by the last encryption.
    fn tag(&self) -> Result<[u8; TAG_SIZE], PrimitiveError>;
}

/// RFC 8439 ChaCha20-Poly1305 cipher context.
pub struct ChaCha20Poly1305Context {
    direction: Direction,
    stage: Stage,
    key_len: usize,
    nonce_len: usize,
    key: Zeroizing<[u8; KEY_SIZE]>,
    cipher: Option<ChaCha20>,
    mac: Option<Poly1305>,
    aad_len: u64,
    payload_len: u64,
    expected_tag: Option<[u8; TAG_SIZE]>,
    tag: Option<[u8; TAG_SIZE]>,
}

impl ChaCha20Poly1305Context {
    /// Current lifecycle stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn require(&self, allowed: &[Stage]) -> Result<(), PrimitiveError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(PrimitiveError::InvalidState(self.stage))
        }
    }
}

impl fmt::Debug for ChaCha20Poly1305Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaCha20Poly1305Context")
            .field("direction", &self.direction)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl CipherContext for ChaCha20Poly1305Context {
    fn new(algorithm: Algorithm, direction: Direction) -> Result<Self, PrimitiveError> {
        match algorithm {
            Algorithm::ChaCha20Poly1305 => Ok(Self {
                direction,
                stage: Stage::Unkeyed,
                key_len: KEY_SIZE,
                nonce_len: NONCE_SIZE,
                key: Zeroizing::new([0u8; KEY_SIZE]),
                cipher: None,
                mac: None,
                aad_len: 0,
                payload_len: 0,
                expected_tag: None,
                tag: None,
            }),
        }
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn set_key_length(&mut self, len: usize) -> Result<(), PrimitiveError> {
        self.require(&[Stage::Unkeyed])?;
        if len != KEY_SIZE {
            return Err(PrimitiveError::KeyLength(len));
        }
        self.key_len = len;
        Ok(())
    }

    fn set_key(&mut self, key: &[u8]) -> Result<(), PrimitiveError> {
        self.require(&[Stage::Unkeyed])?;
        if key.len() != self.key_len {
            return Err(PrimitiveError::KeyLength(key.len()));
        }
        self.key.copy_from_slice(key);
        self.stage = Stage::Keyed;
        Ok(())
    }

    fn set_nonce_length(&mut self, len: usize) -> Result<(), PrimitiveError> {
        self.require(&[Stage::Unkeyed, Stage::Keyed])?;
        if len != NONCE_SIZE {
            return Err(PrimitiveError::NonceLength(len));
        }
        self.nonce_len = len;
        Ok(())
    }

    fn set_nonce(&mut self, nonce: &[u8]) -> Result<(), PrimitiveError> {
        if self.stage == Stage::Unkeyed {
            return Err(PrimitiveError::InvalidState(self.stage));
        }
        if nonce.len() != self.nonce_len {
            return Err(PrimitiveError::NonceLength(nonce.len()));
        }

        let mut cipher = <ChaCha20 as KeyIvInit>::new(
            chacha20::Key::from_slice(&self.key[..]),
            chacha20::Nonce::from_slice(nonce),
        );

        // Block 0 of the keystream keys the one-time authenticator.
        let mut mac_key = Zeroizing::new([0u8; 32]);
        cipher.apply_keystream(&mut mac_key[..]);
        let mac = <Poly1305 as KeyInit>::new(poly1305::Key::from_slice(&mac_key[..]));
        cipher.seek(PAYLOAD_OFFSET);

        self.cipher = Some(cipher);
        self.mac = Some(mac);
        self.aad_len = 0;
        self.payload_len = 0;
        self.expected_tag = None;
        self.tag = None;
        self.stage = Stage::NonceSet;
        Ok(())
    }

    fn set_expected_tag(&mut self, tag: &[u8]) -> Result<(), PrimitiveError> {
        if self.direction != Direction::Decrypt {
            return Err(PrimitiveError::WrongDirection(self.direction));
        }
        self.require(&[Stage::NonceSet, Stage::AadFed, Stage::PayloadFed])?;
        let tag: [u8; TAG_SIZE] = tag
            .try_into()
            .map_err(|_| PrimitiveError::TagLength(tag.len()))?;
        self.expected_tag = Some(tag);
        Ok(())
    }

    fn update_aad(&mut self, aad: &[u8]) -> Result<(), PrimitiveError> {
        self.require(&[Stage::NonceSet])?;
        let mac = self
            .mac
            .as_mut()
            .ok_or(PrimitiveError::InvalidState(self.stage))?;
        mac.update_padded(aad);
        self.aad_len = aad.len() as u64;
        self.stage = Stage::AadFed;
        Ok(())
    }

    fn update(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, PrimitiveError> {
        self.require(&[Stage::NonceSet, Stage::AadFed])?;
        if output.len() < input.len() {
            return Err(PrimitiveError::OutputTooSmall {
                needed: input.len(),
                available: output.len(),
            });
        }

        let (Some(cipher), Some(mac)) = (self.cipher.as_mut(), self.mac.as_mut()) else {
            return Err(PrimitiveError::InvalidState(self.stage));
        };

        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        match self.direction {
            Direction::Encrypt => {
                cipher
                    .try_apply_keystream(out)
                    .map_err(|_| PrimitiveError::KeystreamExhausted)?;
                mac.update_padded(out);
            }
            Direction::Decrypt => {
                mac.update_padded(input);
                cipher
                    .try_apply_keystream(out)
                    .map_err(|_| PrimitiveError::KeystreamExhausted)?;
            }
        }

        self.payload_len = input.len() as u64;
        self.stage = Stage::PayloadFed;
        Ok(input.len())
    }

    fn finalize(&mut self) -> Result<usize, PrimitiveError> {
        self.require(&[Stage::NonceSet, Stage::AadFed, Stage::PayloadFed])?;
        if self.direction == Direction::Decrypt && self.expected_tag.is_none() {
            return Err(PrimitiveError::TagNotSet);
        }
        let mut mac = self
            .mac
            .take()
            .ok_or(PrimitiveError::InvalidState(self.stage))?;

        let mut lengths = [0u8; 16];
        lengths[..8].copy_from_slice(&self.aad_len.to_le_bytes());
        lengths[8..].copy_from_slice(&self.payload_len.to_le_bytes());
        mac.update_padded(&lengths);

        let mut computed = [0u8; TAG_SIZE];
        computed.copy_from_slice(mac.finalize().as_slice());

        self.cipher = None;
        self.stage = Stage::Finalized;

        match self.direction {
            Direction::Encrypt => {
                self.tag = Some(computed);
                Ok(0)
            }
            Direction::Decrypt => match self.expected_tag.take() {
                Some(expected) if verify_16(&computed, &expected) => Ok(0),
                Some(_) => Err(PrimitiveError::TagMismatch),
                None => Err(PrimitiveError::TagNotSet),
            },
        }
    }

    fn tag(&self) -> Result<[u8; TAG_SIZE], PrimitiveError> {
        if self.direction != Direction::Encrypt {
            return Err(PrimitiveError::WrongDirection(self.direction));
        }
        self.tag.ok_or(PrimitiveError::InvalidState(self.stage))
    }
}
