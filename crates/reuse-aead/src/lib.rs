//! # Reuse AEAD
//!
//! ChaCha20-Poly1305 (RFC 8439) authenticated encryption that keeps its
//! cipher context alive between calls.
//!
//! A naive AEAD wrapper builds a fresh cipher object for every message. For
//! a long-lived duplex stream issuing many small messages that setup cost
//! dominates. [`AeadEngine`] instead binds one context per direction the
//! first time that direction is used, and afterwards only rebinds the nonce.
//!
//! This crate provides:
//! - [`AeadEngine`] - key owner and public encrypt/decrypt entry point
//! - [`ReusableAeadContext`] - one cipher context bound to a key and a direction
//! - [`primitive`] - the low-level cipher context capability and its
//!   ChaCha20-Poly1305 implementation
//! - [`SessionCipher`] - counter-nonce framed duplex stream built on two engines
//! - [`SharedAeadEngine`] - mutex-guarded engine for multi-threaded callers
//!
//! ## Parameters
//!
//! | Item | Size |
//! |------|------|
//! | Key | 32 bytes |
//! | Nonce | 12 bytes |
//! | Tag | 16 bytes, appended to the ciphertext |
//! | Plaintext / AAD | < 2^32 bytes |
//!
//! ## Threading
//!
//! An [`AeadEngine`] is single-owner. `encrypt` and `decrypt` take
//! `&mut self`: rebinding the nonce and processing the message is not
//! atomic, so one engine must never be driven from two threads at once.
//! Wrap it in a [`SharedAeadEngine`] when it has to be shared.
//!
//! ## Usage
//!
//! ```
//! use reuse_aead::{AeadEngine, generate_key};
//!
//! let key = generate_key()?;
//! let mut engine = AeadEngine::new(&key)?;
//! let nonce = [0u8; 12];
//!
//! let ciphertext = engine.encrypt(&nonce, b"secret", Some(b"header".as_slice()))?;
//! let plaintext = engine.decrypt(&nonce, &ciphertext, Some(b"header".as_slice()))?;
//! assert_eq!(plaintext, b"secret");
//! # Ok::<(), reuse_aead::AeadError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod constant_time;
pub mod context;
pub mod engine;
pub mod error;
pub mod key;
pub mod primitive;
pub mod session;
pub mod shared;

pub use context::ReusableAeadContext;
pub use engine::{AeadEngine, generate_key};
pub use error::AeadError;
pub use key::AeadKey;
pub use primitive::{ChaCha20Poly1305Context, CipherContext, Direction, PrimitiveError};
pub use session::{SessionCipher, SessionConfig, counter_nonce};
pub use shared::SharedAeadEngine;

/// ChaCha20-Poly1305 key size
pub const KEY_SIZE: usize = 32;

/// ChaCha20-Poly1305 nonce size
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size
pub const TAG_SIZE: usize = 16;

/// Largest accepted plaintext or associated data length (2^32 - 1 bytes)
pub const MAX_INPUT_LEN: u64 = u32::MAX as u64;
