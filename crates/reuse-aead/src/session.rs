//! Framed duplex session over two reusable engines.
//!
//! Each direction has its own key, engine, and 64-bit message counter. The
//! counter forms the nonce (`4 zero bytes || counter LE`), so a session never
//! needs to transmit nonces.
//!
//! Wire format of a frame:
//!
//! ```text
//! +-----------------+----------------------+-----------+
//! | len (u16 LE)    | ciphertext (len)     | tag (16)  |
//! +-----------------+----------------------+-----------+
//! ```
//!
//! The two length bytes are the frame's associated data.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::engine::AeadEngine;
use crate::{AeadError, NONCE_SIZE, TAG_SIZE};

/// Size of the frame length prefix.
pub const FRAME_LEN_SIZE: usize = 2;

/// Default maximum plaintext bytes per frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024;

/// Session tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum plaintext bytes carried by one frame (1..=65535).
    pub max_frame_len: usize,

    /// Frames allowed per direction before the session must be rekeyed.
    pub max_messages: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_messages: u64::MAX,
        }
    }
}

impl SessionConfig {
    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::Config` if a value is out of range.
    pub fn validate(&self) -> Result<(), AeadError> {
        if self.max_frame_len == 0 || self.max_frame_len > usize::from(u16::MAX) {
            return Err(AeadError::Config(format!(
                "max_frame_len must be between 1 and {}, got {}",
                u16::MAX,
                self.max_frame_len
            )));
        }
        if self.max_messages == 0 {
            return Err(AeadError::Config(
                "max_messages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build the nonce for message number `counter`.
#[must_use]
pub fn counter_nonce(counter: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[4..].copy_from_slice(&counter.to_le_bytes());
    nonce
}

/// Bidirectional framed session.
///
/// Frames must be opened in the order they were sealed; the receive counter
/// only advances on successful authentication.
pub struct SessionCipher {
    send: AeadEngine,
    recv: AeadEngine,
    send_counter: u64,
    recv_counter: u64,
    config: SessionConfig,
}

impl SessionCipher {
    /// Create a session with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::InvalidKey` if either key is not 32 bytes.
    pub fn new(send_key: &[u8], recv_key: &[u8]) -> Result<Self, AeadError> {
        Self::with_config(send_key, recv_key, SessionConfig::default())
    }

    /// Create a session with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::Config` if `config` is invalid, or
    /// `AeadError::InvalidKey` if either key is not 32 bytes.
    pub fn with_config(
        send_key: &[u8],
        recv_key: &[u8],
        config: SessionConfig,
    ) -> Result<Self, AeadError> {
        config.validate()?;
        let session = Self {
            send: AeadEngine::new(send_key)?,
            recv: AeadEngine::new(recv_key)?,
            send_counter: 0,
            recv_counter: 0,
            config,
        };
        debug!(
            max_frame_len = config.max_frame_len,
            max_messages = config.max_messages,
            "session established"
        );
        Ok(session)
    }

    /// Seal a single frame.
    ///
    /// # Errors
    ///
    /// - `AeadError::TooLarge` if `payload` exceeds `max_frame_len`
    /// - `AeadError::NonceExhausted` if the send counter reached `max_messages`
    pub fn seal_frame(&mut self, payload: &[u8]) -> Result<Vec<u8>, AeadError> {
        let max = self.config.max_frame_len;
        let too_large = || AeadError::TooLarge {
            len: payload.len() as u64,
            max: max as u64,
        };
        if payload.len() > max {
            return Err(too_large());
        }
        let len = u16::try_from(payload.len()).map_err(|_| too_large())?;

        if self.send_counter >= self.config.max_messages {
            warn!(counter = self.send_counter, "send counter exhausted");
            return Err(AeadError::NonceExhausted);
        }

        let aad = len.to_le_bytes();
        let nonce = counter_nonce(self.send_counter);
        let sealed = self.send.encrypt(&nonce, payload, Some(aad.as_slice()))?;
        self.send_counter += 1;

        let mut frame = Vec::with_capacity(FRAME_LEN_SIZE + sealed.len());
        frame.extend_from_slice(&aad);
        frame.extend_from_slice(&sealed);
        Ok(frame)
    }

    /// Split `data` into frames and seal them all.
    ///
    /// Empty input produces no frames. Nothing is sealed unless the send
    /// counter has room for every frame.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::NonceExhausted` if `data` needs more frames than
    /// the send counter has left.
    pub fn seal(&mut self, data: &[u8]) -> Result<Vec<u8>, AeadError> {
        let max = self.config.max_frame_len;
        let frames = data.len().div_ceil(max) as u64;
        let remaining = self.config.max_messages - self.send_counter;
        if frames > remaining {
            warn!(frames, remaining, "not enough send counter space");
            return Err(AeadError::NonceExhausted);
        }

        let overhead = frames as usize * (FRAME_LEN_SIZE + TAG_SIZE);
        let mut out = Vec::with_capacity(data.len() + overhead);
        for chunk in data.chunks(max) {
            out.extend_from_slice(&self.seal_frame(chunk)?);
        }
        Ok(out)
    }

    /// Open every complete frame at the front of `buf`.
    ///
    /// Returns the concatenated plaintext and the number of bytes consumed.
    /// A trailing partial frame is left for the caller to complete. On error
    /// no frame from this call is released and the receive counter is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - `AeadError::InvalidInput` if a length field exceeds `max_frame_len`
    /// - `AeadError::NonceExhausted` if the receive counter reached `max_messages`
    /// - `AeadError::Authentication` if a frame fails verification
    pub fn open(&mut self, buf: &[u8]) -> Result<(Vec<u8>, usize), AeadError> {
        let mut plaintext = Zeroizing::new(Vec::new());
        let mut counter = self.recv_counter;
        let mut consumed = 0;

        while let Some(header) = buf.get(consumed..consumed + FRAME_LEN_SIZE) {
            let len = usize::from(u16::from_le_bytes([header[0], header[1]]));
            if len > self.config.max_frame_len {
                return Err(AeadError::InvalidInput("frame length exceeds maximum"));
            }

            let end = consumed + FRAME_LEN_SIZE + len + TAG_SIZE;
            let Some(body) = buf.get(consumed + FRAME_LEN_SIZE..end) else {
                break;
            };

            if counter >= self.config.max_messages {
                warn!(counter, "receive counter exhausted");
                return Err(AeadError::NonceExhausted);
            }

            let frame = Zeroizing::new(self.recv.decrypt(
                &counter_nonce(counter),
                body,
                Some(header),
            )?);
            plaintext.extend_from_slice(&frame);
            counter += 1;
            consumed = end;
        }

        self.recv_counter = counter;
        Ok((core::mem::take(&mut *plaintext), consumed))
    }

    /// Whether either direction has used up its counter.
    #[must_use]
    pub fn needs_rekey(&self) -> bool {
        self.send_counter >= self.config.max_messages
            || self.recv_counter >= self.config.max_messages
    }

    /// Install fresh keys and reset both counters.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::InvalidKey` if either key is not 32 bytes; the
    /// session keeps its old keys in that case.
    pub fn rekey(&mut self, send_key: &[u8], recv_key: &[u8]) -> Result<(), AeadError> {
        let send = AeadEngine::new(send_key)?;
        let recv = AeadEngine::new(recv_key)?;
        info!(
            sent = self.send_counter,
            received = self.recv_counter,
            "session rekeyed"
        );
        self.send = send;
        self.recv = recv;
        self.send_counter = 0;
        self.recv_counter = 0;
        Ok(())
    }

    /// Frames sealed since the last (re)key.
    #[must_use]
    pub fn send_counter(&self) -> u64 {
        self.send_counter
    }

    /// Frames opened since the last (re)key.
    #[must_use]
    pub fn recv_counter(&self) -> u64 {
        self.recv_counter
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl core::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCipher")
            .field("send_counter", &self.send_counter)
            .field("recv_counter", &self.recv_counter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
