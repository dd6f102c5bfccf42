//! Thread-shareable engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::AeadEngine;
use crate::key::AeadKey;
use crate::AeadError;

/// [`AeadEngine`] behind a mutex.
///
/// Clones share one engine, so concurrent callers serialize on the lock and
/// reuse the same pair of contexts. A panic while the lock is held does not
/// disable the engine: every call rebinds the nonce before touching the
/// context, so the recovered state is usable.
#[derive(Debug)]
pub struct SharedAeadEngine {
    inner: Arc<Mutex<AeadEngine>>,
}

impl SharedAeadEngine {
    /// Create a shared engine from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `AeadError::InvalidKey` unless `key` is exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, AeadError> {
        Ok(Self::from_engine(AeadEngine::new(key)?))
    }

    /// Create a shared engine that takes ownership of `key`.
    #[must_use]
    pub fn from_key(key: AeadKey) -> Self {
        Self::from_engine(AeadEngine::from_key(key))
    }

    /// Wrap an existing engine.
    #[must_use]
    pub fn from_engine(engine: AeadEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// See [`AeadEngine::encrypt`].
    ///
    /// # Errors
    ///
    /// Same as [`AeadEngine::encrypt`].
    pub fn encrypt(
        &self,
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, AeadError> {
        self.lock().encrypt(nonce, plaintext, associated_data)
    }

    /// See [`AeadEngine::decrypt`].
    ///
    /// # Errors
    ///
    /// Same as [`AeadEngine::decrypt`].
    pub fn decrypt(
        &self,
        nonce: &[u8],
        data: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, AeadError> {
        self.lock().decrypt(nonce, data, associated_data)
    }

    fn lock(&self) -> MutexGuard<'_, AeadEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for SharedAeadEngine {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Direction;
    use crate::{KEY_SIZE, NONCE_SIZE};
    use std::thread;

    #[test]
    fn test_clones_share_contexts() {
        let engine = SharedAeadEngine::new(&[3u8; KEY_SIZE]).unwrap();
        let other = engine.clone();

        let nonce = [1u8; NONCE_SIZE];
        let ct = engine.encrypt(&nonce, b"shared", None).unwrap();
        assert_eq!(other.decrypt(&nonce, &ct, None).unwrap(), b"shared");

        let guard = engine.lock();
        assert!(guard.has_context(Direction::Encrypt));
        assert!(guard.has_context(Direction::Decrypt));
    }

    #[test]
    fn test_concurrent_use() {
        let engine = SharedAeadEngine::new(&[4u8; KEY_SIZE]).unwrap();

        let handles: Vec<_> = (0u64..8)
            .map(|t| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for i in 0u64..50 {
                        let mut nonce = [0u8; NONCE_SIZE];
                        nonce[..8].copy_from_slice(&t.to_le_bytes());
                        nonce[8..].copy_from_slice(&(i as u32).to_le_bytes());
                        let msg = format!("thread {t} message {i}");
                        let ct = engine.encrypt(&nonce, msg.as_bytes(), None).unwrap();
                        let pt = engine.decrypt(&nonce, &ct, None).unwrap();
                        assert_eq!(pt, msg.as_bytes());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_recovers_from_poisoned_lock() {
        let engine = SharedAeadEngine::new(&[5u8; KEY_SIZE]).unwrap();
        let nonce = [7u8; NONCE_SIZE];
        let ct = engine.encrypt(&nonce, b"before", None).unwrap();

        let poisoner = engine.clone();
        let result = thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("poison the lock");
        })
        .join();
        assert!(result.is_err());
        assert!(engine.inner.is_poisoned());

        assert_eq!(engine.decrypt(&nonce, &ct, None).unwrap(), b"before");
        let again = engine.encrypt(&nonce, b"before", None).unwrap();
        assert_eq!(again, ct);
    }
}
