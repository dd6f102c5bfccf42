//! Shared helpers for the reuse-aead integration tests.

use std::sync::Once;

use reuse_aead::{SessionCipher, SessionConfig};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `reuse_aead=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("reuse_aead=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Build two ends of a session that talk to each other.
pub fn session_pair(
    a_to_b: &[u8; 32],
    b_to_a: &[u8; 32],
    config: SessionConfig,
) -> (SessionCipher, SessionCipher) {
    let a = SessionCipher::with_config(a_to_b, b_to_a, config).expect("valid session keys");
    let b = SessionCipher::with_config(b_to_a, a_to_b, config).expect("valid session keys");
    (a, b)
}
