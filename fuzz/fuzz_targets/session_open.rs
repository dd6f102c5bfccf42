//! Fuzz target for session frame parsing
//!
//! Feeds arbitrary byte streams to `SessionCipher::open`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use reuse_aead::{SessionCipher, SessionConfig};

fuzz_target!(|data: &[u8]| {
    let config = SessionConfig {
        max_frame_len: 256,
        ..SessionConfig::default()
    };
    let mut session =
        SessionCipher::with_config(&[0x11; 32], &[0x22; 32], config).expect("valid config");

    if let Ok((plaintext, consumed)) = session.open(data) {
        assert!(consumed <= data.len());
        assert!(plaintext.len() <= consumed);
    }
});
