//! Fuzz target for the AEAD engine
//!
//! Tests that encrypt/decrypt handle arbitrary keys, nonces, and input
//! without panicking, and that the engine stays consistent across reuse.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use reuse_aead::AeadEngine;

#[derive(Debug, Arbitrary)]
struct CryptoInput {
    key: [u8; 32],
    nonce: Vec<u8>,
    plaintext: Vec<u8>,
    aad: Option<Vec<u8>>,
}

fuzz_target!(|input: CryptoInput| {
    let mut engine = AeadEngine::new(&input.key).expect("32-byte key");
    let aad = input.aad.as_deref();

    // Arbitrary data as ciphertext must never panic and never authenticate.
    let _ = engine.decrypt(&input.nonce, &input.plaintext, aad);

    if let Ok(ciphertext) = engine.encrypt(&input.nonce, &input.plaintext, aad) {
        let plaintext = engine
            .decrypt(&input.nonce, &ciphertext, aad)
            .expect("round trip must authenticate");
        assert_eq!(plaintext, input.plaintext);
    }
});
