//! Zeroization validation tests
//!
//! Verifies that key material is wiped and that candidate plaintext sits in
//! wipeable storage.

use reuse_aead::primitive::Algorithm;
use reuse_aead::{
    AeadEngine, AeadError, AeadKey, ChaCha20Poly1305Context, CipherContext, Direction,
    SessionCipher, TAG_SIZE,
};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

fn is_zeroed(data: &[u8]) -> bool {
    data.iter().all(|&b| b == 0)
}

fn assert_zeroize_on_drop<T: ZeroizeOnDrop>() {}

#[test]
fn test_key_types_zeroize_on_drop() {
    assert_zeroize_on_drop::<AeadKey>();
}

#[test]
fn test_aead_key_zeroization() {
    let mut key = AeadKey::new([42u8; 32]);
    assert!(!is_zeroed(key.as_bytes()));
    key.zeroize();
    assert!(is_zeroed(key.as_bytes()));
}

#[test]
fn test_candidate_plaintext_is_wipeable_after_tag_mismatch() {
    let key = [3u8; 32];
    let nonce = [4u8; 12];
    let mut engine = AeadEngine::new(&key).unwrap();
    let sealed = engine.encrypt(&nonce, b"sixteen byte msg", None).unwrap();
    let (ct, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    let mut bad_tag = [0u8; TAG_SIZE];
    bad_tag.copy_from_slice(tag);
    bad_tag[0] ^= 0xFF;

    let mut ctx =
        ChaCha20Poly1305Context::new(Algorithm::ChaCha20Poly1305, Direction::Decrypt).unwrap();
    ctx.set_key_length(32).unwrap();
    ctx.set_key(&key).unwrap();
    ctx.set_nonce_length(12).unwrap();
    ctx.set_nonce(&nonce).unwrap();
    ctx.set_expected_tag(&bad_tag).unwrap();

    let mut out = Zeroizing::new(vec![0u8; ct.len()]);
    assert_eq!(ctx.update(ct, &mut out).unwrap(), ct.len());
    assert_eq!(&out[..], b"sixteen byte msg");
    assert!(ctx.finalize().is_err());

    out.zeroize();
    assert!(is_zeroed(&out));
}

#[test]
fn test_session_rekey_replaces_keys() {
    let mut a = SessionCipher::new(&[1u8; 32], &[2u8; 32]).unwrap();
    let mut b = SessionCipher::new(&[2u8; 32], &[1u8; 32]).unwrap();
    let old = a.seal(b"old").unwrap();

    a.rekey(&[5u8; 32], &[6u8; 32]).unwrap();
    b.rekey(&[6u8; 32], &[5u8; 32]).unwrap();

    assert_eq!(b.open(&old), Err(AeadError::Authentication));
    let new = a.seal(b"new").unwrap();
    assert_eq!(b.open(&new).unwrap().0, b"new");
}
