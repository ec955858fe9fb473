//! Fuzz target for the AEAD
//!
//! Checks seal/open against the RustCrypto implementation and that opening
//! arbitrary bytes never panics or releases plaintext.

#![no_main]

use arbitrary::Arbitrary;
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use libfuzzer_sys::fuzz_target;
use meshseal_crypto::{AeadKey, Nonce, Tag};

#[derive(Debug, Arbitrary)]
struct AeadInput {
    key: [u8; 32],
    nonce: [u8; 12],
    plaintext: Vec<u8>,
    aad: Vec<u8>,
    forged_tag: [u8; 16],
}

fuzz_target!(|input: AeadInput| {
    let key = AeadKey::new(input.key);
    let nonce = Nonce::from_bytes(input.nonce);

    let Ok((ciphertext, tag)) = key.seal(&nonce, &input.aad, &input.plaintext) else {
        return;
    };

    let reference = ChaCha20Poly1305::new(&input.key.into());
    let mut expected = input.plaintext.clone();
    let expected_tag = reference
        .encrypt_in_place_detached(&input.nonce.into(), &input.aad, &mut expected)
        .expect("reference seal");
    assert_eq!(ciphertext, expected);
    assert_eq!(tag.as_bytes().as_slice(), expected_tag.as_slice());

    let opened = key.open(&nonce, &input.aad, &ciphertext, &tag).expect("open own packet");
    assert_eq!(opened, input.plaintext);

    // Forged tags must be rejected with the buffer left as ciphertext
    let forged = Tag::from_bytes(input.forged_tag);
    if !forged.verify(&tag) {
        let mut buffer = ciphertext.clone();
        assert!(key.open_in_place(&nonce, &input.aad, &mut buffer, &forged).is_err());
        assert_eq!(buffer, ciphertext);
    }
});
