//! Fuzz target for the Poly1305 MAC
//!
//! Arbitrary chunking of the message must not change the tag.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use meshseal_crypto::poly1305::{Poly1305, poly1305};

#[derive(Debug, Arbitrary)]
struct MacInput {
    key: [u8; 32],
    message: Vec<u8>,
    cuts: Vec<u8>,
}

fuzz_target!(|input: MacInput| {
    let expected = poly1305(&input.key, &input.message);

    let mut mac = Poly1305::new(&input.key);
    let mut rest = input.message.as_slice();
    for cut in input.cuts {
        let take = usize::from(cut).min(rest.len());
        let (head, tail) = rest.split_at(take);
        mac.update(head);
        rest = tail;
    }
    mac.update(rest);

    assert_eq!(mac.finalize(), expected);
});
