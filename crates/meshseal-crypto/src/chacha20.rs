//! ChaCha20 stream cipher core.
//!
//! Produces 64-byte keystream blocks from a 256-bit key, a 96-bit nonce and
//! a 32-bit block counter using 20 rounds of the add-rotate-XOR
//! permutation.
//!
//! ## State layout
//!
//! | Words | Content |
//! |-------|---------|
//! | 0..4 | `"expand 32-byte k"` constants |
//! | 4..12 | Key, little-endian |
//! | 12 | Block counter |
//! | 13..16 | Nonce, little-endian |
//!
//! [`ChaCha20`] owns counter advancement: every consumed 64-byte block moves
//! the counter forward by one, so a keystream block is never produced twice
//! within one stream.

use crate::wipe::{secure_wipe, secure_wipe_words};
use crate::{KEY_SIZE, NONCE_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Keystream block size (64 bytes).
pub const BLOCK_SIZE: usize = 64;

const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

const COUNTER_WORD: usize = 12;

/// ChaCha20 input state: 16 32-bit words.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChaChaState([u32; 16]);

impl ChaChaState {
    /// Build the input state for `(key, nonce, counter)`.
    #[must_use]
    pub fn new(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], counter: u32) -> Self {
        let mut words = [0u32; 16];
        words[..4].copy_from_slice(&CONSTANTS);
        for (i, chunk) in key.chunks_exact(4).enumerate() {
            words[4 + i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        words[COUNTER_WORD] = counter;
        for (i, chunk) in nonce.chunks_exact(4).enumerate() {
            words[13 + i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self(words)
    }

    /// Current block counter.
    #[must_use]
    pub fn counter(&self) -> u32 {
        self.0[COUNTER_WORD]
    }

    /// Overwrite the block counter.
    pub fn set_counter(&mut self, counter: u32) {
        self.0[COUNTER_WORD] = counter;
    }

    /// Raw state words.
    #[must_use]
    pub fn words(&self) -> &[u32; 16] {
        &self.0
    }

    /// Generate the keystream block for this state.
    #[must_use]
    pub fn block(&self) -> [u8; BLOCK_SIZE] {
        generate_block(&self.0)
    }
}

/// One quarter round over four words of the working array.
#[inline(always)]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[a] = x[a].wrapping_add(x[b]);
    x[d] = (x[d] ^ x[a]).rotate_left(16);

    x[c] = x[c].wrapping_add(x[d]);
    x[b] = (x[b] ^ x[c]).rotate_left(12);

    x[a] = x[a].wrapping_add(x[b]);
    x[d] = (x[d] ^ x[a]).rotate_left(8);

    x[c] = x[c].wrapping_add(x[d]);
    x[b] = (x[b] ^ x[c]).rotate_left(7);
}

/// Generate one 64-byte keystream block.
///
/// Deterministic pure function of the 16-word state: 10 double rounds
/// (column round then diagonal round), feed-forward of the input state with
/// 32-bit wraparound, little-endian serialisation.
#[must_use]
pub fn generate_block(state: &[u32; 16]) -> [u8; BLOCK_SIZE] {
    let mut working = *state;

    for _ in 0..10 {
        // Column round
        quarter_round(&mut working, 0, 4, 8, 12);
        quarter_round(&mut working, 1, 5, 9, 13);
        quarter_round(&mut working, 2, 6, 10, 14);
        quarter_round(&mut working, 3, 7, 11, 15);

        // Diagonal round
        quarter_round(&mut working, 0, 5, 10, 15);
        quarter_round(&mut working, 1, 6, 11, 12);
        quarter_round(&mut working, 2, 7, 8, 13);
        quarter_round(&mut working, 3, 4, 9, 14);
    }

    let mut out = [0u8; BLOCK_SIZE];
    for (i, word) in working.iter_mut().enumerate() {
        *word = word.wrapping_add(state[i]);
        out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }

    secure_wipe_words(&mut working);
    out
}

/// Keystream block for an explicit `(key, nonce, counter)`.
#[must_use]
pub fn chacha20_block(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    counter: u32,
) -> [u8; BLOCK_SIZE] {
    ChaChaState::new(key, nonce, counter).block()
}

/// ChaCha20 keystream generator with a cached block and a cursor.
///
/// The cache holds the most recently generated block; `position` marks how
/// much of it has been consumed. A fresh block is generated, and the
/// counter advanced, whenever the cache is exhausted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChaCha20 {
    state: ChaChaState,
    keystream: [u8; BLOCK_SIZE],
    position: usize,
}

impl ChaCha20 {
    /// Create a keystream starting at block `counter`.
    #[must_use]
    pub fn new(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], counter: u32) -> Self {
        Self {
            state: ChaChaState::new(key, nonce, counter),
            keystream: [0u8; BLOCK_SIZE],
            position: BLOCK_SIZE,
        }
    }

    /// Counter of the next block that will be generated.
    #[must_use]
    pub fn counter(&self) -> u32 {
        self.state.counter()
    }

    /// Take a whole block at the current counter, bypassing the cache.
    ///
    /// Advances the counter and discards any partially consumed cached
    /// block, so subsequent [`apply_keystream`](Self::apply_keystream) calls
    /// start on a fresh block.
    pub fn next_block(&mut self) -> [u8; BLOCK_SIZE] {
        let block = self.state.block();
        self.advance();
        secure_wipe(&mut self.keystream);
        self.position = BLOCK_SIZE;
        block
    }

    /// XOR `data` in place with the next `data.len()` keystream bytes.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        let mut offset = 0;
        while offset < data.len() {
            if self.position >= BLOCK_SIZE {
                self.refill();
            }

            let take = (BLOCK_SIZE - self.position).min(data.len() - offset);
            let ks = &self.keystream[self.position..self.position + take];
            for (byte, k) in data[offset..offset + take].iter_mut().zip(ks) {
                *byte ^= k;
            }

            self.position += take;
            offset += take;
        }
    }

    fn refill(&mut self) {
        self.keystream = self.state.block();
        self.advance();
        self.position = 0;
    }

    fn advance(&mut self) {
        let next = self.state.counter().wrapping_add(1);
        self.state.set_counter(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        key
    }

    #[test]
    fn test_quarter_round_rfc8439_2_1_1() {
        let mut x = [0u32; 16];
        x[0] = 0x1111_1111;
        x[1] = 0x0102_0304;
        x[2] = 0x9b8d_6f43;
        x[3] = 0x0123_4567;

        quarter_round(&mut x, 0, 1, 2, 3);

        assert_eq!(x[0], 0xea2a_92f4);
        assert_eq!(x[1], 0xcb1c_f8ce);
        assert_eq!(x[2], 0x4581_472e);
        assert_eq!(x[3], 0x5881_c4bb);
    }

    #[test]
    fn test_state_layout() {
        let key = sequential_key();
        let nonce = [0, 0, 0, 9, 0, 0, 0, 0x4a, 0, 0, 0, 0];
        let state = ChaChaState::new(&key, &nonce, 1);
        let w = state.words();

        assert_eq!(&w[..4], &CONSTANTS);
        assert_eq!(w[4], 0x0302_0100);
        assert_eq!(w[11], 0x1f1e_1d1c);
        assert_eq!(w[12], 1);
        assert_eq!(w[13], 0x0900_0000);
        assert_eq!(w[14], 0x4a00_0000);
        assert_eq!(w[15], 0);
    }

    #[test]
    fn test_block_is_deterministic() {
        let key = [7u8; 32];
        let nonce = [3u8; 12];
        assert_eq!(chacha20_block(&key, &nonce, 5), chacha20_block(&key, &nonce, 5));
        assert_ne!(chacha20_block(&key, &nonce, 5), chacha20_block(&key, &nonce, 6));
    }

    #[test]
    fn test_keystream_advances_counter_per_block() {
        let key = [0x11u8; 32];
        let nonce = [0x22u8; 12];

        let mut cipher = ChaCha20::new(&key, &nonce, 1);
        let mut data = [0u8; 200];
        cipher.apply_keystream(&mut data);

        assert_eq!(&data[..64], &chacha20_block(&key, &nonce, 1));
        assert_eq!(&data[64..128], &chacha20_block(&key, &nonce, 2));
        assert_eq!(&data[128..192], &chacha20_block(&key, &nonce, 3));
        assert_eq!(&data[192..], &chacha20_block(&key, &nonce, 4)[..8]);
        assert_eq!(cipher.counter(), 5);
    }

    #[test]
    fn test_keystream_chunking_is_transparent() {
        let key = [0x33u8; 32];
        let nonce = [0x44u8; 12];

        let mut whole = [0u8; 150];
        ChaCha20::new(&key, &nonce, 0).apply_keystream(&mut whole);

        let mut pieces = [0u8; 150];
        let mut cipher = ChaCha20::new(&key, &nonce, 0);
        for chunk in pieces.chunks_mut(7) {
            cipher.apply_keystream(chunk);
        }

        assert_eq!(whole, pieces);
    }

    #[test]
    fn test_next_block_skips_to_fresh_block() {
        let key = [0x55u8; 32];
        let nonce = [0x66u8; 12];

        let mut cipher = ChaCha20::new(&key, &nonce, 0);
        let first = cipher.next_block();
        assert_eq!(first, chacha20_block(&key, &nonce, 0));

        let mut data = [0u8; 16];
        cipher.apply_keystream(&mut data);
        assert_eq!(&data, &chacha20_block(&key, &nonce, 1)[..16]);
    }
}
