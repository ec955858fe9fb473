//! Poly1305 one-time authenticator.
//!
//! Accumulates a message into a 128-bit tag using arithmetic modulo
//! 2^130 - 5 with five 26-bit limbs, so every product fits in a `u64` on
//! 32-bit targets.
//!
//! The key is single-use: `r` (clamped multiplier) and `s` (final pad) must
//! never authenticate two different messages. [`Poly1305::finalize`]
//! consumes the accumulator, so a finalized state cannot be fed again.

use crate::constant_time::ct_select_u32;
use crate::wipe::secure_wipe;
use subtle::Choice;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Poly1305 one-time key size (32 bytes: `r` then `s`).
pub const KEY_SIZE: usize = 32;

/// Poly1305 block size (16 bytes).
pub const BLOCK_SIZE: usize = 16;

/// Poly1305 tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

const LIMB_MASK: u32 = 0x03ff_ffff;

/// Bit 128 of a full block, expressed in the top limb.
const FULL_BLOCK_BIT: u32 = 1 << 24;

#[inline(always)]
fn le32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Split 16 little-endian bytes into five 26-bit limbs.
#[inline(always)]
fn limbs(bytes: &[u8]) -> [u32; 5] {
    [
        le32(&bytes[0..4]) & LIMB_MASK,
        (le32(&bytes[3..7]) >> 2) & LIMB_MASK,
        (le32(&bytes[6..10]) >> 4) & LIMB_MASK,
        (le32(&bytes[9..13]) >> 6) & LIMB_MASK,
        le32(&bytes[12..16]) >> 8,
    ]
}

/// `h = (h + block) * r mod 2^130 - 5` for one 16-byte block.
///
/// `hibit` is [`FULL_BLOCK_BIT`] for full message blocks and zero for the
/// final padded block, whose explicit `0x01` byte already marks its end.
fn mac_block(h: &mut [u32; 5], r: &[u32; 5], block: &[u8], hibit: u32) {
    debug_assert_eq!(block.len(), BLOCK_SIZE);

    let m = limbs(block);
    let h0 = u64::from(h[0] + m[0]);
    let h1 = u64::from(h[1] + m[1]);
    let h2 = u64::from(h[2] + m[2]);
    let h3 = u64::from(h[3] + m[3]);
    let h4 = u64::from(h[4] + (m[4] | hibit));

    let [r0, r1, r2, r3, r4] = r.map(u64::from);

    // 2^130 = 5 mod p: limbs that overflow past 2^130 fold back times 5.
    let s1 = r1 * 5;
    let s2 = r2 * 5;
    let s3 = r3 * 5;
    let s4 = r4 * 5;

    let d0 = h0 * r0 + h1 * s4 + h2 * s3 + h3 * s2 + h4 * s1;
    let mut d1 = h0 * r1 + h1 * r0 + h2 * s4 + h3 * s3 + h4 * s2;
    let mut d2 = h0 * r2 + h1 * r1 + h2 * r0 + h3 * s4 + h4 * s3;
    let mut d3 = h0 * r3 + h1 * r2 + h2 * r1 + h3 * r0 + h4 * s4;
    let mut d4 = h0 * r4 + h1 * r3 + h2 * r2 + h3 * r1 + h4 * r0;

    // Carry across limb boundaries.
    d1 += d0 >> 26;
    d2 += d1 >> 26;
    d3 += d2 >> 26;
    d4 += d3 >> 26;

    // Wrap the top limb's overflow back through x5.
    let t0 = (d0 & u64::from(LIMB_MASK)) + (d4 >> 26) * 5;

    h[0] = (t0 as u32) & LIMB_MASK;
    h[1] = ((d1 as u32) & LIMB_MASK) + (t0 >> 26) as u32;
    h[2] = (d2 as u32) & LIMB_MASK;
    h[3] = (d3 as u32) & LIMB_MASK;
    h[4] = (d4 as u32) & LIMB_MASK;
}

/// Poly1305 accumulator.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Poly1305 {
    /// Clamped multiplier key as 26-bit limbs
    r: [u32; 5],
    /// Accumulator
    h: [u32; 5],
    /// Final pad `s`
    pad: [u32; 4],
    /// Pending partial block
    buffer: [u8; BLOCK_SIZE],
    /// Bytes held in `buffer`
    leftover: usize,
}

impl Poly1305 {
    /// Initialise from a one-time key.
    ///
    /// Clears the top four bits of bytes 3, 7, 11, 15 and the low two bits
    /// of bytes 4, 8, 12 of `r`, which keeps every limb product within
    /// `u64` range during multiplication.
    #[must_use]
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        let mut r_bytes = [0u8; 16];
        r_bytes.copy_from_slice(&key[..16]);
        for i in [3, 7, 11, 15] {
            r_bytes[i] &= 0x0f;
        }
        for i in [4, 8, 12] {
            r_bytes[i] &= 0xfc;
        }

        let r = limbs(&r_bytes);
        secure_wipe(&mut r_bytes);

        let pad = [
            le32(&key[16..20]),
            le32(&key[20..24]),
            le32(&key[24..28]),
            le32(&key[28..32]),
        ];

        Self {
            r,
            h: [0; 5],
            pad,
            buffer: [0u8; BLOCK_SIZE],
            leftover: 0,
        }
    }

    /// Absorb message bytes.
    ///
    /// Partial blocks are buffered across calls, so chunking does not
    /// change the resulting tag.
    pub fn update(&mut self, mut data: &[u8]) {
        if self.leftover > 0 {
            let take = (BLOCK_SIZE - self.leftover).min(data.len());
            self.buffer[self.leftover..self.leftover + take].copy_from_slice(&data[..take]);
            self.leftover += take;
            data = &data[take..];

            if self.leftover < BLOCK_SIZE {
                return;
            }
            mac_block(&mut self.h, &self.r, &self.buffer, FULL_BLOCK_BIT);
            self.leftover = 0;
        }

        let mut blocks = data.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            mac_block(&mut self.h, &self.r, block, FULL_BLOCK_BIT);
        }

        let rest = blocks.remainder();
        self.buffer[..rest.len()].copy_from_slice(rest);
        self.leftover = rest.len();
    }

    /// Zero-pad the pending partial block (if any) to 16 bytes and absorb it.
    ///
    /// The padding bytes are message bytes, so the block is absorbed as a
    /// full block.
    pub fn pad_to_block(&mut self) {
        if self.leftover == 0 {
            return;
        }
        self.buffer[self.leftover..].fill(0);
        mac_block(&mut self.h, &self.r, &self.buffer, FULL_BLOCK_BIT);
        self.leftover = 0;
    }

    /// Produce the tag, consuming the accumulator.
    #[must_use]
    pub fn finalize(mut self) -> [u8; TAG_SIZE] {
        if self.leftover > 0 {
            self.buffer[self.leftover] = 1;
            self.buffer[self.leftover + 1..].fill(0);
            mac_block(&mut self.h, &self.r, &self.buffer, 0);
            self.leftover = 0;
        }

        let [mut h0, mut h1, mut h2, mut h3, mut h4] = self.h;

        // Full carry propagation.
        let mut c;
        c = h1 >> 26;
        h1 &= LIMB_MASK;
        h2 += c;
        c = h2 >> 26;
        h2 &= LIMB_MASK;
        h3 += c;
        c = h3 >> 26;
        h3 &= LIMB_MASK;
        h4 += c;
        c = h4 >> 26;
        h4 &= LIMB_MASK;
        h0 += c * 5;
        c = h0 >> 26;
        h0 &= LIMB_MASK;
        h1 += c;

        // g = h + 5 - 2^130, i.e. h - p
        let mut g0 = h0 + 5;
        c = g0 >> 26;
        g0 &= LIMB_MASK;
        let mut g1 = h1 + c;
        c = g1 >> 26;
        g1 &= LIMB_MASK;
        let mut g2 = h2 + c;
        c = g2 >> 26;
        g2 &= LIMB_MASK;
        let mut g3 = h3 + c;
        c = g3 >> 26;
        g3 &= LIMB_MASK;
        let g4 = h4.wrapping_add(c).wrapping_sub(1 << 26);

        // Borrow out of g4 means h < p: keep h, otherwise take h - p.
        let keep_h = Choice::from((g4 >> 31) as u8);
        h0 = ct_select_u32(keep_h, h0, g0);
        h1 = ct_select_u32(keep_h, h1, g1);
        h2 = ct_select_u32(keep_h, h2, g2);
        h3 = ct_select_u32(keep_h, h3, g3);
        h4 = ct_select_u32(keep_h, h4, g4);

        // h mod 2^128 as four 32-bit words
        let words = [
            h0 | (h1 << 26),
            (h1 >> 6) | (h2 << 20),
            (h2 >> 12) | (h3 << 14),
            (h3 >> 18) | (h4 << 8),
        ];

        // tag = (h + s) mod 2^128
        let mut tag = [0u8; TAG_SIZE];
        let mut acc = 0u64;
        for (i, (word, pad)) in words.iter().zip(self.pad.iter()).enumerate() {
            acc += u64::from(*word) + u64::from(*pad);
            tag[i * 4..i * 4 + 4].copy_from_slice(&(acc as u32).to_le_bytes());
            acc >>= 32;
        }

        tag
    }
}

/// One-shot Poly1305 over `message`.
#[must_use]
pub fn poly1305(key: &[u8; KEY_SIZE], message: &[u8]) -> [u8; TAG_SIZE] {
    let mut mac = Poly1305::new(key);
    mac.update(message);
    mac.finalize()
}
