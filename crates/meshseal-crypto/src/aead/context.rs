//! Single-message AEAD context.
//!
//! Lifecycle: [`AeadContext::new`] (or [`AeadContext::init`]) -> zero or
//! more [`add_associated_data`](AeadContext::add_associated_data) -> exactly
//! one seal or open. The context becomes terminal after the first seal or
//! open, whatever its outcome, and every later call fails with
//! [`CryptoError::Misuse`]. Cipher and MAC state are wiped as soon as the
//! tag has been produced or checked.
//!
//! ## Keystream allocation
//!
//! | Counter | Use |
//! |---------|-----|
//! | 0 | One-time Poly1305 key (first 32 bytes) |
//! | 1.. | Payload encryption, one block per 64 bytes |
//!
//! ## MAC input
//!
//! `aad || pad16 || ciphertext || pad16 || le64(aad_len) || le64(ct_len)`

use super::cipher::{AeadKey, NONCE_SIZE, Nonce, Tag};
use crate::CryptoError;
use crate::chacha20::{BLOCK_SIZE, ChaCha20};
use crate::poly1305::{self, Poly1305};
use crate::wipe::secure_wipe;
use std::fmt;
use zeroize::Zeroize;

/// Block counter reserved for the one-time MAC key.
const MAC_KEY_COUNTER: u32 = 0;

/// First block counter used for payload bytes.
const DATA_COUNTER: u32 = 1;

/// Longest payload one `(key, nonce)` can protect before the 32-bit block
/// counter would wrap.
pub const MAX_MESSAGE_LEN: u64 = (u32::MAX as u64) * BLOCK_SIZE as u64;

/// Lifecycle state of an [`AeadContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Accepting associated data; seal or open not yet called
    Ready,
    /// Terminal: a tag was produced
    Sealed,
    /// Terminal: a tag was checked (successfully or not)
    Opened,
}

/// Secrets live only while the context is `Ready`.
struct Live {
    cipher: ChaCha20,
    mac: Poly1305,
    aad_len: u64,
}

impl Live {
    /// Absorb the ciphertext and length trailer, then produce the tag.
    fn authenticate(mut mac: Poly1305, aad_len: u64, ciphertext: &[u8]) -> Tag {
        mac.pad_to_block();
        mac.update(ciphertext);
        mac.pad_to_block();

        let mut trailer = [0u8; poly1305::BLOCK_SIZE];
        trailer[..8].copy_from_slice(&aad_len.to_le_bytes());
        trailer[8..].copy_from_slice(&(ciphertext.len() as u64).to_le_bytes());
        mac.update(&trailer);

        Tag::from_bytes(mac.finalize())
    }
}

/// ChaCha20-Poly1305 context for one message.
///
/// Not shareable: concurrent packets each need their own context.
pub struct AeadContext {
    live: Option<Live>,
    state: ContextState,
}

impl AeadContext {
    /// Initialise a context for one message under `(key, nonce)`.
    ///
    /// Generates keystream block 0, keeps its first 32 bytes as the
    /// one-time Poly1305 key and positions the cipher at block 1 for the
    /// payload.
    #[must_use]
    pub fn new(key: &AeadKey, nonce: &Nonce) -> Self {
        let mut cipher = ChaCha20::new(key.as_bytes(), nonce.as_bytes(), MAC_KEY_COUNTER);

        let mut block = cipher.next_block();
        let mut mac_key = [0u8; poly1305::KEY_SIZE];
        mac_key.copy_from_slice(&block[..poly1305::KEY_SIZE]);
        let mac = Poly1305::new(&mac_key);
        secure_wipe(&mut mac_key);
        secure_wipe(&mut block);

        debug_assert_eq!(cipher.counter(), DATA_COUNTER);

        Self {
            live: Some(Live {
                cipher,
                mac,
                aad_len: 0,
            }),
            state: ContextState::Ready,
        }
    }

    /// Initialise from untyped key and nonce bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` or
    /// `CryptoError::InvalidNonceLength` if either input has the wrong size.
    pub fn init(key: &[u8], nonce: &[u8]) -> Result<Self, CryptoError> {
        let key = AeadKey::from_slice(key)?;
        let nonce = Nonce::from_slice(nonce).ok_or(CryptoError::InvalidNonceLength {
            expected: NONCE_SIZE,
            actual: nonce.len(),
        })?;
        Ok(Self::new(&key, &nonce))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Associated data bytes absorbed so far.
    #[must_use]
    pub fn aad_len(&self) -> u64 {
        self.live.as_ref().map_or(0, |live| live.aad_len)
    }

    /// Authenticate `aad` without encrypting it.
    ///
    /// May be called several times; the pieces are authenticated as their
    /// concatenation.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Misuse` once the context has sealed or opened.
    pub fn add_associated_data(&mut self, aad: &[u8]) -> Result<(), CryptoError> {
        let state = self.state;
        let Some(live) = self.live.as_mut() else {
            tracing::warn!(?state, "associated data after seal/open");
            return Err(CryptoError::Misuse("associated data after seal/open"));
        };

        live.mac.update(aad);
        live.aad_len += aad.len() as u64;
        Ok(())
    }

    /// Encrypt `buffer` in place and return the tag.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Misuse` if the context already sealed or opened,
    /// or `CryptoError::InvalidArgument` if `buffer` is longer than
    /// [`MAX_MESSAGE_LEN`].
    pub fn seal_in_place(&mut self, buffer: &mut [u8]) -> Result<Tag, CryptoError> {
        let Live {
            mut cipher,
            mac,
            aad_len,
        } = self.finish(buffer.len(), ContextState::Sealed)?;

        cipher.apply_keystream(buffer);
        Ok(Live::authenticate(mac, aad_len, buffer))
    }

    /// Verify `tag` over `buffer`, then decrypt it in place.
    ///
    /// The expected tag is computed from the ciphertext before any keystream
    /// is applied; on mismatch `buffer` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::AuthenticationFailed` on tag mismatch,
    /// `CryptoError::Misuse` if the context already sealed or opened, or
    /// `CryptoError::InvalidArgument` if `buffer` is longer than
    /// [`MAX_MESSAGE_LEN`].
    pub fn open_in_place(&mut self, buffer: &mut [u8], tag: &Tag) -> Result<(), CryptoError> {
        let Live {
            mut cipher,
            mac,
            aad_len,
        } = self.finish(buffer.len(), ContextState::Opened)?;

        let mut expected = Live::authenticate(mac, aad_len, buffer);
        let authentic = expected.verify(tag);
        expected.zeroize();

        if !authentic {
            tracing::debug!(
                aad_len,
                ciphertext_len = buffer.len(),
                "AEAD tag mismatch, packet rejected"
            );
            return Err(CryptoError::AuthenticationFailed);
        }

        cipher.apply_keystream(buffer);
        Ok(())
    }

    /// Encrypt `plaintext`, returning `(ciphertext, tag)`.
    ///
    /// # Errors
    ///
    /// See [`seal_in_place`](Self::seal_in_place).
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<(Vec<u8>, Tag), CryptoError> {
        let mut buffer = plaintext.to_vec();
        let tag = self.seal_in_place(&mut buffer)?;
        Ok((buffer, tag))
    }

    /// Verify and decrypt `ciphertext`.
    ///
    /// # Errors
    ///
    /// See [`open_in_place`](Self::open_in_place).
    pub fn open(&mut self, ciphertext: &[u8], tag: &Tag) -> Result<Vec<u8>, CryptoError> {
        let mut buffer = ciphertext.to_vec();
        self.open_in_place(&mut buffer, tag)?;
        Ok(buffer)
    }

    /// Move to the terminal state and hand out the live secrets.
    ///
    /// Length is checked first so an oversized payload leaves the context
    /// usable.
    fn finish(&mut self, len: usize, terminal: ContextState) -> Result<Live, CryptoError> {
        if self.live.is_none() {
            tracing::warn!(state = ?self.state, "AEAD context reused after seal/open");
            return Err(CryptoError::Misuse("context already sealed or opened"));
        }
        if len as u64 > MAX_MESSAGE_LEN {
            return Err(CryptoError::InvalidArgument("message exceeds keystream limit"));
        }

        self.state = terminal;
        self.live
            .take()
            .ok_or(CryptoError::Misuse("context already sealed or opened"))
    }
}

impl fmt::Debug for AeadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadContext")
            .field("state", &self.state)
            .field("aad_len", &self.aad_len())
            .finish_non_exhaustive()
    }
}
