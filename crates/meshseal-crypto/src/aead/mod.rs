//! ChaCha20-Poly1305 AEAD (RFC 8439).
//!
//! Provides authenticated encryption with associated data for mesh packet
//! payloads:
//! - 256-bit keys
//! - 96-bit nonces, derived per packet (see [`crate::nonce`])
//! - 128-bit detached authentication tags
//! - Header bytes authenticated in cleartext as associated data
//! - In-place encryption/decryption with no heap allocation
//!
//! ## Security Properties
//!
//! - Confidentiality: ChaCha20 stream cipher, ciphertext length equals
//!   plaintext length
//! - Integrity: Poly1305 over AAD, ciphertext and both lengths
//! - Verify-then-decrypt: no plaintext byte is produced for a packet whose
//!   tag does not verify
//!
//! A `(key, nonce)` pair must protect at most one message, ever.
//!
//! ## Module Organization
//!
//! - [`cipher`] - Key material types (`AeadKey`, `Nonce`, `Tag`) and the
//!   one-shot packet API
//! - [`context`] - Single-message AEAD context (`init -> aad* -> seal|open`)
//!
//! ## Usage
//!
//! ```
//! use meshseal_crypto::aead::{AeadContext, AeadKey, Nonce};
//!
//! let key = AeadKey::new([0x42; 32]);
//! let nonce = Nonce::from_bytes([7; 12]);
//!
//! let mut ctx = AeadContext::new(&key, &nonce);
//! ctx.add_associated_data(b"header")?;
//! let (ciphertext, tag) = ctx.seal(b"payload")?;
//!
//! let plaintext = key.open(&nonce, b"header", &ciphertext, &tag)?;
//! assert_eq!(plaintext, b"payload");
//! # Ok::<(), meshseal_crypto::CryptoError>(())
//! ```

pub mod cipher;
pub mod context;

pub use cipher::{AeadKey, KEY_SIZE, NONCE_SIZE, Nonce, TAG_SIZE, Tag};
pub use context::{AeadContext, ContextState, MAX_MESSAGE_LEN};
