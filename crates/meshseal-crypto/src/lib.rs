//! # MeshSeal Crypto
//!
//! Packet protection for battery-powered wireless mesh nodes.
//!
//! This crate provides:
//! - ChaCha20 stream cipher and Poly1305 authenticator cores
//! - `ChaCha20-Poly1305` AEAD with a single-use, misuse-checked context
//! - Session-key derivation from a provisioned master key
//! - Per-packet nonce derivation and packet-id allocation
//! - Constant-time comparison and guaranteed memory wiping
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Size |
//! |----------|-----------|------|
//! | Stream cipher | ChaCha20 (20 rounds) | 256-bit key, 96-bit nonce |
//! | MAC | Poly1305 | 128-bit tag |
//! | AEAD | ChaCha20-Poly1305 (RFC 8439) | 256-bit key |
//! | KDF | ChaCha20-Poly1305 as PRF over rotation id | 256-bit output |
//!
//! The core allocates nothing on the heap; the `*_in_place` APIs are safe
//! to call from a receive callback. Header bytes go in as associated data,
//! the payload as plaintext, and `(packet_id, source_address)` feed nonce
//! derivation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod aead;
pub mod chacha20;
pub mod constant_time;
pub mod error;
pub mod kdf;
pub mod nonce;
pub mod poly1305;
pub mod random;
pub mod wipe;

pub use aead::{AeadContext, AeadKey, KEY_SIZE, NONCE_SIZE, Nonce, TAG_SIZE, Tag};
pub use constant_time::constant_time_equal;
pub use error::CryptoError;
pub use kdf::{SessionKeyring, derive_session_key};
pub use nonce::{ADDRESS_SIZE, NodeAddress, PacketCounter, derive_packet_nonce};
pub use wipe::secure_wipe;
