//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Malformed or missing fixed-size input
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid nonce length
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Tag mismatch on open; the packet must be treated as adversarial
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Context used outside its single init -> seal/open lifecycle
    #[error("context misuse: {0}")]
    Misuse(&'static str),

    /// Packet identifier space exhausted for the current session key
    #[error("packet id space exhausted, rotate the session key")]
    PacketIdExhausted,

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,

    /// Unparsable node address
    #[error("invalid node address: {0}")]
    InvalidAddress(String),
}
