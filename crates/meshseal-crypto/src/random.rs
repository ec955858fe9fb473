//! Secure random number generation.
//!
//! All randomness comes from the operating system CSPRNG. Key material,
//! nonce inputs and packet-id seeds must never come from anything weaker.

use crate::CryptoError;
use crate::aead::{AeadKey, KEY_SIZE};

/// Fill a buffer with random bytes from the OS CSPRNG.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the underlying OS CSPRNG fails.
pub fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    getrandom::fill(buf).map_err(|_| CryptoError::RandomFailed)
}

/// Generate a fresh 256-bit key, e.g. a master key for provisioning.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the underlying OS CSPRNG fails.
pub fn random_key() -> Result<AeadKey, CryptoError> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;
    let key = AeadKey::new(bytes);
    crate::wipe::secure_wipe(&mut bytes);
    Ok(key)
}

/// Generate a random `u32`.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the underlying OS CSPRNG fails.
pub fn random_u32() -> Result<u32, CryptoError> {
    let mut buf = [0u8; 4];
    fill_random(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
