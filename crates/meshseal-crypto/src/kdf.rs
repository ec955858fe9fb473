//! Session-key derivation from the master key.
//!
//! The AEAD itself serves as the PRF: under the master key, a fixed label is
//! sealed with a nonce that carries the rotation id, and the ciphertext
//! becomes the session key.
//!
//! KDF nonce: 8 zero bytes followed by the rotation id, big-endian. Rotation
//! id 0 therefore uses the reserved all-zero nonce, and every rotation id
//! selects an independent keystream under the master key. The master key
//! must never double as a session key.

use crate::CryptoError;
use crate::aead::{AeadContext, AeadKey, KEY_SIZE, NONCE_SIZE, Nonce};
use crate::wipe::secure_wipe;
use std::num::NonZeroU64;
use zeroize::Zeroize;

/// Fixed input material sealed by the KDF.
const SESSION_KEY_LABEL: [u8; KEY_SIZE] = *b"meshseal session key derivation\0";

/// Default rotation period: one session key per day.
pub const DEFAULT_ROTATION_PERIOD_SECS: u64 = 24 * 60 * 60;

/// Nonce used to derive the session key for `rotation_id`.
#[must_use]
pub fn kdf_nonce(rotation_id: u32) -> Nonce {
    let mut bytes = [0u8; NONCE_SIZE];
    bytes[8..].copy_from_slice(&rotation_id.to_be_bytes());
    Nonce::from_bytes(bytes)
}

/// Derive the session key for `rotation_id` from `master_key`.
///
/// Deterministic: both ends compute the same key from the same master key
/// and rotation id.
///
/// # Errors
///
/// Propagates AEAD errors; a freshly initialised context does not produce
/// any for a 32-byte input.
pub fn derive_session_key(master_key: &AeadKey, rotation_id: u32) -> Result<AeadKey, CryptoError> {
    let mut material = SESSION_KEY_LABEL;

    let mut ctx = AeadContext::new(master_key, &kdf_nonce(rotation_id));
    let mut tag = ctx.seal_in_place(&mut material)?;
    tag.zeroize();

    let session_key = AeadKey::new(material);
    secure_wipe(&mut material);
    Ok(session_key)
}

/// Rotation id for the period containing `unix_secs`.
///
/// With the default period this is the day index since the Unix epoch.
/// Saturates at `u32::MAX`.
#[must_use]
pub fn rotation_id_at(unix_secs: u64, period: NonZeroU64) -> u32 {
    u32::try_from(unix_secs / period.get()).unwrap_or(u32::MAX)
}

/// Master key plus the session key for the current rotation.
///
/// Derives a new session key only when the rotation id changes.
pub struct SessionKeyring {
    master: AeadKey,
    current: Option<(u32, AeadKey)>,
}

impl SessionKeyring {
    /// Create a keyring around a provisioned master key.
    #[must_use]
    pub fn new(master: AeadKey) -> Self {
        Self {
            master,
            current: None,
        }
    }

    /// Rotation id of the cached session key, if any.
    #[must_use]
    pub fn current_rotation(&self) -> Option<u32> {
        self.current.as_ref().map(|(id, _)| *id)
    }

    /// Session key for `rotation_id`, deriving it on first use.
    ///
    /// # Errors
    ///
    /// Propagates [`derive_session_key`] errors.
    pub fn session_key(&mut self, rotation_id: u32) -> Result<&AeadKey, CryptoError> {
        let stale = self.current_rotation() != Some(rotation_id);
        if stale {
            let key = derive_session_key(&self.master, rotation_id)?;
            tracing::info!(
                rotation_id,
                previous = ?self.current_rotation(),
                "session key rotated"
            );
            // Dropping the old entry zeroizes the previous session key.
            self.current = Some((rotation_id, key));
        }

        match &self.current {
            Some((_, key)) => Ok(key),
            None => Err(CryptoError::Misuse("session key missing after derivation")),
        }
    }
}

impl std::fmt::Debug for SessionKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyring")
            .field("current_rotation", &self.current_rotation())
            .finish_non_exhaustive()
    }
}
