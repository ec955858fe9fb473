//! Per-packet nonce derivation.
//!
//! Nonce layout (12 bytes, never transmitted):
//!
//! | Bytes | Content |
//! |-------|---------|
//! | 0..4 | Packet id, big-endian |
//! | 4..10 | Sender node address |
//! | 10..12 | Reserved, zero |
//!
//! Both ends rebuild the nonce from cleartext header fields, so the layout
//! is part of the wire contract with deployed nodes. Uniqueness per session
//! key rests entirely on the sender never repeating a packet id under that
//! key. [`PacketCounter`] guarantees this within one boot and makes reuse
//! after a reboot unlikely, not impossible; rotate the session key to rule
//! it out.

use crate::CryptoError;
use crate::aead::{AeadKey, NONCE_SIZE, Nonce};
use crate::random::random_u32;
use std::fmt;
use std::str::FromStr;

/// Node address size (6 bytes).
pub const ADDRESS_SIZE: usize = 6;

/// 6-byte radio address of a mesh node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct NodeAddress([u8; ADDRESS_SIZE]);

impl NodeAddress {
    /// Broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: Self = Self([0xFF; ADDRESS_SIZE]);

    /// Create an address from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Whether this is the broadcast address.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Whether every byte is zero (unprovisioned radio).
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for NodeAddress {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; ADDRESS_SIZE];
        let mut parts = s.split(':');

        for byte in &mut bytes {
            let part = parts
                .next()
                .ok_or_else(|| CryptoError::InvalidAddress(s.to_string()))?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(CryptoError::InvalidAddress(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| CryptoError::InvalidAddress(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(CryptoError::InvalidAddress(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

/// Build the nonce for packet `packet_id` sent by `source`.
///
/// The session key does not enter the layout; it is accepted so callers
/// derive nonces in the scope of the key they will be used with.
#[must_use]
pub fn derive_packet_nonce(_session_key: &AeadKey, packet_id: u32, source: &NodeAddress) -> Nonce {
    let mut bytes = [0u8; NONCE_SIZE];
    bytes[..4].copy_from_slice(&packet_id.to_be_bytes());
    bytes[4..10].copy_from_slice(source.as_bytes());
    Nonce::from_bytes(bytes)
}

/// Strictly increasing packet-id allocator for one session key.
///
/// Seeded from the OS CSPRNG into the lower half of the id space, so at
/// least 2^31 ids remain before exhaustion. Never wraps: once `u32::MAX`
/// has been issued the session key must rotate.
///
/// A rebooted node picks a fresh random starting point instead of replaying
/// ids from an uptime counter. The ranges used before and after a reboot
/// overlap with probability about `2n / 2^31` for `n` packets per boot, so
/// reuse is unlikely but not excluded; no high-water mark is persisted.
#[derive(Debug, Clone)]
pub struct PacketCounter {
    next: Option<u32>,
}

impl PacketCounter {
    /// Create a counter starting at a random id.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomFailed`] if the OS CSPRNG fails.
    pub fn new_random() -> Result<Self, CryptoError> {
        Ok(Self::starting_at(random_u32()? >> 1))
    }

    /// Create a counter starting at `first`.
    #[must_use]
    pub fn starting_at(first: u32) -> Self {
        Self { next: Some(first) }
    }

    /// Allocate the next packet id.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::PacketIdExhausted`] once the id space is used up.
    pub fn next_id(&mut self) -> Result<u32, CryptoError> {
        let Some(id) = self.next else {
            tracing::warn!("packet id space exhausted for current session key");
            return Err(CryptoError::PacketIdExhausted);
        };
        self.next = id.checked_add(1);
        Ok(id)
    }

    /// Ids left before exhaustion.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.next
            .map_or(0, |next| u64::from(u32::MAX) - u64::from(next) + 1)
    }

    /// Reseed after the session key has rotated.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomFailed`] if the OS CSPRNG fails.
    pub fn reset_for_rotation(&mut self) -> Result<(), CryptoError> {
        *self = Self::new_random()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: NodeAddress = NodeAddress::from_bytes([0x24, 0x6f, 0x28, 0xaa, 0xbb, 0xcc]);

    fn key() -> AeadKey {
        AeadKey::new([0x11; 32])
    }

    #[test]
    fn test_nonce_layout() {
        let nonce = derive_packet_nonce(&key(), 0x0102_0304, &SRC);
        assert_eq!(
            nonce.as_bytes(),
            &[0x01, 0x02, 0x03, 0x04, 0x24, 0x6f, 0x28, 0xaa, 0xbb, 0xcc, 0x00, 0x00]
        );
    }

    #[test]
    fn test_nonce_differs_by_packet_id() {
        let a = derive_packet_nonce(&key(), 1, &SRC);
        let b = derive_packet_nonce(&key(), 2, &SRC);
        assert_ne!(a, b);
    }

    #[test]
    fn test_nonce_differs_by_source() {
        let other = NodeAddress::from_bytes([0x24, 0x6f, 0x28, 0xaa, 0xbb, 0xcd]);
        let a = derive_packet_nonce(&key(), 7, &SRC);
        let b = derive_packet_nonce(&key(), 7, &other);
        assert_ne!(a, b);
    }

    #[test]
    fn test_address_display_and_parse() {
        assert_eq!(SRC.to_string(), "24:6f:28:aa:bb:cc");
        assert_eq!("24:6F:28:AA:BB:CC".parse::<NodeAddress>().unwrap(), SRC);
    }

    #[test]
    fn test_address_parse_rejects_malformed() {
        for bad in [
            "",
            "24:6f:28:aa:bb",
            "24:6f:28:aa:bb:cc:dd",
            "24-6f-28-aa-bb-cc",
            "2:46f:28:aa:bb:cc",
            "zz:6f:28:aa:bb:cc",
            "+f:6f:28:aa:bb:cc",
        ] {
            assert!(bad.parse::<NodeAddress>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_address_predicates() {
        assert!(NodeAddress::BROADCAST.is_broadcast());
        assert!(NodeAddress::default().is_zero());
        assert!(!SRC.is_broadcast());
        assert!(!SRC.is_zero());
    }

    #[test]
    fn test_counter_is_strictly_increasing() {
        let mut counter = PacketCounter::starting_at(10);
        assert_eq!(counter.next_id().unwrap(), 10);
        assert_eq!(counter.next_id().unwrap(), 11);
        assert_eq!(counter.next_id().unwrap(), 12);
    }

    #[test]
    fn test_counter_exhaustion_does_not_wrap() {
        let mut counter = PacketCounter::starting_at(u32::MAX - 1);
        assert_eq!(counter.remaining(), 2);
        assert_eq!(counter.next_id().unwrap(), u32::MAX - 1);
        assert_eq!(counter.next_id().unwrap(), u32::MAX);
        assert_eq!(counter.remaining(), 0);
        assert_eq!(counter.next_id(), Err(CryptoError::PacketIdExhausted));
    }

    #[test]
    fn test_random_counter_leaves_headroom() {
        let counter = PacketCounter::new_random().unwrap();
        assert!(counter.remaining() > u64::from(u32::MAX / 2));
    }

    #[test]
    fn test_random_counters_start_independently() {
        // Each boot draws its own starting point from the lower half.
        let firsts: Vec<u32> = (0..8)
            .map(|_| PacketCounter::new_random().unwrap().next_id().unwrap())
            .collect();

        assert!(firsts.iter().all(|&id| id < 1 << 31));
        assert!(firsts.iter().any(|&id| id != firsts[0]));
    }

    #[test]
    fn test_reset_for_rotation_revives_exhausted_counter() {
        let mut counter = PacketCounter::starting_at(u32::MAX);
        counter.next_id().unwrap();
        assert!(counter.next_id().is_err());

        counter.reset_for_rotation().unwrap();
        assert!(counter.next_id().is_ok());
    }
}
