//! Constant-time cryptographic operations.
//!
//! Comparisons here scan the full length of their inputs with no early
//! exit, so running time depends on the length and never on where (or
//! whether) the inputs differ.

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// Accumulate the OR of per-byte XOR differences over the whole length.
///
/// `observe` is invoked once per compared byte position.
#[inline(always)]
fn diff_scan(a: &[u8], b: &[u8], mut observe: impl FnMut(usize)) -> u8 {
    let mut acc = 0u8;
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        observe(i);
        acc |= x ^ y;
    }
    acc
}

/// Constant-time comparison of byte slices.
///
/// Returns `true` if slices are equal, `false` otherwise. Slices of
/// different lengths are never equal; lengths are public, so that check
/// is allowed to return early.
#[must_use]
#[inline(never)]
pub fn constant_time_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let acc = diff_scan(a, b, |_| {});
    acc.ct_eq(&0u8).into()
}

/// Timing-safe 16-byte array comparison, used for tag verification.
#[must_use]
#[inline(never)]
pub fn verify_16(a: &[u8; 16], b: &[u8; 16]) -> bool {
    constant_time_equal(a, b)
}

/// Constant-time select between two words.
///
/// Returns `a` when `choose_a` is set, `b` otherwise, without branching on
/// the condition.
#[must_use]
#[inline(always)]
pub fn ct_select_u32(choose_a: Choice, a: u32, b: u32) -> u32 {
    u32::conditional_select(&b, &a, choose_a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_equal_same() {
        let a = [1u8; 32];
        let b = [1u8; 32];
        assert!(constant_time_equal(&a, &b));
    }

    #[test]
    fn test_constant_time_equal_different() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert!(!constant_time_equal(&a, &b));
    }

    #[test]
    fn test_constant_time_equal_different_lengths() {
        let a = [1u8; 32];
        let b = [1u8; 16];
        assert!(!constant_time_equal(&a, &b));
    }

    #[test]
    fn test_constant_time_equal_empty() {
        assert!(constant_time_equal(&[], &[]));
    }

    #[test]
    fn test_scan_visits_every_byte_regardless_of_mismatch() {
        let reference = [0x5Au8; 64];

        let mut counts = Vec::new();
        for mismatch_at in [None, Some(0), Some(1), Some(31), Some(63)] {
            let mut other = reference;
            if let Some(pos) = mismatch_at {
                other[pos] ^= 0x01;
            }

            let mut visited = 0usize;
            let acc = diff_scan(&reference, &other, |_| visited += 1);
            assert_eq!(acc == 0, mismatch_at.is_none());
            counts.push(visited);
        }

        assert!(counts.iter().all(|&c| c == reference.len()));
    }

    #[test]
    fn test_scan_visits_positions_in_order() {
        let a = [0u8; 16];
        let b = [0xFFu8; 16];
        let mut seen = Vec::new();
        let _ = diff_scan(&a, &b, |i| seen.push(i));
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_verify_16() {
        let a = [0x42u8; 16];
        let b = [0x42u8; 16];
        let mut c = [0x42u8; 16];
        c[15] = 0x43;

        assert!(verify_16(&a, &b));
        assert!(!verify_16(&a, &c));
    }

    #[test]
    fn test_ct_select_u32() {
        assert_eq!(ct_select_u32(Choice::from(1), 7, 9), 7);
        assert_eq!(ct_select_u32(Choice::from(0), 7, 9), 9);
    }
}
