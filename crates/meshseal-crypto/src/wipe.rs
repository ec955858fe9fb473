//! Guaranteed memory clearing for key material.
//!
//! Plain byte fills of buffers that are never read again are dead stores
//! and may be removed by the optimizer. Everything here goes through
//! [`zeroize`], which writes with volatile stores followed by a compiler
//! fence.

use zeroize::Zeroize;

/// Overwrite `buffer` with zeros through a non-elidable write path.
pub fn secure_wipe(buffer: &mut [u8]) {
    buffer.zeroize();
}

/// Overwrite a slice of words with zeros through a non-elidable write path.
pub fn secure_wipe_words(words: &mut [u32]) {
    words.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_wipe_clears_buffer() {
        let mut buf = [0xA5u8; 48];
        secure_wipe(&mut buf);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_secure_wipe_partial_range() {
        let mut buf = [0xFFu8; 32];
        secure_wipe(&mut buf[8..24]);
        assert!(buf[..8].iter().all(|&b| b == 0xFF));
        assert!(buf[8..24].iter().all(|&b| b == 0));
        assert!(buf[24..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_secure_wipe_words() {
        let mut words = [0xDEAD_BEEFu32; 16];
        secure_wipe_words(&mut words);
        assert_eq!(words, [0u32; 16]);
    }

    #[test]
    fn test_secure_wipe_empty() {
        let mut buf: [u8; 0] = [];
        secure_wipe(&mut buf);
    }
}
