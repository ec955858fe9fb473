//! Fuzz target for node address parsing
//!
//! Any accepted string must print back to the canonical lowercase form.

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshseal_crypto::NodeAddress;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(addr) = s.parse::<NodeAddress>() {
            assert_eq!(addr.to_string(), s.to_ascii_lowercase());
        }
    }
});
