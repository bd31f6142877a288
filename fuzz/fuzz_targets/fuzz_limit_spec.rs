//! Fuzz testing for limit parsing.
//!
//! Arbitrary input must never panic, and every accepted spec must only
//! contain valid endpoint names and non-zero rates.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_limit_spec -- -max_total_time=60
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use response_throttle::validation::{
    parse_limit_spec, parse_rate, validate_endpoint_name, validate_rate,
};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(limits) = parse_limit_spec(s) {
            for (endpoint, rate) in &limits {
                assert!(validate_endpoint_name(endpoint).is_ok());
                assert!(rate.get() > 0);
            }
        }

        if let Ok(rate) = parse_rate(s) {
            assert!(rate.get() > 0);
        }
    }

    if data.len() >= 8 {
        let value = i64::from_le_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]);
        assert_eq!(validate_rate(value).is_ok(), value > 0);
    }
});
