//! Fuzz target for ConnectInfo::from_payload
//!
//! Tests the control-payload cast with:
//! - Arbitrary 180-byte payload unions
//! - Embedded names missing a NUL terminator
//! - Garbage `has_pwk`/`has_lwk` flag bytes
//!
//! The fuzzer should NEVER panic. All invalid inputs must return an error.

#![no_main]

use fpr_proto::{ConnectInfo, PAYLOAD_CAPACITY};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|raw: [u8; PAYLOAD_CAPACITY]| {
    if let Ok(info) = ConnectInfo::from_payload(&raw) {
        let _ = info.name();
        let _ = info.sender_mac();
        let _ = info.visibility();
        let _ = info.pwk();
        let _ = info.lwk();
    }
});
