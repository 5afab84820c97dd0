//! Fuzz target for Packet::decode
//!
//! Exercises arbitrary byte sequences against the wire codec to find:
//! - Parser crashes or panics
//! - Buffer over-reads in the zero-copy cast
//! - Malformed headers that bypass validation
//!
//! The fuzzer should NEVER panic. All invalid inputs must return an error.

#![no_main]

use fpr_proto::Packet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = Packet::decode(data);
});
