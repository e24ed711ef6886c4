//! Fuzz target for command batch decoding
//!
//! This fuzzer feeds arbitrary text to the batch decoder to find:
//! - Parser crashes or panics
//! - Recursion blowups on deeply nested payloads
//! - Commands that decode but violate their own field invariants
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use atoll_proto::frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Attempt to decode arbitrary text as a command batch
    // This should never panic, only return Err for invalid data
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = frame::decode_batch(text);
    }
});
