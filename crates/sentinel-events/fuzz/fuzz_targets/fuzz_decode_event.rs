// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for event decoding
//!
//! Decoding arbitrary text must never panic, and anything that decodes must
//! survive being encoded again.

#![no_main]

use libfuzzer_sys::fuzz_target;

use sentinel_events::event::{decode, decode_all};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(Some(event)) = decode(input) {
            let _ = event.to_line();
        }
        let _ = decode_all(input);
    }
});
