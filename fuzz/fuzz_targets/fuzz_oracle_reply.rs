// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>
#![no_main]

use libfuzzer_sys::fuzz_target;
use marksort::oracle::prompt::{parse_analysis_response, parse_plan_response};

// Replies come from a remote service and must never panic the parser
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_analysis_response(text);
        let _ = parse_plan_response(text);
    }
});
