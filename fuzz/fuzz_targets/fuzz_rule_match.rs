// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use marksort::rules::{matches_rule, MatchType, Rule};

#[derive(Debug, Arbitrary)]
struct Input {
    url: String,
    pattern: String,
    kind: u8,
}

fuzz_target!(|input: Input| {
    let match_type = match input.kind % 3 {
        0 => MatchType::Domain,
        1 => MatchType::Wildcard,
        _ => MatchType::Regex,
    };
    let rule = Rule::new("fuzz", match_type, input.pattern, "Target");
    let _ = matches_rule(&input.url, &rule);
});
