// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for line-by-line aggregation
//!
//! Feeds arbitrary lines through the aggregator the way stream mode does and
//! checks the run counters afterwards.

#![no_main]

use libfuzzer_sys::fuzz_target;

use sentinel_events::aggregator::Aggregator;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let mut aggregator = Aggregator::default();

    // Bad lines are dropped, never fatal
    for line in input.lines() {
        let _ = aggregator.process_line(line);
    }
    aggregator.finish();

    let stats = aggregator.statistics();
    assert_eq!(
        stats.total_tests,
        stats.passed_tests + stats.failed_tests + stats.skipped_tests
    );
    assert_eq!(stats.total_files, stats.passed_files + stats.failed_files);
});
