// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Run-wide statistics

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::TestStatus;

/// Phase from run start to the first test starting
pub const PHASE_SETUP: &str = "setup";
/// Phase from the first test starting to the last test finishing
pub const PHASE_EXECUTION: &str = "execution";
/// Phase from the last test finishing to the end of the run
pub const PHASE_TEARDOWN: &str = "teardown";

/// Aggregate counts and timings for the current run
///
/// `total_tests == passed_tests + failed_tests + skipped_tests` and
/// `total_files == passed_files + failed_files` hold after every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Tests (and subtests) that reached a terminal status
    pub total_tests: usize,
    /// Tests that passed
    pub passed_tests: usize,
    /// Tests that failed
    pub failed_tests: usize,
    /// Tests that were skipped
    pub skipped_tests: usize,
    /// Suites seen
    pub total_files: usize,
    /// Suites without any failed test
    pub passed_files: usize,
    /// Suites with at least one failed test
    pub failed_files: usize,
    /// When the run (or the last reset) started
    pub start_time: DateTime<Utc>,
    /// When the run was finished, if it has been
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// When the first test started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_test_time: Option<DateTime<Utc>>,
    /// When the most recent test finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_test_time: Option<DateTime<Utc>>,
    /// Wall-clock duration of the run, set by `finish`
    pub duration: Duration,
    /// Named phase durations, set by `finish`
    pub phases: BTreeMap<String, Duration>,
}

impl RunStatistics {
    /// Zeroed statistics stamped with `start_time`
    #[must_use]
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            total_tests: 0,
            passed_tests: 0,
            failed_tests: 0,
            skipped_tests: 0,
            total_files: 0,
            passed_files: 0,
            failed_files: 0,
            start_time,
            end_time: None,
            first_test_time: None,
            last_test_time: None,
            duration: Duration::ZERO,
            phases: BTreeMap::new(),
        }
    }

    /// True when no test failed
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed_tests == 0
    }

    /// Record one terminal outcome
    pub(crate) fn record_test(&mut self, status: TestStatus, at: DateTime<Utc>) {
        match status {
            TestStatus::Passed => self.passed_tests += 1,
            TestStatus::Failed => self.failed_tests += 1,
            TestStatus::Skipped => self.skipped_tests += 1,
            TestStatus::Running => return,
        }
        self.total_tests += 1;
        self.last_test_time = Some(at);
    }

    /// Record a test starting
    pub(crate) fn record_start(&mut self, at: DateTime<Utc>) {
        self.first_test_time.get_or_insert(at);
    }

    /// Record a new suite, which starts out passed
    pub(crate) fn record_file(&mut self, failed: bool) {
        self.total_files += 1;
        if failed {
            self.failed_files += 1;
        } else {
            self.passed_files += 1;
        }
    }

    /// Move a suite from passed to failed
    pub(crate) fn mark_file_failed(&mut self) {
        self.passed_files = self.passed_files.saturating_sub(1);
        self.failed_files += 1;
    }

    /// Stamp the end time and derive the phase durations
    pub(crate) fn finish(&mut self, at: DateTime<Utc>) {
        self.end_time = Some(at);
        self.duration = elapsed(self.start_time, at);

        let first = self.first_test_time.unwrap_or(at);
        let last = self.last_test_time.unwrap_or(first).max(first);
        self.phases.clear();
        self.phases
            .insert(PHASE_SETUP.to_string(), elapsed(self.start_time, first));
        self.phases
            .insert(PHASE_EXECUTION.to_string(), elapsed(first, last));
        self.phases
            .insert(PHASE_TEARDOWN.to_string(), elapsed(last, at));
    }
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// Non-negative wall-clock distance between two instants
fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or_default()
}
