// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Result cache contract
//!
//! Storage, keying and eviction belong to the caller; this crate only hands
//! finished suites over through [`SuiteCache`].

use std::collections::HashMap;

use crate::result::Suite;

/// Storage for finished suites
pub trait SuiteCache {
    /// Store `suite` under `key`, replacing any previous entry
    fn put(&mut self, key: String, suite: Suite);

    /// Fetch a copy of the suite stored under `key`
    fn get(&self, key: &str) -> Option<Suite>;

    /// Drop the entry stored under `key`
    fn invalidate(&mut self, key: &str);
}

impl SuiteCache for HashMap<String, Suite> {
    fn put(&mut self, key: String, suite: Suite) {
        self.insert(key, suite);
    }

    fn get(&self, key: &str) -> Option<Suite> {
        HashMap::get(self, key).cloned()
    }

    fn invalidate(&mut self, key: &str) {
        self.remove(key);
    }
}
