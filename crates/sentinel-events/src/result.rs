// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Test tree types
//!
//! A [`Suite`] owns the tests of one package. Subtests hang off their parent
//! [`TestNode`] and are never repeated at the suite's top level.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::SourceContext;

/// Lifecycle state of a test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Started, no terminal event seen yet
    #[default]
    Running,
    /// Test passed
    Passed,
    /// Test failed
    Failed,
    /// Test was skipped
    Skipped,
}

impl TestStatus {
    /// Whether the test has finished
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, TestStatus::Running)
    }
}

/// A `file:line[:column]` reference taken from test output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File path as printed by the test
    pub file: String,
    /// 1-based line number
    pub line: i64,
    /// 1-based column, if printed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
}

/// Broad category of a failure, inferred from its message and output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No more specific category applies
    #[default]
    Failure,
    /// An assertion reported an unexpected value
    Assertion,
    /// The test panicked
    Panic,
    /// The test or the binary hit its deadline
    Timeout,
    /// The test itself reported nothing; only its subtests failed
    SubtestFailure,
}

/// Failure details for a failed test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestError {
    /// Human readable failure message
    pub message: String,
    /// Failure category
    #[serde(default)]
    pub kind: ErrorKind,
    /// Test output up to the failure
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stack: String,
    /// Where the failure was reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Source excerpt around `location`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<SourceContext>,
}

/// One test or subtest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestNode {
    /// Full name including any `/`-separated subtest path
    pub name: String,
    /// Name before the last `/`, empty for top-level tests
    pub parent: String,
    /// Current status
    pub status: TestStatus,
    /// Elapsed time reported by the terminal event
    pub duration: Duration,
    /// All output seen so far
    pub output: String,
    /// Set once a failure is detected; cleared if the test then passes or skips
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
    /// Children in first-seen order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtests: Vec<TestNode>,
}

impl TestNode {
    /// Create a running node
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let parent = parent_name(&name).to_string();
        Self {
            name,
            parent,
            status: TestStatus::Running,
            duration: Duration::ZERO,
            output: String::new(),
            error: None,
            subtests: Vec::new(),
        }
    }

    /// Whether the test passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    /// Whether the test failed
    #[must_use]
    pub fn failed(&self) -> bool {
        self.status == TestStatus::Failed
    }

    /// The final path segment of the name
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit_once('/').map_or(&self.name, |(_, leaf)| leaf)
    }

    /// Number of nodes in this subtree, including `self`
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.subtests.iter().map(TestNode::node_count).sum::<usize>()
    }

    /// Visit this node and its descendants depth-first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TestNode)) {
        visit(self);
        for sub in &self.subtests {
            sub.walk(visit);
        }
    }
}

/// Tally of test outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    /// Every node registered in the suite, subtests included
    pub total: usize,
    /// Nodes that passed
    pub passed: usize,
    /// Nodes that failed
    pub failed: usize,
    /// Nodes that were skipped
    pub skipped: usize,
}

impl TestCounts {
    /// Nodes that reached a terminal status
    #[must_use]
    pub fn completed(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Nodes still running
    #[must_use]
    pub fn running(&self) -> usize {
        self.total.saturating_sub(self.completed())
    }

    pub(crate) fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Running => {}
        }
    }
}

/// The test tree of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    /// Package identifier
    pub path: String,
    /// Top-level tests in first-seen order
    pub tests: Vec<TestNode>,
    /// Outcome counts over every node
    pub counts: TestCounts,
    /// Package elapsed time, or the sum of top-level test durations
    pub duration: Duration,
}

impl Suite {
    /// Create an empty suite
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tests: Vec::new(),
            counts: TestCounts::default(),
            duration: Duration::ZERO,
        }
    }

    /// A suite is failed iff it contains at least one failed test
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    /// Every failed node, depth-first
    #[must_use]
    pub fn failed_tests(&self) -> Vec<&TestNode> {
        let mut failed = Vec::new();
        for test in &self.tests {
            test.walk(&mut |node| {
                if node.failed() {
                    failed.push(node);
                }
            });
        }
        failed
    }

    /// Find a node by its full name anywhere in the tree
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&TestNode> {
        let mut found = None;
        for test in &self.tests {
            test.walk(&mut |node| {
                if found.is_none() && node.name == name {
                    found = Some(node);
                }
            });
        }
        found
    }

    /// Recompute `counts` from the tree
    ///
    /// Used for suites built outside the aggregator.
    pub fn recount(&mut self) {
        let mut counts = TestCounts::default();
        for test in &self.tests {
            test.walk(&mut |node| {
                counts.total += 1;
                counts.record(node.status);
            });
        }
        self.counts = counts;
    }
}

/// The substring before the last `/`, or empty for top-level names
#[must_use]
pub fn parent_name(name: &str) -> &str {
    name.rsplit_once('/').map_or("", |(parent, _)| parent)
}
