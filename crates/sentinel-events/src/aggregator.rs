// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Result aggregation
//!
//! [`Aggregator`] consumes decoded events and builds a forest of
//! [`Suite`] → [`TestNode`] → subtest trees, keeping [`RunStatistics`] in step
//! with every terminal event. Failed tests are enriched with the source lines
//! around the reported location.
//!
//! Nodes are located through a per-suite `name -> path` index rather than by
//! scanning the forest, so each event costs O(depth) regardless of suite size.
//!
//! # Example
//!
//! ```
//! use sentinel_events::aggregator::Aggregator;
//!
//! let output = r#"{"Action":"run","Package":"p","Test":"TestA"}
//! {"Action":"pass","Package":"p","Test":"TestA","Elapsed":0.01}"#;
//!
//! let mut aggregator = Aggregator::default();
//! let suites = aggregator.process_batch(output).unwrap();
//! assert_eq!(suites.len(), 1);
//! assert_eq!(aggregator.statistics().passed_tests, 1);
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::SuiteCache;
use crate::context::extract_context;
use crate::error::{DecodeError, EventsError};
use crate::event::{Action, Event, UNKNOWN_PACKAGE, decode, decode_all};
use crate::progress::ProgressSnapshot;
use crate::result::{ErrorKind, SourceLocation, Suite, TestError, TestNode, TestStatus};
use crate::stats::RunStatistics;

/// Default number of lines shown on each side of a failure
pub const DEFAULT_CONTEXT_RADIUS: usize = 2;

/// Default source file extension for failure locations
pub const DEFAULT_SOURCE_EXTENSION: &str = "go";

/// Message used when a failed test printed nothing useful
const FALLBACK_FAILURE_MESSAGE: &str = "test failed";

/// Line prefixes that mark a test as failing
const FAILURE_MARKERS: &[&str] = &["--- FAIL:", "panic:"];

/// Framework chatter that never carries a failure message
const NOISE_PREFIXES: &[&str] = &[
    "=== RUN",
    "=== PAUSE",
    "=== CONT",
    "=== NAME",
    "--- FAIL:",
    "--- PASS:",
    "--- SKIP:",
];

// ============================================================================
// Configuration
// ============================================================================

/// Aggregation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Lines of source shown on each side of a failure location
    pub context_radius: usize,
    /// Extension (without the dot) of files referenced by failure locations
    pub source_extension: String,
    /// Directory that relative failure locations are resolved against
    pub source_root: Option<PathBuf>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            context_radius: DEFAULT_CONTEXT_RADIUS,
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            source_root: None,
        }
    }
}

impl AggregatorConfig {
    /// Set the context radius
    #[must_use]
    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }

    /// Set the source file extension
    #[must_use]
    pub fn with_source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// Set the directory relative locations are resolved against
    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    /// Resolve a location's file against `source_root`
    #[must_use]
    pub fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        match &self.source_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn location_pattern(&self) -> Option<Regex> {
        let pattern = format!(
            r"(?m)^\s*([\w./\\-]+\.{}):(\d+)(?::(\d+))?:?[ \t]*(.*)$",
            regex::escape(&self.source_extension)
        );
        Regex::new(&pattern).ok()
    }
}

/// An owned copy of the aggregator's model at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Suites in first-seen order
    pub suites: Vec<Suite>,
    /// Run statistics matching `suites`
    pub statistics: RunStatistics,
}

// ============================================================================
// Aggregator
// ============================================================================

/// Where a node lives and how far its output has been scanned
#[derive(Debug, Clone, Default)]
struct NodeSlot {
    /// Child-index path from `Suite::tests`
    path: Vec<usize>,
    /// A failure marker has appeared in the node's output
    marker_seen: bool,
}

/// Builds the suite forest from a sequence of test events
///
/// Not safe for concurrent mutation; feed it from a single task and share
/// progress through [`crate::progress::ProgressPublisher`].
#[derive(Debug)]
pub struct Aggregator {
    config: AggregatorConfig,
    location_re: Option<Regex>,
    suites: Vec<Suite>,
    suite_index: HashMap<String, usize>,
    /// Per suite, full test name to its slot in the tree
    node_index: Vec<HashMap<String, NodeSlot>>,
    registered: usize,
    statistics: RunStatistics,
}

impl Aggregator {
    /// Create an empty aggregator
    #[must_use]
    pub fn new(config: AggregatorConfig) -> Self {
        let location_re = config.location_pattern();
        Self {
            config,
            location_re,
            suites: Vec::new(),
            suite_index: HashMap::new(),
            node_index: Vec::new(),
            registered: 0,
            statistics: RunStatistics::new(Utc::now()),
        }
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Clear all suites and statistics and re-stamp the start time
    pub fn reset(&mut self) {
        self.suites.clear();
        self.suite_index.clear();
        self.node_index.clear();
        self.registered = 0;
        self.statistics = RunStatistics::new(Utc::now());
    }

    /// Suites in first-seen order
    #[must_use]
    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// Look up a suite by package identifier
    #[must_use]
    pub fn suite(&self, path: &str) -> Option<&Suite> {
        self.suite_index.get(path).map(|&idx| &self.suites[idx])
    }

    /// Current run statistics
    #[must_use]
    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    /// Tests registered so far, finished or not
    #[must_use]
    pub fn known_tests(&self) -> usize {
        self.registered
    }

    /// Owned copy of the suites and statistics
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            suites: self.suites.clone(),
            statistics: self.statistics.clone(),
        }
    }

    /// Every failed test and subtest across all suites
    #[must_use]
    pub fn failed_tests(&self) -> Vec<&TestNode> {
        self.suites.iter().flat_map(Suite::failed_tests).collect()
    }

    /// Stamp the end of the run and derive phase timings
    pub fn finish(&mut self) {
        self.statistics.finish(Utc::now());
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    /// Apply one event
    ///
    /// Returns a progress snapshot when the event finished a test. Events for
    /// tests that were never started are ignored.
    pub fn apply(&mut self, event: &Event) -> Option<ProgressSnapshot> {
        let package = event.package_or_unknown();
        let Some(name) = event.test_name() else {
            self.on_package_event(package, event);
            return None;
        };

        match event.action {
            Action::Run => {
                self.on_run(package, name);
                None
            }
            Action::Output => {
                self.on_output(package, name, event.output.as_deref().unwrap_or_default());
                None
            }
            Action::Pass => self.on_terminal(package, name, TestStatus::Passed, event),
            Action::Fail => self.on_terminal(package, name, TestStatus::Failed, event),
            Action::Skip => self.on_terminal(package, name, TestStatus::Skipped, event),
            _ => None,
        }
    }

    /// Decode and apply one line
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the line is not a well-formed event; the
    /// aggregator state is left untouched in that case.
    pub fn process_line(&mut self, line: &str) -> Result<Option<ProgressSnapshot>, DecodeError> {
        Ok(decode(line)?.and_then(|event| self.apply(&event)))
    }

    /// Reset, then process a complete `go test -json` transcript
    ///
    /// Decoding happens before any event is applied, so an unparseable line
    /// leaves the aggregator empty.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::Decode`] for the first line that is not a
    /// well-formed event.
    pub fn process_batch(&mut self, text: &str) -> Result<&[Suite], EventsError> {
        self.reset();
        let events = decode_all(text)?;
        for event in &events {
            self.apply(event);
        }
        self.finish();

        info!(
            suites = self.suites.len(),
            tests = self.statistics.total_tests,
            failed = self.statistics.failed_tests,
            "Batch processing complete"
        );
        Ok(&self.suites)
    }

    /// Ingest a live event stream until it is exhausted
    ///
    /// Malformed lines are dropped. One snapshot per finished test is sent to
    /// `progress`, waiting for queue space when it is full. A closed progress
    /// queue ends ingestion early without error.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::Io`] if reading from `reader` fails.
    pub async fn process_stream<R>(
        &mut self,
        mut reader: R,
        progress: Option<&mpsc::Sender<ProgressSnapshot>>,
    ) -> Result<(), EventsError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        let mut dropped = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let processed = {
                let line = String::from_utf8_lossy(&buf);
                self.process_line(&line)
            };
            let snapshot = match processed {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => continue,
                Err(e) => {
                    dropped += 1;
                    debug!(error = %e, "Dropping malformed event line");
                    continue;
                }
            };

            if let Some(tx) = progress
                && tx.send(snapshot).await.is_err()
            {
                warn!("Progress queue closed, stopping ingestion");
                break;
            }
        }

        self.finish();
        info!(
            suites = self.suites.len(),
            tests = self.statistics.total_tests,
            failed = self.statistics.failed_tests,
            dropped = dropped,
            "Stream processing complete"
        );
        Ok(())
    }

    fn on_package_event(&mut self, package: &str, event: &Event) {
        if !event.action.is_terminal() {
            return;
        }
        let (Some(&idx), Some(_)) = (self.suite_index.get(package), event.elapsed) else {
            return;
        };
        self.suites[idx].duration = event.elapsed_duration();
    }

    fn on_run(&mut self, package: &str, name: &str) {
        let suite_idx = self.suite_slot(package);
        if self.node_index[suite_idx].contains_key(name) {
            debug!(package = %package, test = %name, "Ignoring repeated run event");
            return;
        }
        self.statistics.record_start(Utc::now());

        let node = TestNode::new(name);
        let parent_path = if node.parent.is_empty() {
            None
        } else {
            self.node_index[suite_idx]
                .get(&node.parent)
                .map(|slot| slot.path.clone())
        };

        let suite = &mut self.suites[suite_idx];
        // A subtest whose parent was never started is kept at the top level.
        let path = match parent_path {
            Some(mut path) => match node_at_mut(&mut suite.tests, &path) {
                Some(parent) => {
                    path.push(parent.subtests.len());
                    parent.subtests.push(node);
                    path
                }
                None => {
                    suite.tests.push(node);
                    vec![suite.tests.len() - 1]
                }
            },
            None => {
                suite.tests.push(node);
                vec![suite.tests.len() - 1]
            }
        };

        suite.counts.total += 1;
        self.registered += 1;
        self.node_index[suite_idx].insert(
            name.to_string(),
            NodeSlot {
                path,
                marker_seen: false,
            },
        );
    }

    fn on_output(&mut self, package: &str, name: &str, text: &str) {
        let slot = match self.suite_index.get(package) {
            Some(&idx) => self.node_index[idx].get_mut(name).map(|slot| (idx, slot)),
            None => None,
        };
        let Some((suite_idx, slot)) = slot else {
            debug!(package = %package, test = %name, "Ignoring output for unknown test");
            return;
        };
        let Some(node) = node_at_mut(&mut self.suites[suite_idx].tests, &slot.path) else {
            return;
        };

        // Only the unterminated last line and the new text are rescanned.
        let tail_start = node.output.rfind('\n').map_or(0, |i| i + 1);
        node.output.push_str(text);
        let Some(re) = self.location_re.as_ref() else {
            return;
        };
        if node.error.is_some() || node.status.is_terminal() {
            return;
        }

        let tail = &node.output[tail_start..];
        if slot.marker_seen {
            node.error = find_location(re, tail);
        } else if has_failure_marker(tail) {
            slot.marker_seen = true;
            // The location may have been printed before the marker
            node.error = find_location(re, &node.output);
        }
    }

    fn on_terminal(
        &mut self,
        package: &str,
        name: &str,
        status: TestStatus,
        event: &Event,
    ) -> Option<ProgressSnapshot> {
        let Some((suite_idx, path)) = self.locate(package, name) else {
            debug!(
                package = %package,
                test = %name,
                action = %event.action,
                "Ignoring terminal event for unknown test"
            );
            return None;
        };

        let suite = &mut self.suites[suite_idx];
        let node = node_at_mut(&mut suite.tests, &path)?;
        if node.status.is_terminal() {
            debug!(package = %package, test = %name, "Ignoring repeated terminal event");
            return None;
        }

        node.status = status;
        node.duration = event.elapsed_duration();
        if status == TestStatus::Failed {
            finalize_failure(node, &self.config, self.location_re.as_ref());
        } else {
            node.error = None;
        }
        let duration = node.duration;

        let was_failed = suite.has_failures();
        suite.counts.record(status);
        if path.len() == 1 {
            suite.duration += duration;
        }
        if !was_failed && suite.has_failures() {
            self.statistics.mark_file_failed();
        }
        self.statistics.record_test(status, Utc::now());

        Some(ProgressSnapshot {
            completed: self.statistics.total_tests,
            total: self.registered,
            current_package: package.to_string(),
            status,
        })
    }

    fn suite_slot(&mut self, package: &str) -> usize {
        if let Some(&idx) = self.suite_index.get(package) {
            return idx;
        }
        let idx = self.suites.len();
        self.suites.push(Suite::new(package));
        self.node_index.push(HashMap::new());
        self.suite_index.insert(package.to_string(), idx);
        self.statistics.record_file(false);
        idx
    }

    fn locate(&self, package: &str, name: &str) -> Option<(usize, Vec<usize>)> {
        let &suite_idx = self.suite_index.get(package)?;
        let slot = self.node_index[suite_idx].get(name)?;
        Some((suite_idx, slot.path.clone()))
    }

    // ========================================================================
    // External suites
    // ========================================================================

    /// Merge a suite produced elsewhere (e.g. restored from a cache)
    ///
    /// A suite with the same path replaces the existing one. Counts are
    /// recomputed from the tree and the run tallies rebuilt from the forest.
    pub fn add_suite(&mut self, mut suite: Suite) {
        if suite.path.is_empty() {
            suite.path = UNKNOWN_PACKAGE.to_string();
        }
        suite.recount();

        let mut index = HashMap::new();
        for (idx, test) in suite.tests.iter().enumerate() {
            index_node(test, vec![idx], &mut index);
        }

        match self.suite_index.get(&suite.path) {
            Some(&idx) => {
                self.suites[idx] = suite;
                self.node_index[idx] = index;
            }
            None => {
                self.suite_index
                    .insert(suite.path.clone(), self.suites.len());
                self.suites.push(suite);
                self.node_index.push(index);
            }
        }
        self.rebuild_tallies();
    }

    /// Put every suite into `cache` under the key chosen by `key`
    ///
    /// Returns the number of suites stored.
    pub fn export_to<C>(&self, cache: &mut C, key: impl Fn(&Suite) -> String) -> usize
    where
        C: SuiteCache + ?Sized,
    {
        for suite in &self.suites {
            cache.put(key(suite), suite.clone());
        }
        self.suites.len()
    }

    fn rebuild_tallies(&mut self) {
        let stats = &mut self.statistics;
        stats.passed_tests = 0;
        stats.failed_tests = 0;
        stats.skipped_tests = 0;
        stats.total_files = self.suites.len();
        stats.failed_files = 0;
        self.registered = 0;

        for suite in &self.suites {
            stats.passed_tests += suite.counts.passed;
            stats.failed_tests += suite.counts.failed;
            stats.skipped_tests += suite.counts.skipped;
            if suite.has_failures() {
                stats.failed_files += 1;
            }
            self.registered += suite.counts.total;
        }
        stats.total_tests = stats.passed_tests + stats.failed_tests + stats.skipped_tests;
        stats.passed_files = stats.total_files - stats.failed_files;
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn node_at_mut<'a>(tests: &'a mut [TestNode], path: &[usize]) -> Option<&'a mut TestNode> {
    let (first, rest) = path.split_first()?;
    let mut node = tests.get_mut(*first)?;
    for &idx in rest {
        node = node.subtests.get_mut(idx)?;
    }
    Some(node)
}

fn index_node(node: &TestNode, path: Vec<usize>, index: &mut HashMap<String, NodeSlot>) {
    for (idx, sub) in node.subtests.iter().enumerate() {
        let mut child = path.clone();
        child.push(idx);
        index_node(sub, child, index);
    }
    index.entry(node.name.clone()).or_insert_with(|| NodeSlot {
        path,
        marker_seen: has_failure_marker(&node.output),
    });
}

fn has_failure_marker(output: &str) -> bool {
    output.lines().map(str::trim_start).any(|line| {
        FAILURE_MARKERS
            .iter()
            .any(|marker| line.starts_with(marker))
    })
}

fn has_panic_line(output: &str) -> bool {
    output
        .lines()
        .any(|line| line.trim_start().starts_with("panic:"))
}

/// First `file:line[:col]: message` reference in `output`
fn find_location(re: &Regex, output: &str) -> Option<TestError> {
    re.captures_iter(output).find_map(|caps| {
        let line = caps.get(2)?.as_str().parse().ok()?;
        let column = caps.get(3).and_then(|c| c.as_str().parse().ok());
        Some(TestError {
            message: caps
                .get(4)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            location: Some(SourceLocation {
                file: caps.get(1)?.as_str().to_string(),
                line,
                column,
            }),
            ..TestError::default()
        })
    })
}

/// Output lines minus framework chatter, if any remain
fn failure_message(output: &str) -> Option<String> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !NOISE_PREFIXES.iter().any(|prefix| line.starts_with(prefix)))
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn subtest_failure_message(failed: usize) -> String {
    if failed == 1 {
        "test failed due to 1 failed subtest".to_string()
    } else {
        format!("test failed due to {failed} failed subtests")
    }
}

fn classify(message: &str, output: &str) -> ErrorKind {
    let message = message.to_lowercase();
    if message.contains("timeout")
        || message.contains("timed out")
        || output.contains("panic: test timed out")
    {
        ErrorKind::Timeout
    } else if message.contains("panic") || has_panic_line(output) {
        ErrorKind::Panic
    } else if message.contains("expected") || (message.contains("want") && message.contains("got"))
    {
        ErrorKind::Assertion
    } else {
        ErrorKind::Failure
    }
}

fn finalize_failure(node: &mut TestNode, config: &AggregatorConfig, location_re: Option<&Regex>) {
    if node.error.is_none() {
        node.error = location_re.and_then(|re| find_location(re, &node.output));
    }
    let failed_subtests = node.subtests.iter().filter(|sub| sub.failed()).count();
    let error = node.error.get_or_insert_with(TestError::default);

    error.kind = ErrorKind::Failure;
    if error.message.is_empty() {
        match failure_message(&node.output) {
            Some(message) => error.message = message,
            None if failed_subtests > 0 => {
                error.message = subtest_failure_message(failed_subtests);
                error.kind = ErrorKind::SubtestFailure;
            }
            None => error.message = FALLBACK_FAILURE_MESSAGE.to_string(),
        }
    }
    if error.kind != ErrorKind::SubtestFailure {
        error.kind = classify(&error.message, &node.output);
    }
    error.stack.clone_from(&node.output);

    let Some(location) = &error.location else {
        return;
    };
    let path = config.resolve(&location.file);
    let radius = i64::try_from(config.context_radius).unwrap_or(i64::MAX);
    match extract_context(&path, location.line, radius) {
        Ok(context) => error.context = Some(context),
        Err(e) => {
            debug!(test = %node.name, error = %e, "Source context unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::time::Duration;

    fn run(agg: &mut Aggregator, lines: &[&str]) -> Vec<ProgressSnapshot> {
        lines
            .iter()
            .filter_map(|line| agg.process_line(line).expect("Should decode"))
            .collect()
    }

    #[test]
    fn test_single_passing_test() {
        let mut agg = Aggregator::default();
        let progress = run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"TestA"}"#,
                r#"{"Action":"output","Package":"p","Test":"TestA","Output":"=== RUN   TestA\n"}"#,
                r#"{"Action":"pass","Package":"p","Test":"TestA","Elapsed":0.5}"#,
            ],
        );

        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].completed, 1);
        assert_eq!(progress[0].total, 1);
        assert_eq!(progress[0].status, TestStatus::Passed);

        let suite = agg.suite("p").expect("suite");
        assert_eq!(suite.tests.len(), 1);
        assert_eq!(suite.tests[0].status, TestStatus::Passed);
        assert_eq!(suite.tests[0].duration, Duration::from_millis(500));
        assert_eq!(suite.tests[0].output, "=== RUN   TestA\n");
        assert!(suite.tests[0].error.is_none());
        assert_eq!(suite.duration, Duration::from_millis(500));
    }

    #[test]
    fn test_reencoded_events_give_same_result() {
        let lines = [
            r#"{"Time":"2026-01-17T02:33:00Z","Action":"run","Package":"p","Test":"TestA","Extra":1}"#,
            r#"{"Action":"output","Package":"p","Test":"TestA","Output":"hello\n"}"#,
            r#"{"Action":"pass","Package":"p","Test":"TestA","Elapsed":0.25}"#,
        ];
        let reencoded: Vec<String> = lines
            .iter()
            .map(|line| {
                decode(line)
                    .expect("Should decode")
                    .expect("Should be an event")
                    .to_line()
                    .expect("Should encode")
            })
            .collect();

        let mut agg = Aggregator::default();
        for line in &reencoded {
            agg.process_line(line).expect("Should decode again");
        }

        let test = &agg.suite("p").expect("suite").tests[0];
        assert_eq!(test.status, TestStatus::Passed);
        assert_eq!(test.output, "hello\n");
        assert!(test.error.is_none());
    }

    #[test]
    fn test_subtest_attached_to_parent() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"TestA"}"#,
                r#"{"Action":"run","Package":"p","Test":"TestA/one"}"#,
                r#"{"Action":"run","Package":"p","Test":"TestA/one/deep"}"#,
                r#"{"Action":"pass","Package":"p","Test":"TestA/one/deep"}"#,
                r#"{"Action":"pass","Package":"p","Test":"TestA/one"}"#,
                r#"{"Action":"pass","Package":"p","Test":"TestA"}"#,
            ],
        );

        let suite = agg.suite("p").expect("suite");
        assert_eq!(suite.tests.len(), 1);
        assert_eq!(suite.tests[0].subtests.len(), 1);
        assert_eq!(suite.tests[0].subtests[0].name, "TestA/one");
        assert_eq!(suite.tests[0].subtests[0].subtests[0].name, "TestA/one/deep");
        assert_eq!(suite.counts.total, 3);
        assert_eq!(suite.counts.passed, 3);
        assert_eq!(agg.statistics().total_tests, 3);
    }

    #[test]
    fn test_orphan_subtest_is_top_level() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[r#"{"Action":"run","Package":"p","Test":"TestA/one"}"#],
        );

        let suite = agg.suite("p").expect("suite");
        assert_eq!(suite.tests.len(), 1);
        assert_eq!(suite.tests[0].name, "TestA/one");
        assert_eq!(suite.tests[0].parent, "TestA");
    }

    #[test]
    fn test_events_for_unknown_tests_are_ignored() {
        let mut agg = Aggregator::default();
        let progress = run(
            &mut agg,
            &[
                r#"{"Action":"output","Package":"p","Test":"TestA","Output":"x"}"#,
                r#"{"Action":"pass","Package":"p","Test":"TestA","Elapsed":0.1}"#,
                r#"{"Action":"fail","Package":"p"}"#,
                r#"{"Action":"start","Package":"p"}"#,
            ],
        );

        assert!(progress.is_empty());
        assert!(agg.suites().is_empty());
        assert_eq!(agg.statistics().total_tests, 0);
        assert_eq!(agg.statistics().total_files, 0);
    }

    #[test]
    fn test_repeated_terminal_event_counted_once() {
        let mut agg = Aggregator::default();
        let progress = run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"TestA"}"#,
                r#"{"Action":"run","Package":"p","Test":"TestA"}"#,
                r#"{"Action":"pass","Package":"p","Test":"TestA"}"#,
                r#"{"Action":"fail","Package":"p","Test":"TestA"}"#,
            ],
        );

        assert_eq!(progress.len(), 1);
        assert_eq!(agg.suite("p").expect("suite").tests.len(), 1);
        assert_eq!(agg.statistics().total_tests, 1);
        assert_eq!(agg.statistics().failed_tests, 0);
    }

    #[test]
    fn test_failure_with_location() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"--- FAIL: T (0.00s)\n"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"    t.go:10: boom\n"}"#,
                r#"{"Action":"fail","Package":"p","Test":"T","Elapsed":0.01}"#,
            ],
        );

        let test = &agg.suite("p").expect("suite").tests[0];
        assert_eq!(test.status, TestStatus::Failed);
        let error = test.error.as_ref().expect("error");
        assert!(error.message.contains("boom"));
        let location = error.location.as_ref().expect("location");
        assert_eq!(location.file, "t.go");
        assert_eq!(location.line, 10);
        assert_eq!(location.column, None);
        // t.go does not exist relative to the test's working directory
        assert!(error.context.is_none());
    }

    #[test]
    fn test_location_before_marker_is_found() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"    calc_test.go:42:7: want 5, got 10\n"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"--- FAIL: T (0.00s)\n"}"#,
            ],
        );

        let test = &agg.suite("p").expect("suite").tests[0];
        assert_eq!(test.status, TestStatus::Running);
        let error = test.error.as_ref().expect("preliminary error");
        assert_eq!(error.message, "want 5, got 10");
        assert_eq!(
            error.location,
            Some(SourceLocation {
                file: "calc_test.go".to_string(),
                line: 42,
                column: Some(7),
            })
        );
    }

    #[test]
    fn test_location_without_marker_is_not_an_error() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"    t.go:3: just logging\n"}"#,
                r#"{"Action":"pass","Package":"p","Test":"T"}"#,
            ],
        );

        assert!(agg.suite("p").expect("suite").tests[0].error.is_none());
    }

    #[test]
    fn test_passing_test_drops_preliminary_error() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"--- FAIL: Inner (0.00s)\n"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"    t_test.go:3: harness check\n"}"#,
                r#"{"Action":"run","Package":"p","Test":"R"}"#,
                r#"{"Action":"output","Package":"p","Test":"R","Output":"panic: recovered\n    r_test.go:7: deferred\n"}"#,
            ],
        );
        assert!(agg.suite("p").expect("suite").tests[0].error.is_some());

        run(
            &mut agg,
            &[
                r#"{"Action":"pass","Package":"p","Test":"T"}"#,
                r#"{"Action":"skip","Package":"p","Test":"R"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"--- FAIL: T\n    t_test.go:9: late\n"}"#,
            ],
        );
        let suite = agg.suite("p").expect("suite");
        assert_eq!(suite.tests[0].status, TestStatus::Passed);
        assert!(suite.tests[0].error.is_none());
        assert_eq!(suite.tests[1].status, TestStatus::Skipped);
        assert!(suite.tests[1].error.is_none());
    }

    #[test]
    fn test_location_after_marker_in_later_event() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"--- FAIL: T (0.00s)\n"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"no location here\n"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"    t.go:"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"21: split line\n"}"#,
            ],
        );

        let error = agg.suite("p").expect("suite").tests[0]
            .error
            .clone()
            .expect("preliminary error");
        assert_eq!(error.message, "split line");
        assert_eq!(error.location.expect("location").line, 21);
    }

    #[test]
    fn test_long_output_without_marker() {
        let mut agg = Aggregator::default();
        agg.process_line(r#"{"Action":"run","Package":"p","Test":"T"}"#)
            .expect("Should decode");
        let line = r#"{"Action":"output","Package":"p","Test":"T","Output":"    t.go:1: progress\n"}"#;
        for _ in 0..10_000 {
            agg.process_line(line).expect("Should decode");
        }
        agg.process_line(r#"{"Action":"pass","Package":"p","Test":"T"}"#)
            .expect("Should decode");

        let test = &agg.suite("p").expect("suite").tests[0];
        assert_eq!(test.output.lines().count(), 10_000);
        assert!(test.error.is_none());
    }

    #[test]
    fn test_failure_kinds() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"Panics"}"#,
                r#"{"Action":"output","Package":"p","Test":"Panics","Output":"panic: runtime error: index out of range\n"}"#,
                r#"{"Action":"fail","Package":"p","Test":"Panics"}"#,
                r#"{"Action":"run","Package":"p","Test":"Slow"}"#,
                r#"{"Action":"output","Package":"p","Test":"Slow","Output":"panic: test timed out after 10m0s\n"}"#,
                r#"{"Action":"fail","Package":"p","Test":"Slow"}"#,
                r#"{"Action":"run","Package":"p","Test":"Compare"}"#,
                r#"{"Action":"output","Package":"p","Test":"Compare","Output":"    c.go:4: want 5, got 10\n"}"#,
                r#"{"Action":"fail","Package":"p","Test":"Compare"}"#,
                r#"{"Action":"run","Package":"p","Test":"Plain"}"#,
                r#"{"Action":"output","Package":"p","Test":"Plain","Output":"something broke\n"}"#,
                r#"{"Action":"fail","Package":"p","Test":"Plain"}"#,
            ],
        );

        let kinds: Vec<ErrorKind> = agg
            .failed_tests()
            .into_iter()
            .map(|t| t.error.as_ref().expect("error").kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::Panic,
                ErrorKind::Timeout,
                ErrorKind::Assertion,
                ErrorKind::Failure,
            ]
        );
        let plain = agg.suite("p").expect("suite").find("Plain").expect("node");
        assert_eq!(plain.error.as_ref().expect("error").stack, "something broke\n");
    }

    #[test]
    fn test_parent_failing_through_subtests() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"TestA"}"#,
                r#"{"Action":"run","Package":"p","Test":"TestA/x"}"#,
                r#"{"Action":"fail","Package":"p","Test":"TestA/x"}"#,
                r#"{"Action":"run","Package":"p","Test":"TestA/y"}"#,
                r#"{"Action":"fail","Package":"p","Test":"TestA/y"}"#,
                r#"{"Action":"run","Package":"p","Test":"TestA/z"}"#,
                r#"{"Action":"pass","Package":"p","Test":"TestA/z"}"#,
                r#"{"Action":"output","Package":"p","Test":"TestA","Output":"--- FAIL: TestA (0.00s)\n"}"#,
                r#"{"Action":"fail","Package":"p","Test":"TestA"}"#,
                r#"{"Action":"run","Package":"p","Test":"TestB"}"#,
                r#"{"Action":"run","Package":"p","Test":"TestB/x"}"#,
                r#"{"Action":"fail","Package":"p","Test":"TestB/x"}"#,
                r#"{"Action":"output","Package":"p","Test":"TestB","Output":"setup went wrong\n"}"#,
                r#"{"Action":"fail","Package":"p","Test":"TestB"}"#,
            ],
        );

        let suite = agg.suite("p").expect("suite");
        let parent = suite.tests[0].error.as_ref().expect("error");
        assert_eq!(parent.message, "test failed due to 2 failed subtests");
        assert_eq!(parent.kind, ErrorKind::SubtestFailure);

        let own = suite.tests[1].error.as_ref().expect("error");
        assert_eq!(own.message, "setup went wrong");
        assert_eq!(own.kind, ErrorKind::Failure);
        assert_eq!(subtest_failure_message(1), "test failed due to 1 failed subtest");
    }

    #[test]
    fn test_failure_without_location_uses_output() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"=== RUN   T\n"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"something broke\n"}"#,
                r#"{"Action":"fail","Package":"p","Test":"T"}"#,
                r#"{"Action":"run","Package":"p","Test":"Quiet"}"#,
                r#"{"Action":"fail","Package":"p","Test":"Quiet"}"#,
            ],
        );

        let suite = agg.suite("p").expect("suite");
        let error = suite.tests[0].error.as_ref().expect("error");
        assert_eq!(error.message, "something broke");
        assert!(error.location.is_none());

        let quiet = suite.tests[1].error.as_ref().expect("error");
        assert_eq!(quiet.message, FALLBACK_FAILURE_MESSAGE);
    }

    #[test]
    fn test_file_counts_track_failures() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"a","Test":"T1"}"#,
                r#"{"Action":"run","Package":"b","Test":"T2"}"#,
                r#"{"Action":"fail","Package":"a","Test":"T1"}"#,
                r#"{"Action":"pass","Package":"b","Test":"T2"}"#,
            ],
        );

        let stats = agg.statistics();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.passed_files, 1);
        assert!(!stats.success());
        assert_eq!(agg.failed_tests().len(), 1);
    }

    #[test]
    fn test_package_elapsed_sets_suite_duration() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"pass","Package":"p","Test":"T","Elapsed":0.1}"#,
                r#"{"Action":"pass","Package":"p","Elapsed":2}"#,
            ],
        );

        assert_eq!(agg.suite("p").expect("suite").duration, Duration::from_secs(2));
        assert_eq!(agg.statistics().total_tests, 1);
    }

    #[test]
    fn test_empty_package_is_unknown() {
        let mut agg = Aggregator::default();
        run(&mut agg, &[r#"{"Action":"run","Test":"T"}"#]);
        assert!(agg.suite(UNKNOWN_PACKAGE).is_some());
    }

    #[test]
    fn test_process_batch_resets_first() {
        let mut agg = Aggregator::default();
        agg.process_batch(r#"{"Action":"run","Package":"old","Test":"T"}"#)
            .expect("Should parse");
        let suites = agg
            .process_batch(r#"{"Action":"run","Package":"new","Test":"T"}"#)
            .expect("Should parse");

        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].path, "new");
        assert!(agg.statistics().end_time.is_some());
    }

    #[test]
    fn test_process_batch_decode_error_discards_state() {
        let mut agg = Aggregator::default();
        agg.process_batch(r#"{"Action":"run","Package":"old","Test":"T"}"#)
            .expect("Should parse");

        let result = agg.process_batch(
            "{\"Action\":\"run\",\"Package\":\"p\",\"Test\":\"A\"}\n{\"Action\":\"output\"",
        );
        assert!(matches!(result, Err(EventsError::Decode(_))));
        assert!(agg.suites().is_empty());
        assert_eq!(agg.statistics().total_tests, 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"fail","Package":"p","Test":"T"}"#,
            ],
        );
        let before = agg.statistics().start_time;
        agg.reset();

        assert!(agg.suites().is_empty());
        assert_eq!(agg.known_tests(), 0);
        let stats = agg.statistics();
        assert_eq!(stats.total_tests, 0);
        assert_eq!(stats.failed_tests, 0);
        assert_eq!(stats.total_files, 0);
        assert!(stats.start_time >= before);

        // Same names are accepted again after a reset
        run(&mut agg, &[r#"{"Action":"run","Package":"p","Test":"T"}"#]);
        assert_eq!(agg.known_tests(), 1);
    }

    #[test]
    fn test_add_suite_rebuilds_tallies() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"live","Test":"T"}"#,
                r#"{"Action":"pass","Package":"live","Test":"T"}"#,
            ],
        );

        let mut cached = Suite::new("");
        let mut failed = TestNode::new("Cached");
        failed.status = TestStatus::Failed;
        let mut sub = TestNode::new("Cached/sub");
        sub.status = TestStatus::Skipped;
        failed.subtests.push(sub);
        cached.tests.push(failed);
        agg.add_suite(cached);

        let stats = agg.statistics();
        assert_eq!(stats.total_tests, 3);
        assert_eq!(stats.passed_tests, 1);
        assert_eq!(stats.failed_tests, 1);
        assert_eq!(stats.skipped_tests, 1);
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(agg.known_tests(), 3);
        assert_eq!(agg.suite(UNKNOWN_PACKAGE).expect("suite").counts.total, 2);

        // Nodes of an added suite are addressable by later events
        run(
            &mut agg,
            &[r#"{"Action":"run","Package":"unknown","Test":"Cached/sub/new"}"#],
        );
        let suite = agg.suite(UNKNOWN_PACKAGE).expect("suite");
        assert_eq!(suite.tests[0].subtests[0].subtests.len(), 1);
    }

    #[test]
    fn test_export_to_cache() {
        let mut agg = Aggregator::default();
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"a","Test":"T"}"#,
                r#"{"Action":"run","Package":"b","Test":"T"}"#,
            ],
        );

        let mut cache: HashMap<String, Suite> = HashMap::new();
        let stored = agg.export_to(&mut cache, |suite| format!("run-1:{}", suite.path));
        assert_eq!(stored, 2);
        assert!(cache.contains_key("run-1:a"));
        assert!(cache.contains_key("run-1:b"));
    }

    #[test]
    fn test_custom_extension() {
        let config = AggregatorConfig::default().with_source_extension("rs");
        let mut agg = Aggregator::new(config);
        run(
            &mut agg,
            &[
                r#"{"Action":"run","Package":"p","Test":"T"}"#,
                r#"{"Action":"output","Package":"p","Test":"T","Output":"panic: oh no\n  src/lib.rs:9: here\n"}"#,
            ],
        );

        let error = agg.suite("p").expect("suite").tests[0]
            .error
            .clone()
            .expect("error");
        assert_eq!(error.location.expect("location").file, "src/lib.rs");
    }

    #[test]
    fn test_config_resolve() {
        let config = AggregatorConfig::default().with_source_root("/src/project");
        assert_eq!(config.resolve("t.go"), PathBuf::from("/src/project/t.go"));
        assert_eq!(config.resolve("/abs/t.go"), PathBuf::from("/abs/t.go"));
        assert_eq!(
            AggregatorConfig::default().resolve("t.go"),
            PathBuf::from("t.go")
        );
    }

    #[test]
    fn test_failure_message_filters_noise() {
        let output = "=== RUN   T\n   \nreal problem\n--- FAIL: T (0.00s)\n";
        assert_eq!(failure_message(output).as_deref(), Some("real problem"));
        assert_eq!(failure_message("=== RUN   T\n"), None);
        assert_eq!(failure_message(""), None);
    }
}
