// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Event decoding for `go test -json` output
//!
//! Each line of the stream is one JSON object describing a single execution
//! fact. The decoder is a pure format translator: it checks structure, not
//! meaning, so unknown actions survive decoding and are left to the
//! aggregator to ignore.
//!
//! # Example
//!
//! ```
//! use sentinel_events::event::{Action, decode};
//!
//! let event = decode(r#"{"Action":"run","Package":"p","Test":"TestA"}"#)
//!     .unwrap()
//!     .expect("non-blank line");
//! assert_eq!(event.action, Action::Run);
//! assert_eq!(event.test_name(), Some("TestA"));
//!
//! assert!(decode("   ").unwrap().is_none());
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Package identifier used when an event carries none
pub const UNKNOWN_PACKAGE: &str = "unknown";

/// The `Action` field of a test event
///
/// Values outside the known vocabulary are preserved in [`Action::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// The package or test binary started
    Start,
    /// A test started running
    Run,
    /// A parallel test was paused
    Pause,
    /// A paused test continued
    Cont,
    /// The test passed
    Pass,
    /// Benchmark output
    Bench,
    /// The test failed
    Fail,
    /// The test printed output
    Output,
    /// The test was skipped
    Skip,
    /// Any other action string
    Other(String),
}

impl Action {
    /// The wire spelling of this action
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Action::Start => "start",
            Action::Run => "run",
            Action::Pause => "pause",
            Action::Cont => "cont",
            Action::Pass => "pass",
            Action::Bench => "bench",
            Action::Fail => "fail",
            Action::Output => "output",
            Action::Skip => "skip",
            Action::Other(other) => other.as_str(),
        }
    }

    /// Whether this action ends a test's lifecycle
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Pass | Action::Fail | Action::Skip)
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        match value.as_str() {
            "start" => Action::Start,
            "run" => Action::Run,
            "pause" => Action::Pause,
            "cont" => Action::Cont,
            "pass" => Action::Pass,
            "bench" => Action::Bench,
            "fail" => Action::Fail,
            "output" => Action::Output,
            "skip" => Action::Skip,
            _ => Action::Other(value),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded line of `go test -json` output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    /// When the event was emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// What happened
    pub action: Action,
    /// Owning package (may be empty)
    #[serde(default)]
    pub package: String,
    /// Test name, empty for package-level events
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test: String,
    /// Raw output text (only for `output` events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Elapsed seconds (only on terminal events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
}

impl Event {
    /// Create an event with no timestamp, output or elapsed time
    #[must_use]
    pub fn new(action: Action, package: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            time: None,
            action,
            package: package.into(),
            test: test.into(),
            output: None,
            elapsed: None,
        }
    }

    /// Attach output text
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Attach an elapsed time in seconds
    #[must_use]
    pub fn with_elapsed(mut self, seconds: f64) -> Self {
        self.elapsed = Some(seconds);
        self
    }

    /// The test name, or `None` for package-level events
    #[must_use]
    pub fn test_name(&self) -> Option<&str> {
        if self.test.is_empty() {
            None
        } else {
            Some(&self.test)
        }
    }

    /// The package identifier, substituting [`UNKNOWN_PACKAGE`] when empty
    #[must_use]
    pub fn package_or_unknown(&self) -> &str {
        if self.package.is_empty() {
            UNKNOWN_PACKAGE
        } else {
            &self.package
        }
    }

    /// Elapsed time as a [`Duration`]
    ///
    /// Missing, negative or non-finite values map to zero.
    #[must_use]
    pub fn elapsed_duration(&self) -> Duration {
        self.elapsed
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_default()
    }

    /// Encode back into a single wire-format line
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which only happens for non-finite
    /// elapsed values.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decode one line of wire-format text
///
/// Blank lines decode to `Ok(None)`.
///
/// # Errors
///
/// Returns [`DecodeError`] if the line is not a JSON object with at least an
/// `Action` field of the right type.
pub fn decode(line: &str) -> Result<Option<Event>, DecodeError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| DecodeError {
            line: line.to_string(),
            source,
        })
}

/// Decode every non-blank line of `text`, stopping at the first bad line
///
/// # Errors
///
/// Returns the [`DecodeError`] for the first line that cannot be decoded.
pub fn decode_all(text: &str) -> Result<Vec<Event>, DecodeError> {
    let mut events = Vec::new();
    for line in text.lines() {
        if let Some(event) = decode(line)? {
            events.push(event);
        }
    }
    Ok(events)
}
