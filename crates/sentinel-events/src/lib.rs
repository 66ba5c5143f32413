// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! sentinel-events: Test event ingestion and aggregation
//!
//! This library crate decodes the line-delimited JSON event stream produced by
//! `go test -json`, aggregates it into per-package suites of nested tests, and
//! enriches failures with the surrounding source lines.
//!
//! # Example
//!
//! ```no_run
//! use sentinel_events::aggregator::Aggregator;
//!
//! // Process a complete transcript
//! let output = r#"{"Action":"run","Package":"example.com/calc","Test":"TestAdd"}"#;
//! let mut aggregator = Aggregator::default();
//! let suites = aggregator.process_batch(output).unwrap();
//!
//! // Or feed lines one at a time as they arrive
//! let mut live = Aggregator::default();
//! live.process_line(output).unwrap();
//! ```

pub mod aggregator;
pub mod cache;
pub mod context;
pub mod error;
pub mod event;
pub mod progress;
pub mod result;
pub mod stats;

pub use aggregator::{Aggregator, AggregatorConfig, RunSnapshot};
pub use cache::SuiteCache;
pub use context::{SourceContext, extract_context, is_likely_source_file};
pub use error::{ContextError, DecodeError, EventsError};
pub use event::{Action, Event, decode, decode_all};
pub use progress::{ProgressPublisher, ProgressSnapshot, PublisherHandle};
pub use result::{
    ErrorKind, SourceLocation, Suite, TestCounts, TestError, TestNode, TestStatus,
};
pub use stats::RunStatistics;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::aggregator::{Aggregator, AggregatorConfig};
    pub use crate::error::EventsError;
    pub use crate::event::{Event, decode};
    pub use crate::progress::{ProgressPublisher, ProgressSnapshot};
    pub use crate::result::{Suite, TestNode, TestStatus};
    pub use crate::stats::RunStatistics;
}
