// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Report ingestion
//!
//! [`Ingestor`] turns an event source into a [`Report`], either in one batch
//! or as a live stream with per-test progress callbacks.
//!
//! # Example
//!
//! ```no_run
//! use sentinel::ingest::{Ingestor, IngestMode};
//! use sentinel_events::aggregator::AggregatorConfig;
//!
//! let ingestor = Ingestor::new(AggregatorConfig::default());
//! let report = ingestor
//!     .ingest_batch(r#"{"Action":"run","Package":"p","Test":"TestA"}"#)
//!     .expect("ingest batch");
//! assert_eq!(report.mode, IngestMode::Batch);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncBufRead;
use tracing::{debug, info};

use sentinel_events::aggregator::{Aggregator, AggregatorConfig, RunSnapshot};
use sentinel_events::error::EventsError;
use sentinel_events::progress::{DEFAULT_QUEUE_CAPACITY, ProgressPublisher, ProgressSnapshot};

// ============================================================================
// Error Types
// ============================================================================

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// Event processing failed
    #[error("Event processing failed: {0}")]
    Events(#[from] EventsError),

    /// Report serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Progress Reporting
// ============================================================================

/// Progress callback signature
pub type ProgressCallback = Box<dyn FnMut(&ProgressSnapshot) + Send>;

// ============================================================================
// Report
// ============================================================================

/// How the input was consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Whole input decoded up front, all-or-nothing
    Batch,
    /// Events applied as they arrive, bad lines skipped
    Stream,
}

/// The final output of one ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// How the input was consumed
    pub mode: IngestMode,
    /// Progress updates delivered while streaming (0 in batch mode)
    pub progress_updates: usize,
    /// Suites and statistics
    #[serde(flatten)]
    pub run: RunSnapshot,
}

impl Report {
    /// Whether every test passed
    #[must_use]
    pub fn success(&self) -> bool {
        self.run.statistics.success()
    }

    /// Render as JSON
    ///
    /// # Errors
    ///
    /// Returns a serialization error, which only happens for values serde_json
    /// cannot represent.
    pub fn to_json(&self, pretty: bool) -> Result<String, IngestError> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

// ============================================================================
// Ingestor
// ============================================================================

/// High-level API for turning test events into a report
pub struct Ingestor {
    config: AggregatorConfig,
    queue_capacity: usize,
    progress: Option<ProgressCallback>,
}

impl Ingestor {
    /// Create a new ingestor with the given aggregation settings
    #[must_use]
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress: None,
        }
    }

    /// Set the progress queue capacity used in stream mode
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set a progress callback
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Aggregate a complete transcript
    ///
    /// # Errors
    ///
    /// Returns an error if any non-blank line is not a valid event.
    pub fn ingest_batch(&self, text: &str) -> Result<Report, IngestError> {
        info!("Starting batch ingestion");

        let mut aggregator = Aggregator::new(self.config.clone());
        aggregator.process_batch(text)?;

        Ok(Report {
            mode: IngestMode::Batch,
            progress_updates: 0,
            run: aggregator.snapshot(),
        })
    }

    /// Aggregate a live event stream until it ends
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `reader` fails or the ingest task
    /// dies.
    pub async fn ingest_stream<R>(&mut self, reader: R) -> Result<Report, IngestError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        info!(capacity = self.queue_capacity, "Starting stream ingestion");

        let publisher = ProgressPublisher::new(self.queue_capacity);
        let mut updates = 0usize;
        let progress = &mut self.progress;

        let aggregator = publisher
            .run(Aggregator::new(self.config.clone()), reader, |snapshot| {
                updates += 1;
                debug!(
                    completed = snapshot.completed,
                    total = snapshot.total,
                    package = %snapshot.current_package,
                    status = ?snapshot.status,
                    "Test finished"
                );
                if let Some(callback) = progress.as_mut() {
                    callback(&snapshot);
                }
            })
            .await?;

        Ok(Report {
            mode: IngestMode::Stream,
            progress_updates: updates,
            run: aggregator.snapshot(),
        })
    }
}
