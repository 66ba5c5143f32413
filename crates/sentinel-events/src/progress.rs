// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Progress publishing
//!
//! [`ProgressPublisher`] moves an [`Aggregator`] onto a background task that
//! ingests a byte stream, and hands back a bounded queue of
//! [`ProgressSnapshot`]s. When the queue is full the ingest task waits, so a
//! slow consumer slows ingestion instead of losing snapshots.
//!
//! # Example
//!
//! ```no_run
//! use sentinel_events::aggregator::Aggregator;
//! use sentinel_events::progress::ProgressPublisher;
//! use tokio::io::BufReader;
//!
//! # async fn demo() -> Result<(), sentinel_events::EventsError> {
//! let reader = BufReader::new(tokio::io::stdin());
//! let aggregator = ProgressPublisher::default()
//!     .run(Aggregator::default(), reader, |snapshot| {
//!         eprintln!("{}/{} tests", snapshot.completed, snapshot.total);
//!     })
//!     .await?;
//! println!("{} failed", aggregator.statistics().failed_tests);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::error::EventsError;
use crate::result::TestStatus;

/// Default number of snapshots buffered between ingest and consumer
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Progress after one test finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Tests that have reached a terminal status
    pub completed: usize,
    /// Tests registered so far; grows as new tests start
    pub total: usize,
    /// Package of the test that just finished
    pub current_package: String,
    /// Status of the test that just finished
    pub status: TestStatus,
}

impl ProgressSnapshot {
    /// Completed share of the registered tests, in `0.0..=1.0`
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed.min(self.total) as f64 / self.total as f64
        }
    }
}

/// Runs stream ingestion in the background and publishes progress
#[derive(Debug, Clone, Copy)]
pub struct ProgressPublisher {
    capacity: usize,
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ProgressPublisher {
    /// Create a publisher with the given queue capacity (at least 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    /// Queue capacity in snapshots
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start ingesting `reader` on a new task
    ///
    /// The receiver yields one snapshot per finished test and closes once
    /// ingestion ends. Dropping the receiver stops ingestion early.
    pub fn spawn<R>(
        &self,
        mut aggregator: Aggregator,
        reader: R,
    ) -> (PublisherHandle, mpsc::Receiver<ProgressSnapshot>)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.capacity);
        let task = tokio::spawn(async move {
            let result = aggregator.process_stream(reader, Some(&tx)).await;
            drop(tx);
            result.map(|()| aggregator)
        });
        debug!(capacity = self.capacity, "Spawned progress publisher");
        (PublisherHandle { task }, rx)
    }

    /// Ingest `reader`, calling `on_progress` for every snapshot
    ///
    /// Returns the aggregator once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::Io`] if reading fails and
    /// [`EventsError::PublisherFailed`] if the ingest task did not complete.
    pub async fn run<R, F>(
        &self,
        aggregator: Aggregator,
        reader: R,
        mut on_progress: F,
    ) -> Result<Aggregator, EventsError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        F: FnMut(ProgressSnapshot),
    {
        let (handle, mut rx) = self.spawn(aggregator, reader);
        while let Some(snapshot) = rx.recv().await {
            on_progress(snapshot);
        }
        handle.join().await
    }
}

/// Handle to a running ingest task
#[derive(Debug)]
pub struct PublisherHandle {
    task: JoinHandle<Result<Aggregator, EventsError>>,
}

impl PublisherHandle {
    /// Wait for ingestion to end and take back the aggregator
    ///
    /// # Errors
    ///
    /// Returns the ingest error, or [`EventsError::PublisherFailed`] if the
    /// task panicked or was cancelled.
    pub async fn join(self) -> Result<Aggregator, EventsError> {
        self.task.await.map_err(|e| {
            warn!(error = %e, "Progress publisher task failed");
            EventsError::PublisherFailed {
                message: e.to_string(),
            }
        })?
    }

    /// Whether the ingest task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel ingestion
    pub fn abort(&self) {
        self.task.abort();
    }
}
