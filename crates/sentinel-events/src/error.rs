// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for sentinel-events

use std::path::PathBuf;

use thiserror::Error;

/// A single input line that is not a well-formed test event
#[derive(Debug, Error)]
#[error("Failed to decode test event {line:?}: {source}")]
pub struct DecodeError {
    /// The raw line as it was received
    pub line: String,
    /// The underlying JSON error
    #[source]
    pub source: serde_json::Error,
}

/// Errors raised while extracting source context around a failure
#[derive(Debug, Error)]
pub enum ContextError {
    /// The source file is missing or unreadable
    #[error("Source file not found: {}: {source}", path.display())]
    NotFound {
        /// The path that could not be read
        path: PathBuf,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The request itself is malformed (empty path, negative radius)
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument
        message: String,
    },
}

/// Errors that can occur during test event processing
#[derive(Debug, Error)]
pub enum EventsError {
    /// A line could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Source context extraction failed
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Error reading the event stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The background publisher task panicked or was aborted
    #[error("Progress publisher failed: {message}")]
    PublisherFailed {
        /// Description of the task failure
        message: String,
    },
}
