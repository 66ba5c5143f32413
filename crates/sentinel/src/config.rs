// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Configuration for the sentinel command-line tool
//!
//! This module provides the command-line/environment configuration, its
//! validation, and the mapping onto the aggregator settings.

use std::path::PathBuf;

use clap::Parser;

use sentinel_events::aggregator::{
    AggregatorConfig, DEFAULT_CONTEXT_RADIUS, DEFAULT_SOURCE_EXTENSION,
};
use sentinel_events::progress::DEFAULT_QUEUE_CAPACITY;

/// Sentinel - aggregate `go test -json` output into a structured report
#[derive(Parser, Debug, Clone)]
#[command(name = "sentinel")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Read events from this file instead of stdin
    #[arg(short, long, env = "SENTINEL_INPUT")]
    pub input: Option<PathBuf>,

    /// Read the whole input first and reject it if any line is malformed
    ///
    /// Without this flag events are processed as they arrive and malformed
    /// lines are skipped.
    #[arg(short, long, default_value = "false")]
    pub batch: bool,

    /// Lines of source shown on each side of a failure location
    #[arg(long, env = "SENTINEL_CONTEXT_RADIUS", default_value_t = DEFAULT_CONTEXT_RADIUS)]
    pub context_radius: usize,

    /// Directory that relative failure locations are resolved against
    ///
    /// Defaults to the current working directory.
    #[arg(short, long, env = "SENTINEL_SOURCE_ROOT")]
    pub source_root: Option<PathBuf>,

    /// Extension of the source files referenced by failures
    #[arg(long, env = "SENTINEL_EXTENSION", default_value = DEFAULT_SOURCE_EXTENSION)]
    pub extension: String,

    /// Number of progress updates buffered between ingestion and reporting
    #[arg(long, env = "SENTINEL_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Pretty-print the JSON report
    #[arg(short, long, default_value = "false")]
    pub pretty: bool,

    /// Enable verbose logging (debug level)
    ///
    /// Logs are written to stderr so the report on stdout stays parseable.
    #[arg(short, long, default_value = "false", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            batch: false,
            context_radius: DEFAULT_CONTEXT_RADIUS,
            source_root: None,
            extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pretty: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input path is specified but is not an existing file
    /// - The source root is specified but is not an existing directory
    /// - The extension is empty or contains a path separator or dot
    /// - The queue capacity is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(ConfigError::InputNotFound(input.clone()));
            }
            if !input.is_file() {
                return Err(ConfigError::InputNotFile(input.clone()));
            }
        }

        if let Some(ref root) = self.source_root {
            if !root.exists() {
                return Err(ConfigError::SourceRootNotFound(root.clone()));
            }
            if !root.is_dir() {
                return Err(ConfigError::SourceRootNotDirectory(root.clone()));
            }
        }

        if self.extension.is_empty() || self.extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::InvalidExtension(self.extension.clone()));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }

        Ok(())
    }

    /// Aggregator settings derived from this configuration
    #[must_use]
    pub fn aggregator_config(&self) -> AggregatorConfig {
        let config = AggregatorConfig::default()
            .with_context_radius(self.context_radius)
            .with_source_extension(self.extension.clone());
        match &self.source_root {
            Some(root) => config.with_source_root(root.clone()),
            None => config,
        }
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Input file not found
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Input path is not a regular file
    #[error("Input path is not a file: {0}")]
    InputNotFile(PathBuf),

    /// Source root not found
    #[error("Source root not found: {0}")]
    SourceRootNotFound(PathBuf),

    /// Source root is not a directory
    #[error("Source root is not a directory: {0}")]
    SourceRootNotDirectory(PathBuf),

    /// Extension is empty or looks like a path
    #[error("Invalid source extension: {0:?}")]
    InvalidExtension(String),

    /// Progress queue must hold at least one update
    #[error("Queue capacity must be at least 1")]
    InvalidQueueCapacity,
}
