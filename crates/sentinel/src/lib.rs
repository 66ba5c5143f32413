// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! sentinel library
//!
//! This module exports the command-line driver's configuration and
//! ingestion logic for use in integration tests and as a library.

pub mod config;
pub mod ingest;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncReadExt, BufReader};

use crate::config::Config;
use crate::ingest::{Ingestor, Report};

/// Run one ingestion as described by `config`
///
/// # Errors
///
/// Returns an error if the input cannot be opened or read, or if batch mode
/// meets a malformed line.
pub async fn run(config: &Config) -> Result<Report> {
    let ingestor = Ingestor::new(config.aggregator_config())
        .with_queue_capacity(config.queue_capacity);

    if config.batch {
        let text = read_all(config).await?;
        return ingestor
            .ingest_batch(&text)
            .context("Failed to aggregate test events");
    }

    let reader = open_input(config).await?;
    let mut ingestor = ingestor;
    ingestor
        .ingest_stream(reader)
        .await
        .context("Failed to ingest test event stream")
}

async fn open_input(config: &Config) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match &config.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

async fn read_all(config: &Config) -> Result<String> {
    let mut reader = open_input(config).await?;
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .await
        .context("Failed to read test events")?;
    String::from_utf8(bytes).context("Test event input is not valid UTF-8")
}
