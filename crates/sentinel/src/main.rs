// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! sentinel: aggregate `go test -json` output into a structured report
//!
//! Reads events from stdin or a file, prints the JSON report to stdout and
//! exits non-zero when any test failed.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use sentinel::config::Config;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config = Config::parse();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .init();

    config.validate()?;
    info!(batch = config.batch, "Starting sentinel");

    let report = sentinel::run(&config).await?;
    println!("{}", report.to_json(config.pretty)?);

    info!(
        suites = report.run.suites.len(),
        tests = report.run.statistics.total_tests,
        failed = report.run.statistics.failed_tests,
        "Report written"
    );

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
