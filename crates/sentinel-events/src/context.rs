// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Source context extraction
//!
//! Turns a `file:line` failure pointer into a small window of source lines.
//! Files are re-read on every request so edits between runs are always
//! reflected.
//!
//! # Example
//!
//! ```no_run
//! use sentinel_events::context::extract_context;
//!
//! let ctx = extract_context("calc_test.go", 42, 2).expect("readable file");
//! for (idx, line) in ctx.lines.iter().enumerate() {
//!     let marker = if idx == ctx.highlight { ">" } else { " " };
//!     println!("{marker} {:4} | {line}", ctx.start_line + idx);
//! }
//! ```

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// Number of leading bytes inspected when sniffing for binary content
const SNIFF_LEN: usize = 512;

/// A window of source lines around a target line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContext {
    /// The extracted lines, in file order
    pub lines: Vec<String>,
    /// 1-based line number of `lines[0]` (0 when empty)
    pub start_line: usize,
    /// 0-based index of the target line within `lines`
    pub highlight: usize,
}

impl SourceContext {
    /// Whether no lines were extracted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 1-based line number of the last extracted line (0 when empty)
    #[must_use]
    pub fn end_line(&self) -> usize {
        if self.lines.is_empty() {
            0
        } else {
            self.start_line + self.lines.len() - 1
        }
    }

    /// The target line itself
    #[must_use]
    pub fn highlighted_line(&self) -> Option<&str> {
        self.lines.get(self.highlight).map(String::as_str)
    }
}

impl IntoIterator for SourceContext {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

/// Inclusive 1-based line range plus the target's offset inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: usize,
    end: usize,
    highlight: usize,
}

/// Compute the window around `target`
///
/// Returns `None` when `target` lies outside `1..=line_count`.
fn window(line_count: usize, target: i64, radius: usize) -> Option<Window> {
    let target = usize::try_from(target).ok()?;
    if target == 0 || target > line_count {
        return None;
    }
    let start = target.saturating_sub(radius).max(1);
    Some(Window {
        start,
        end: target.saturating_add(radius).min(line_count),
        highlight: target - start,
    })
}

/// Extract lines `[line - radius, line + radius]` from `path`, clamped to the file
///
/// A target line outside the file yields an empty context rather than an
/// error, so malformed locations never break rendering.
///
/// # Errors
///
/// Returns [`ContextError::InvalidArgument`] for an empty path or a negative
/// radius, and [`ContextError::NotFound`] if the file cannot be read.
pub fn extract_context(
    path: impl AsRef<Path>,
    line: i64,
    radius: i64,
) -> Result<SourceContext, ContextError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(ContextError::InvalidArgument {
            message: "source path is empty".to_string(),
        });
    }
    let radius = usize::try_from(radius).map_err(|_| ContextError::InvalidArgument {
        message: format!("context radius must not be negative, got {radius}"),
    })?;

    let content = fs::read(path).map_err(|source| ContextError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let content = String::from_utf8_lossy(&content);
    let all_lines: Vec<&str> = content.lines().collect();

    let Some(Window {
        start,
        end,
        highlight,
    }) = window(all_lines.len(), line, radius)
    else {
        return Ok(SourceContext::default());
    };

    Ok(SourceContext {
        lines: all_lines[start - 1..end]
            .iter()
            .map(|l| (*l).to_string())
            .collect(),
        start_line: start,
        highlight,
    })
}

/// Whether `path` looks like a readable source file with the given extension
///
/// The extension is matched case-sensitively against the final path segment,
/// so dotfiles such as `.hidden.go` are accepted. Directories, missing or
/// empty files and files with NUL bytes near the start are rejected.
#[must_use]
pub fn is_likely_source_file(path: impl AsRef<Path>, extension: &str) -> bool {
    let path = path.as_ref();
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let suffix = format!(".{extension}");
    if !name.ends_with(&suffix) {
        return false;
    }

    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() || meta.len() == 0 {
        return false;
    }

    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut head = Vec::with_capacity(SNIFF_LEN);
    match file.take(SNIFF_LEN as u64).read_to_end(&mut head) {
        Ok(0) | Err(_) => false,
        Ok(_) => !head.contains(&0),
    }
}
