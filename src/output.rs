//! Result types for a completed pass.
//!
//! A pass never aborts for one bad range, so its outcome is a mixed list of
//! [`RangeRecord`]s — some pointing at result artifacts, some at error
//! markers. [`PassStats`] summarises the pass for reporting; callers that
//! want an error on any failed range can inspect `stats.ranges_failed`.

use crate::config::OutputMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The outcome of one full walk over a document for one output mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassOutput {
    /// The extraction mode this pass ran.
    pub mode: OutputMode,
    /// One record per final range, in ascending page order.
    pub records: Vec<RangeRecord>,
    /// Path of the merged markdown file, when merging was requested and at
    /// least one range produced content.
    pub merged_path: Option<PathBuf>,
    /// Pass-level counters.
    pub stats: PassStats,
}

/// One page range's final disposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeRecord {
    /// First page of the range (1-based, inclusive).
    pub start: u32,
    /// Last page of the range (1-based, inclusive).
    pub end: u32,
    /// The artifact written for this range — a result file on success, an
    /// `.error.txt` marker on failure.
    pub artifact: PathBuf,
    /// The error text when the range failed irrecoverably; `None` on success.
    pub error: Option<String>,
}

impl RangeRecord {
    /// Whether this range produced a result artifact (not an error marker).
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Counters for one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassStats {
    /// Total pages in the source document.
    pub total_pages: u32,
    /// Ranges that produced a result artifact.
    pub ranges_succeeded: usize,
    /// Ranges that produced an error marker.
    pub ranges_failed: usize,
    /// Number of times the chunk size was halved during the pass.
    pub shrink_events: usize,
    /// Chunk size in effect when the pass finished (equal to the default
    /// unless capacity failures forced shrinking).
    pub final_chunk_size: u32,
    /// Wall-clock duration of the pass in milliseconds.
    pub duration_ms: u64,
}
