//! Error types for the docchunk library.
//!
//! The taxonomy mirrors how the controller reacts to each failure:
//!
//! * **Transport** — the request never completed (connection refused, client
//!   timeout). Retried with backoff inside the submission client, then
//!   escalated wrapping the last observed error.
//! * **Http** — the service answered with a status ≥ 400. The body prefix is
//!   captured so the controller can run the capacity predicate over it.
//! * **MalformedResponse / MissingRecordId** — contract violations by the
//!   remote service; irrecoverable for the current range.
//! * **PollTimeout** — no terminal job state before the deadline. Carries the
//!   last non-200 response when one was seen.
//!
//! Failures below the range granularity (a single corrupt page) never surface
//! here — the chunk materialiser substitutes a blank page and keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// HTTP status codes the extraction service returns when a payload was too
/// large or too slow for it to handle.
pub const CAPACITY_STATUS_CODES: [u16; 7] = [408, 413, 429, 500, 502, 503, 504];

/// Message fragments that mark a capacity failure even when no status code
/// survived into the error text.
const CAPACITY_PHRASES: [&str; 3] = ["payload too large", "timeout", "timed out"];

/// All errors returned by the docchunk library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists but lopdf could not parse it.
    #[error("failed to open document '{path}': {detail}")]
    DocumentOpen { path: PathBuf, detail: String },

    /// The document parsed but contains no pages; there is nothing to chunk.
    #[error("document has no pages: '{path}'")]
    EmptyDocument { path: PathBuf },

    /// Serialising the sub-document for a page range failed structurally
    /// (beyond what blank-page substitution can repair).
    #[error("failed to build chunk for pages {start}-{end}: {detail}")]
    ChunkBuild { start: u32, end: u32, detail: String },

    // ── Remote service errors ─────────────────────────────────────────────
    /// The service answered with an error status. `body` holds a bounded
    /// prefix of the response text for diagnosis.
    #[error("HTTP {status} from extraction service: {body}")]
    Http { status: u16, body: String },

    /// The request never completed at the transport level, after exhausting
    /// the retry budget.
    #[error("transport failure after {attempts} attempts: {detail}")]
    Transport { attempts: u32, detail: String },

    /// The response body was not the expected JSON shape.
    #[error("response was not valid JSON. Snippet: {snippet}")]
    MalformedResponse { snippet: String },

    /// The service returned neither a terminal payload nor a job id to poll.
    #[error("service returned no record_id; cannot poll. Body: {body}")]
    MissingRecordId { body: String },

    /// Polling hit the wall-clock deadline without observing a terminal state.
    #[error("polling timed out for record_id={record_id}{}", fmt_last_status(.last_status))]
    PollTimeout {
        record_id: String,
        last_status: Option<u16>,
        last_body: Option<String>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("failed to write artifact '{path}': {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn fmt_last_status(last_status: &Option<u16>) -> String {
    match last_status {
        Some(s) => format!(" (last HTTP status: {s})"),
        None => String::new(),
    }
}

impl ExtractError {
    /// The HTTP status code this error carries, if the service answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ExtractError::Http { status, .. } => Some(*status),
            ExtractError::PollTimeout { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// Whether this failure indicates the service rejected the request for
    /// being too large or too slow — the trigger for shrinking the chunk size
    /// and retrying the same range.
    ///
    /// A poll timeout always counts: the service accepted the chunk but could
    /// not finish it in time, which a smaller chunk may fix.
    pub fn is_capacity_signal(&self) -> bool {
        match self {
            ExtractError::Http { status, body } => capacity_signal(Some(*status), body),
            ExtractError::Transport { detail, .. } => capacity_signal(None, detail),
            ExtractError::PollTimeout { .. } => true,
            _ => false,
        }
    }
}

/// Pure capacity-failure predicate over `(status_code, text)`.
///
/// Matches when the status is in [`CAPACITY_STATUS_CODES`], when the text
/// contains a known phrase, or when one of the status codes appears as digits
/// anywhere in the text (error messages relayed by proxies often embed the
/// upstream code without structure).
pub fn capacity_signal(status: Option<u16>, text: &str) -> bool {
    if let Some(code) = status {
        if CAPACITY_STATUS_CODES.contains(&code) {
            return true;
        }
    }
    let lower = text.to_ascii_lowercase();
    if CAPACITY_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    CAPACITY_STATUS_CODES
        .iter()
        .any(|code| lower.contains(&code.to_string()))
}
