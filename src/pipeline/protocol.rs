//! Wire types for the extraction service's JSON responses.
//!
//! The service answers both submission and status queries with the same
//! shape. All fields are optional because deployments differ in which ones
//! they populate; [`ExtractResponse::is_terminal`] is the single place that
//! decides whether a body represents a finished result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status strings the service uses to mean "finished".
const TERMINAL_STATUSES: [&str; 4] = ["completed", "done", "finished", "succeeded"];

/// One response body from the extraction service.
///
/// Unknown fields are preserved in `extra` so persisted JSON artifacts carry
/// the full payload the service produced, not just the fields this client
/// inspects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractResponse {
    /// Job status string, e.g. `"processing"` or `"completed"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_status: Option<String>,

    /// Extracted text (markdown mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Detected tables (tables mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<Value>>,

    /// How many pages the service has processed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_processed: Option<u64>,

    /// Job identifier to poll when the response is only a receipt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    /// Everything else the service sent, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractResponse {
    /// The terminal predicate: does this body represent a finished result?
    ///
    /// True when the status is a known completion synonym, or the body
    /// carries non-empty content, a non-empty table payload, or a positive
    /// processed-page count (some modes complete synchronously and skip the
    /// status field entirely).
    ///
    /// `pages_processed > 0` alone implying completion is the service's own
    /// semantics, kept for parity. A still-pending job reporting an interim
    /// page count would be misclassified as complete; the service has never
    /// been observed to do that, but the contract does not rule it out.
    pub fn is_terminal(&self) -> bool {
        if let Some(status) = &self.processing_status {
            if TERMINAL_STATUSES.contains(&status.to_ascii_lowercase().as_str()) {
                return true;
            }
        }
        self.content.as_deref().is_some_and(|c| !c.is_empty())
            || self.tables.as_ref().is_some_and(|t| !t.is_empty())
            || self.pages_processed.unwrap_or(0) > 0
    }
}

/// What a submission came back as: either a final result (synchronous
/// completion) or a receipt whose job id must be polled.
#[derive(Debug, Clone)]
pub enum Submission {
    /// The body already satisfies the terminal predicate.
    Complete(ExtractResponse),
    /// The service accepted the chunk and handed back a job id.
    Pending { record_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ExtractResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn terminal_by_status_synonyms() {
        for status in ["completed", "done", "finished", "succeeded", "DONE", "Completed"] {
            let resp = parse(&format!(r#"{{"processing_status":"{status}"}}"#));
            assert!(resp.is_terminal(), "status {status:?} should be terminal");
        }
        let resp = parse(r#"{"processing_status":"processing"}"#);
        assert!(!resp.is_terminal());
    }

    #[test]
    fn terminal_by_content() {
        assert!(parse(r##"{"content":"# Title"}"##).is_terminal());
        // Empty content is not a result.
        assert!(!parse(r#"{"content":""}"#).is_terminal());
    }

    #[test]
    fn terminal_by_tables() {
        assert!(parse(r#"{"processing_status":"pending","tables":[{"rows":[]}]}"#).is_terminal());
        assert!(!parse(r#"{"tables":[]}"#).is_terminal());
    }

    #[test]
    fn terminal_by_pages_processed() {
        assert!(parse(r#"{"pages_processed":3}"#).is_terminal());
        assert!(!parse(r#"{"pages_processed":0}"#).is_terminal());
    }

    #[test]
    fn receipt_only_body_is_not_terminal() {
        let resp = parse(r#"{"record_id":"abc"}"#);
        assert!(!resp.is_terminal());
        assert_eq!(resp.record_id.as_deref(), Some("abc"));
    }

    #[test]
    fn unknown_fields_round_trip() {
        let resp = parse(r#"{"content":"x","confidence":0.93,"engine":"v2"}"#);
        assert_eq!(resp.extra.get("engine").and_then(Value::as_str), Some("v2"));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["confidence"], 0.93);
        assert_eq!(json["content"], "x");
        // Absent optional fields stay absent instead of serialising as null.
        assert!(json.get("record_id").is_none());
    }
}
