//! Submission client: multipart POST of one chunk, with transport retries.
//!
//! The client owns the only `reqwest::Client` in the crate; the poller
//! (`super::poll`) reuses it for status queries.
//!
//! ## Retry Strategy
//!
//! Only transport-level failures (connection refused, client-side timeout,
//! truncated body) are retried here, sleeping `retry_backoff_secs × attempt`
//! between tries. Anything the service actually answered — an error status,
//! an unparseable body — goes straight back to the controller, which decides
//! between shrinking the chunk and writing an error marker.

use crate::config::{ExtractionConfig, OutputMode};
use crate::error::ExtractError;
use crate::pipeline::protocol::{ExtractResponse, Submission};
use reqwest::multipart;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How much of an error-response body is kept for logs and error values.
const ERROR_BODY_PREFIX: usize = 2000;
/// Snippet length for bodies that failed to parse as JSON.
const PARSE_SNIPPET: usize = 500;
/// Snippet length for bodies missing a record id.
const RECEIPT_SNIPPET: usize = 800;

/// HTTP client for one extraction-service deployment.
pub struct ExtractClient {
    pub(super) http: reqwest::Client,
    pub(super) config: ExtractionConfig,
}

impl ExtractClient {
    /// Build a client from the configuration's endpoint and timeouts.
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                ExtractError::InvalidConfig(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Submit one chunk for the given output mode.
    ///
    /// Returns [`Submission::Complete`] when the response already satisfies
    /// the terminal predicate (some modes finish synchronously), or
    /// [`Submission::Pending`] with the job id to poll. Transport failures
    /// are retried up to `max_retries` times before escalating.
    pub async fn submit(
        &self,
        chunk: &[u8],
        mode: OutputMode,
    ) -> Result<Submission, ExtractError> {
        let attempts = self.config.max_retries;
        let mut last_detail = String::new();

        for attempt in 1..=attempts {
            match self.submit_once(chunk, mode).await {
                Err(ExtractError::Transport { detail, .. }) => {
                    warn!(
                        "submit attempt {attempt}/{attempts} for mode {mode} failed: {detail}"
                    );
                    last_detail = detail;
                    if attempt < attempts {
                        let backoff = self.config.retry_backoff_secs * u64::from(attempt);
                        sleep(Duration::from_secs(backoff)).await;
                    }
                }
                other => return other,
            }
        }

        Err(ExtractError::Transport {
            attempts,
            detail: last_detail,
        })
    }

    /// One submission attempt, no retries.
    async fn submit_once(
        &self,
        chunk: &[u8],
        mode: OutputMode,
    ) -> Result<Submission, ExtractError> {
        // The form consumes its parts, so it is rebuilt from the chunk bytes
        // on every attempt.
        let part = multipart::Part::bytes(chunk.to_vec())
            .file_name("chunk.pdf")
            .mime_str("application/pdf")
            .map_err(transport_err)?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("output_type", mode.as_api_str());

        debug!(
            "POST {} mode={} chunk={} bytes",
            self.config.api_url,
            mode,
            chunk.len()
        );

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport_err)?;

        if status >= 400 {
            let body = snippet(&text, ERROR_BODY_PREFIX);
            warn!("HTTP {status} for mode {mode}. Server said: {body}");
            return Err(ExtractError::Http { status, body });
        }

        let parsed: ExtractResponse =
            serde_json::from_str(&text).map_err(|_| ExtractError::MalformedResponse {
                snippet: snippet(&text, PARSE_SNIPPET),
            })?;

        if parsed.is_terminal() {
            return Ok(Submission::Complete(parsed));
        }

        match parsed.record_id.clone() {
            Some(record_id) => Ok(Submission::Pending { record_id }),
            None => Err(ExtractError::MissingRecordId {
                body: snippet(&text, RECEIPT_SNIPPET),
            }),
        }
    }
}

fn transport_err(e: reqwest::Error) -> ExtractError {
    ExtractError::Transport {
        attempts: 1,
        detail: e.to_string(),
    }
}

/// First `max_chars` characters of `s` (char-boundary safe).
pub(super) fn snippet(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_on_char_boundaries() {
        assert_eq!(snippet("hello", 10), "hello");
        assert_eq!(snippet("hello", 3), "hel");
        // Multi-byte chars must not be split.
        assert_eq!(snippet("péché", 3), "péc");
    }

    #[test]
    fn client_builds_from_config() {
        let config = ExtractionConfig::builder()
            .api_url("http://localhost:1/extract")
            .api_key("k")
            .build()
            .unwrap();
        assert!(ExtractClient::new(&config).is_ok());
    }
}
