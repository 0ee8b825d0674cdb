//! Completion poller: query a pending job until it reaches a terminal state.
//!
//! Deployments of the extraction service expose the status endpoint in one of
//! two shapes — `GET <url>?record_id=<id>` or `GET <url>/<id>` — and there is
//! no way to negotiate which up front. Every iteration tries the query-param
//! style first and falls back to the path style, so the poller works against
//! either without configuration.
//!
//! The deadline is wall-clock from the first poll, not a retry count: the
//! cost of waiting is bounded even when the service answers quickly with
//! non-terminal bodies.

use crate::error::ExtractError;
use crate::pipeline::client::{snippet, ExtractClient};
use crate::pipeline::protocol::ExtractResponse;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// What one status query produced.
enum PollOutcome {
    /// 200 with a body satisfying the terminal predicate.
    Terminal(ExtractResponse),
    /// 200 but the job is still running (or the body was not yet parseable).
    NotReady,
    /// The service answered with an error status.
    HttpError { status: u16, body: String },
}

impl ExtractClient {
    /// Poll the job until a terminal state is observed or the configured
    /// deadline elapses.
    ///
    /// On timeout, the error carries the last non-200 response seen, if any.
    pub async fn poll(&self, record_id: &str) -> Result<ExtractResponse, ExtractError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.poll_deadline_secs);
        let mut last_error: Option<(u16, String)> = None;

        while Instant::now() < deadline {
            // Query-param style first.
            let query_url = &self.config.api_url;
            match self.poll_once(query_url, Some(record_id)).await {
                Ok(PollOutcome::Terminal(resp)) => return Ok(resp),
                Ok(PollOutcome::NotReady) => {}
                Ok(PollOutcome::HttpError { status, body }) => {
                    last_error = Some((status, body));
                }
                Err(e) => {
                    debug!("query-style poll for {record_id} failed: {e}");
                }
            }

            // Path-param style as fallback; transport errors and non-200s
            // here are ignored — deployments without this route 404 it.
            let path_url = format!("{}/{}", self.config.api_url, record_id);
            if let Ok(PollOutcome::Terminal(resp)) = self.poll_once(&path_url, None).await {
                return Ok(resp);
            }

            sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
        }

        match last_error {
            Some((status, body)) => {
                warn!(
                    "polling for record_id={record_id} timed out; last response was HTTP {status}: {body}"
                );
                Err(ExtractError::PollTimeout {
                    record_id: record_id.to_string(),
                    last_status: Some(status),
                    last_body: Some(body),
                })
            }
            None => Err(ExtractError::PollTimeout {
                record_id: record_id.to_string(),
                last_status: None,
                last_body: None,
            }),
        }
    }

    /// One status query against `url`, optionally with a `record_id` query
    /// parameter. Transport errors bubble up as `Err`.
    async fn poll_once(
        &self,
        url: &str,
        record_id_param: Option<&str>,
    ) -> Result<PollOutcome, reqwest::Error> {
        let mut request = self.http.get(url).bearer_auth(&self.config.api_key);
        if let Some(id) = record_id_param {
            request = request.query(&[("record_id", id)]);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        if status != 200 {
            return Ok(PollOutcome::HttpError {
                status,
                body: snippet(&text, 2000),
            });
        }

        match serde_json::from_str::<ExtractResponse>(&text) {
            Ok(body) if body.is_terminal() => Ok(PollOutcome::Terminal(body)),
            // Non-terminal or not-yet-JSON: keep polling.
            _ => Ok(PollOutcome::NotReady),
        }
    }
}
