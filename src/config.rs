//! Configuration types for adaptive chunked extraction.
//!
//! All tunables live in one [`ExtractionConfig`] value, built via
//! [`ExtractionConfigBuilder`] and handed to [`crate::Extractor`] at
//! construction. Nothing is read from ambient process state, so two passes
//! with different endpoints or chunk sizes can run side by side and tests can
//! inject their own settings.
//!
//! # Design choice: builder over constructor
//! The knob count keeps growing (chunk sizing, retries, polling, callbacks).
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four extraction modes the remote service understands.
///
/// Each mode maps to its own output subdirectory and artifact extension:
/// markdown produces `.md` text, everything else a structured `.json` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputMode {
    /// Plain markdown text of the document.
    #[serde(rename = "markdown")]
    Markdown,
    /// OCR text with per-word bounding boxes.
    #[serde(rename = "ocr-with-bounding-boxes")]
    BoundingBoxes,
    /// Detected tables as structured data.
    #[serde(rename = "tables")]
    Tables,
    /// Document hierarchy (headings, sections, nesting).
    #[serde(rename = "hierarchy_output")]
    Hierarchy,
}

impl OutputMode {
    /// All modes, in the order the batch driver runs them.
    pub const ALL: [OutputMode; 4] = [
        OutputMode::Markdown,
        OutputMode::BoundingBoxes,
        OutputMode::Tables,
        OutputMode::Hierarchy,
    ];

    /// The `output_type` string sent on the wire.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            OutputMode::Markdown => "markdown",
            OutputMode::BoundingBoxes => "ocr-with-bounding-boxes",
            OutputMode::Tables => "tables",
            OutputMode::Hierarchy => "hierarchy_output",
        }
    }

    /// Output subdirectory for this mode's artifacts.
    pub fn dir_name(&self) -> &'static str {
        match self {
            OutputMode::Markdown => "markdown",
            OutputMode::BoundingBoxes => "boxes",
            OutputMode::Tables => "tables",
            OutputMode::Hierarchy => "hierarchy",
        }
    }

    /// Artifact file extension for a successful range.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputMode::Markdown => "md",
            _ => "json",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

impl FromStr for OutputMode {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputMode::Markdown),
            "ocr-with-bounding-boxes" | "boxes" => Ok(OutputMode::BoundingBoxes),
            "tables" => Ok(OutputMode::Tables),
            "hierarchy_output" | "hierarchy" => Ok(OutputMode::Hierarchy),
            other => Err(ExtractError::InvalidConfig(format!(
                "unknown output mode '{other}' (expected markdown, boxes, tables, hierarchy)"
            ))),
        }
    }
}

/// Configuration for chunked extraction against one service deployment.
///
/// Built via [`ExtractionConfig::builder()`].
///
/// # Example
/// ```rust
/// use docchunk::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_url("https://extraction-api.nanonets.com/extract")
///     .api_key("secret")
///     .default_chunk_size(10)
///     .min_chunk_size(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Base URL of the extraction endpoint. POST submits a chunk; the same
    /// URL with `?record_id=` or `/<id>` appended polls job status.
    pub api_url: String,

    /// Bearer token sent in the `Authorization` header.
    pub api_key: String,

    /// Per-request timeout in seconds (submission and each poll query).
    /// Default: 300.
    ///
    /// Large chunks can take minutes server-side even on the synchronous
    /// path, so this is deliberately generous. Client-side timeouts surface
    /// as transport errors, which the capacity heuristic treats as a shrink
    /// signal once retries are exhausted.
    pub request_timeout_secs: u64,

    /// Sleep between status polls in seconds. Default: 2.
    pub poll_interval_secs: u64,

    /// Wall-clock polling deadline per job in seconds. Default: 240.
    ///
    /// Measured from the first poll, not per request. When it elapses the
    /// poller gives up with [`crate::ExtractError::PollTimeout`] carrying
    /// the last non-200 response, if any.
    pub poll_deadline_secs: u64,

    /// Submission attempts before a transport failure is escalated.
    /// Default: 3.
    pub max_retries: u32,

    /// Backoff base in seconds; attempt `n` sleeps `base × n` before the
    /// next try. Default: 2.
    pub retry_backoff_secs: u64,

    /// Pages per chunk at the start of every pass. Default: 10.
    ///
    /// The controller only ever shrinks this during a pass — once the
    /// service signals a payload was too large, every later range in the
    /// same pass uses the smaller size preemptively.
    pub default_chunk_size: u32,

    /// Floor for auto-shrinking. Default: 5.
    ///
    /// A capacity failure at the floor is treated as irrecoverable for that
    /// range rather than shrinking further: past this point the bottleneck
    /// is almost never payload size.
    pub min_chunk_size: u32,

    /// Optional range-level progress callback (drives the CLI progress bar).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            request_timeout_secs: 300,
            poll_interval_secs: 2,
            poll_deadline_secs: 240,
            max_retries: 3,
            retry_backoff_secs: 2,
            default_chunk_size: 10,
            min_chunk_size: 5,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("poll_deadline_secs", &self.poll_deadline_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_secs", &self.retry_backoff_secs)
            .field("default_chunk_size", &self.default_chunk_size)
            .field("min_chunk_size", &self.min_chunk_size)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PassProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs.max(1);
        self
    }

    pub fn poll_deadline_secs(mut self, secs: u64) -> Self {
        self.config.poll_deadline_secs = secs.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_backoff_secs(mut self, secs: u64) -> Self {
        self.config.retry_backoff_secs = secs;
        self
    }

    pub fn default_chunk_size(mut self, pages: u32) -> Self {
        self.config.default_chunk_size = pages.max(1);
        self
    }

    pub fn min_chunk_size(mut self, pages: u32) -> Self {
        self.config.min_chunk_size = pages.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.api_url.is_empty() {
            return Err(ExtractError::InvalidConfig("api_url must be set".into()));
        }
        if c.min_chunk_size > c.default_chunk_size {
            return Err(ExtractError::InvalidConfig(format!(
                "min_chunk_size ({}) must not exceed default_chunk_size ({})",
                c.min_chunk_size, c.default_chunk_size
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let c = ExtractionConfig::builder()
            .api_url("http://localhost:9999/extract")
            .build()
            .unwrap();
        assert_eq!(c.request_timeout_secs, 300);
        assert_eq!(c.poll_interval_secs, 2);
        assert_eq!(c.poll_deadline_secs, 240);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.default_chunk_size, 10);
        assert_eq!(c.min_chunk_size, 5);
    }

    #[test]
    fn builder_rejects_empty_url() {
        assert!(ExtractionConfig::builder().build().is_err());
    }

    #[test]
    fn builder_rejects_floor_above_default() {
        let result = ExtractionConfig::builder()
            .api_url("http://localhost/extract")
            .default_chunk_size(4)
            .min_chunk_size(8)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_clamps_zero_values() {
        let c = ExtractionConfig::builder()
            .api_url("http://localhost/extract")
            .default_chunk_size(0)
            .min_chunk_size(0)
            .max_retries(0)
            .build()
            .unwrap();
        assert_eq!(c.default_chunk_size, 1);
        assert_eq!(c.min_chunk_size, 1);
        assert_eq!(c.max_retries, 1);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ExtractionConfig::builder()
            .api_url("http://localhost/extract")
            .api_key("very-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("very-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn mode_api_strings_round_trip() {
        for mode in OutputMode::ALL {
            assert_eq!(mode.as_api_str().parse::<OutputMode>().unwrap(), mode);
        }
    }

    #[test]
    fn mode_directories_and_extensions() {
        assert_eq!(OutputMode::Markdown.dir_name(), "markdown");
        assert_eq!(OutputMode::BoundingBoxes.dir_name(), "boxes");
        assert_eq!(OutputMode::Tables.dir_name(), "tables");
        assert_eq!(OutputMode::Hierarchy.dir_name(), "hierarchy");

        assert_eq!(OutputMode::Markdown.extension(), "md");
        assert_eq!(OutputMode::Tables.extension(), "json");
    }

    #[test]
    fn mode_from_str_aliases() {
        assert_eq!("boxes".parse::<OutputMode>().unwrap(), OutputMode::BoundingBoxes);
        assert_eq!("hierarchy".parse::<OutputMode>().unwrap(), OutputMode::Hierarchy);
        assert!("pdf".parse::<OutputMode>().is_err());
    }
}
