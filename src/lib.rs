//! # docchunk
//!
//! Submit large multi-page PDF documents to a remote extraction service in
//! adaptive page chunks, and reassemble per-chunk results into complete
//! outputs across four extraction modes (markdown, bounding boxes, tables,
//! hierarchy).
//!
//! ## Why this crate?
//!
//! Extraction services fall over on very large payloads: a 400-page annual
//! report POSTed whole comes back as `413 Payload Too Large`, a gateway
//! timeout, or a rate-limit error. docchunk splits the document into
//! contiguous page ranges and submits each one separately — and when the
//! service signals a capacity problem, it halves the chunk size and retries
//! the *same* range in place, without re-planning the ranges that already
//! succeeded. Once shrunk, the smaller size sticks for the rest of the pass.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Source     parse once, slice page ranges via lopdf
//!  │                (corrupt pages become blank 612×792 stand-ins)
//!  ├─ 2. Partition  contiguous 1-based ranges, one at a time
//!  ├─ 3. Submit     multipart POST with bearer auth + transport retries
//!  ├─ 4. Poll       pending jobs queried until terminal or deadline
//!  └─ 5. Persist    one artifact per range, error markers for failures,
//!                   merged markdown on request
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docchunk::{ExtractionConfig, Extractor, OutputMode};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_url("https://extraction-api.nanonets.com/extract")
//!         .api_key(std::env::var("DOCCHUNK_API_KEY")?)
//!         .build()?;
//!
//!     let extractor = Extractor::new(config)?;
//!     let outputs = extractor
//!         .extract_document(
//!             Path::new("annual_report.pdf"),
//!             Path::new("output"),
//!             &OutputMode::ALL,
//!         )
//!         .await?;
//!
//!     for pass in outputs {
//!         eprintln!(
//!             "{}: {} ranges ok, {} failed",
//!             pass.mode, pass.stats.ranges_succeeded, pass.stats.ranges_failed
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docchunk` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docchunk = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, OutputMode};
pub use error::{capacity_signal, ExtractError};
pub use extract::{Extractor, CHUNK_BOUNDARY_MARKER};
pub use output::{PassOutput, PassStats, RangeRecord};
pub use pipeline::client::ExtractClient;
pub use pipeline::partition::{next_range, ChunkSizer};
pub use pipeline::protocol::{ExtractResponse, Submission};
pub use pipeline::source::{DocumentInfo, DocumentSource, PageDimensions, PdfSource};
pub use progress::{NoopProgressCallback, PassProgressCallback, ProgressCallback};
