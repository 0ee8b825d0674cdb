//! The adaptive chunk controller: walk a document range by range, shrink on
//! capacity failures, persist one artifact per range.
//!
//! ## Why shrink in place?
//!
//! When the service rejects a chunk for size or timing, re-planning the whole
//! document would discard completed work and re-submit ranges that already
//! succeeded. Instead the controller recomputes only the failed range from
//! the same start page at the halved size, and every later range in the pass
//! inherits the smaller size preemptively — once the service has said a
//! payload is too big, there is no reason to offer it another one.
//!
//! A pass never aborts for one bad range: irrecoverable failures produce an
//! `.error.txt` marker and the cursor advances, so a single poisoned range
//! costs exactly its own pages.

use crate::config::{ExtractionConfig, OutputMode};
use crate::error::ExtractError;
use crate::output::{PassOutput, PassStats, RangeRecord};
use crate::pipeline::client::ExtractClient;
use crate::pipeline::partition::{next_range, ChunkSizer};
use crate::pipeline::protocol::{ExtractResponse, Submission};
use crate::pipeline::source::{DocumentSource, PdfSource};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Marker inserted after each chunk's content in merged markdown output.
pub const CHUNK_BOUNDARY_MARKER: &str = "<!-- PAGE-CHUNK BREAK -->";

/// Drives chunked extraction passes against one service deployment.
///
/// Holds the HTTP client and configuration; one `Extractor` can run any
/// number of passes, sequentially or from parallel tasks (it has no mutable
/// state of its own — all pass state lives on the stack of `run_pass`).
pub struct Extractor {
    client: ExtractClient,
    config: ExtractionConfig,
}

impl Extractor {
    /// Build an extractor from a validated configuration.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let client = ExtractClient::new(&config)?;
        Ok(Self { client, config })
    }

    /// The configuration this extractor was built with.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Run one full pass: every page of `source`, one mode, artifacts into
    /// `out_dir`.
    ///
    /// With `merge_markdown` set (markdown mode only), per-range contents are
    /// additionally concatenated — each followed by
    /// [`CHUNK_BOUNDARY_MARKER`] — into `<stem>.md` after the walk.
    ///
    /// # Errors
    /// Only environment-level failures abort the pass: an unreadable source
    /// document or an unwritable output directory. Remote failures are
    /// absorbed per range (shrink or error marker).
    pub async fn run_pass(
        &self,
        source: &dyn DocumentSource,
        stem: &str,
        mode: OutputMode,
        out_dir: &Path,
        merge_markdown: bool,
    ) -> Result<PassOutput, ExtractError> {
        let started = Instant::now();
        let total_pages = source.page_count();

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| ExtractError::ArtifactWrite {
                path: out_dir.to_path_buf(),
                source: e,
            })?;

        info!("=== extracting {mode} for '{stem}' ({total_pages} pages) ===");
        if let Some(cb) = &self.config.progress_callback {
            cb.on_pass_start(mode, total_pages);
        }

        let mut sizer = ChunkSizer::new(self.config.default_chunk_size, self.config.min_chunk_size);
        let mut current_start = 1u32;
        let mut merged: Vec<String> = Vec::new();
        let mut records: Vec<RangeRecord> = Vec::new();
        let mut shrink_events = 0usize;

        while current_start <= total_pages {
            // ── Step 1: compute the range at the current chunk size ──────
            let (start, end) = next_range(current_start, sizer.get(), total_pages);
            if let Some(cb) = &self.config.progress_callback {
                cb.on_range_start(start, end);
            }

            // ── Step 2: materialise the chunk ────────────────────────────
            let chunk = source.extract_range(start, end)?;
            debug!(
                "chunk p{start}-{end}: {:.2} MiB",
                chunk.len() as f64 / (1024.0 * 1024.0)
            );

            // ── Step 3: submit, polling if the service answered with a
            //    receipt instead of a result ────────────────────────────────
            match self.submit_and_resolve(&chunk, mode).await {
                Ok(response) => {
                    // ── Step 4a: persist the result artifact ─────────────
                    let path = artifact_path(out_dir, stem, start, end, mode.extension());
                    let content = response.content.clone().unwrap_or_default();
                    let body = match mode {
                        OutputMode::Markdown => content.clone(),
                        _ => serde_json::to_string_pretty(&response).map_err(|e| {
                            ExtractError::ArtifactWrite {
                                path: path.clone(),
                                source: std::io::Error::other(e),
                            }
                        })?,
                    };
                    write_artifact(&path, body.as_bytes()).await?;
                    if merge_markdown && mode == OutputMode::Markdown {
                        merged.push(content);
                    }
                    if let Some(cb) = &self.config.progress_callback {
                        cb.on_range_complete(start, end, &path);
                    }
                    records.push(RangeRecord {
                        start,
                        end,
                        artifact: path,
                        error: None,
                    });
                    current_start = end + 1;
                }
                Err(err) => {
                    // ── Step 4b: shrink and retry the same start, or give
                    //    up on this range ──────────────────────────────────
                    let old_size = sizer.get();
                    if err.is_capacity_signal() {
                        if let Some(new_size) = sizer.shrink() {
                            shrink_events += 1;
                            warn!(
                                "capacity failure on p{start}-{end} ({err}); \
                                 shrinking chunk size {old_size} -> {new_size} and retrying"
                            );
                            if let Some(cb) = &self.config.progress_callback {
                                cb.on_shrink(old_size, new_size);
                            }
                            // No artifact for the failed attempt; same start.
                            continue;
                        }
                    }

                    let message = err.to_string();
                    error!("irrecoverable error on p{start}-{end}: {message}");
                    let path = error_marker_path(out_dir, stem, start, end);
                    write_artifact(&path, message.as_bytes()).await?;
                    if let Some(cb) = &self.config.progress_callback {
                        cb.on_range_error(start, end, &message);
                    }
                    records.push(RangeRecord {
                        start,
                        end,
                        artifact: path,
                        error: Some(message),
                    });
                    current_start = end + 1;
                }
            }
        }

        // ── Step 5: merge markdown if requested ──────────────────────────
        let merged_path = if merge_markdown && !merged.is_empty() {
            let path = out_dir.join(format!("{stem}.md"));
            write_artifact(&path, merged_markdown(&merged).as_bytes()).await?;
            info!("merged markdown saved: {}", path.display());
            Some(path)
        } else {
            None
        };

        let stats = PassStats {
            total_pages,
            ranges_succeeded: records.iter().filter(|r| r.succeeded()).count(),
            ranges_failed: records.iter().filter(|r| !r.succeeded()).count(),
            shrink_events,
            final_chunk_size: sizer.get(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "pass complete: mode={mode} ok={} failed={} shrinks={} in {}ms",
            stats.ranges_succeeded, stats.ranges_failed, stats.shrink_events, stats.duration_ms
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_pass_complete(mode, &stats);
        }

        Ok(PassOutput {
            mode,
            records,
            merged_path,
            stats,
        })
    }

    /// Run the requested modes over one document file, each into its own
    /// subdirectory of `out_root`. The markdown pass merges its chunks.
    ///
    /// Passes run sequentially; they share no mutable state, so callers that
    /// want parallelism can spawn one `run_pass` per mode instead.
    pub async fn extract_document(
        &self,
        input: &Path,
        out_root: &Path,
        modes: &[OutputMode],
    ) -> Result<Vec<PassOutput>, ExtractError> {
        let source = PdfSource::open(input)?;
        let stem = source.stem().to_string();
        let mut outputs = Vec::with_capacity(modes.len());
        for &mode in modes {
            let out_dir = out_root.join(mode.dir_name());
            let merge = mode == OutputMode::Markdown;
            outputs.push(self.run_pass(&source, &stem, mode, &out_dir, merge).await?);
        }
        Ok(outputs)
    }

    /// Submit a chunk and block until a final result: either the submission
    /// completed synchronously or the pending job was polled to completion.
    async fn submit_and_resolve(
        &self,
        chunk: &[u8],
        mode: OutputMode,
    ) -> Result<ExtractResponse, ExtractError> {
        match self.client.submit(chunk, mode).await? {
            Submission::Complete(response) => Ok(response),
            Submission::Pending { record_id } => {
                debug!("submission pending; polling record_id={record_id}");
                self.client.poll(&record_id).await
            }
        }
    }
}

/// Concatenate per-range markdown contents, each trimmed and followed by the
/// boundary marker. Pure, so re-running with the same chunks is idempotent.
fn merged_markdown(chunks: &[String]) -> String {
    chunks
        .iter()
        .map(|c| format!("{}\n\n{CHUNK_BOUNDARY_MARKER}\n\n", c.trim_end()))
        .collect()
}

fn artifact_path(out_dir: &Path, stem: &str, start: u32, end: u32, ext: &str) -> PathBuf {
    out_dir.join(format!("{stem}_p{start}-{end}.{ext}"))
}

fn error_marker_path(out_dir: &Path, stem: &str, start: u32, end: u32) -> PathBuf {
    out_dir.join(format!("{stem}_p{start}-{end}.error.txt"))
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ExtractError::ArtifactWrite {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_naming() {
        let dir = Path::new("out/markdown");
        assert_eq!(
            artifact_path(dir, "annual_report", 1, 10, "md"),
            Path::new("out/markdown/annual_report_p1-10.md")
        );
        assert_eq!(
            artifact_path(dir, "annual_report", 11, 12, "json"),
            Path::new("out/markdown/annual_report_p11-12.json")
        );
        assert_eq!(
            error_marker_path(dir, "annual_report", 6, 10),
            Path::new("out/markdown/annual_report_p6-10.error.txt")
        );
    }

    #[test]
    fn merged_markdown_formats_boundaries() {
        let chunks = vec!["# One\n\n".to_string(), "# Two".to_string()];
        let merged = merged_markdown(&chunks);
        assert_eq!(
            merged,
            "# One\n\n<!-- PAGE-CHUNK BREAK -->\n\n# Two\n\n<!-- PAGE-CHUNK BREAK -->\n\n"
        );
    }

    #[test]
    fn merged_markdown_is_deterministic() {
        let chunks = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(merged_markdown(&chunks), merged_markdown(&chunks));
    }
}
