//! End-to-end tests against a mock extraction service.
//!
//! Covers the adaptive loop (shrink on capacity failure, error markers on
//! everything else), the pending-then-poll flow, and artifact layout on disk.

use docchunk::{
    DocumentSource, ExtractError, ExtractionConfig, Extractor, OutputMode, CHUNK_BOUNDARY_MARKER,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory document with a fixed page count. `extract_range` returns a
/// placeholder payload so submissions carry distinguishable bodies without
/// needing a real PDF on every test.
struct FakeSource {
    pages: u32,
}

impl DocumentSource for FakeSource {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn extract_range(&self, start: u32, end: u32) -> Result<Vec<u8>, ExtractError> {
        Ok(format!("%PDF-fake pages {start}-{end}").into_bytes())
    }
}

fn config_for(server: &MockServer) -> ExtractionConfig {
    ExtractionConfig::builder()
        .api_url(format!("{}/extract", server.uri()))
        .api_key("test-key")
        .request_timeout_secs(5)
        .poll_interval_secs(1)
        .poll_deadline_secs(5)
        .max_retries(2)
        .retry_backoff_secs(0)
        .default_chunk_size(10)
        .min_chunk_size(5)
        .build()
        .expect("valid test config")
}

fn completed_markdown(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "processing_status": "completed",
        "content": text,
    }))
}

#[tokio::test]
async fn shrinks_on_413_and_covers_all_pages() {
    let server = MockServer::start().await;

    // First submission (pages 1-10) is rejected as too large; every
    // submission after the shrink succeeds.
    Mock::given(method("POST"))
        .and(path("/extract"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(413).set_body_string("Payload Too Large"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(completed_markdown("# Section"))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config_for(&server)).expect("client");
    let source = FakeSource { pages: 12 };
    let out = tempfile::tempdir().expect("tempdir");

    let pass = extractor
        .run_pass(&source, "report", OutputMode::Markdown, out.path(), true)
        .await
        .expect("pass succeeds");

    // 12 pages at the shrunken size of 5 → ranges 1-5, 6-10, 11-12.
    let ranges: Vec<(u32, u32)> = pass.records.iter().map(|r| (r.start, r.end)).collect();
    assert_eq!(ranges, vec![(1, 5), (6, 10), (11, 12)]);
    assert_eq!(pass.stats.shrink_events, 1);
    assert_eq!(pass.stats.final_chunk_size, 5);
    assert_eq!(pass.stats.ranges_succeeded, 3);
    assert_eq!(pass.stats.ranges_failed, 0);

    assert!(out.path().join("report_p1-5.md").is_file());
    assert!(out.path().join("report_p6-10.md").is_file());
    assert!(out.path().join("report_p11-12.md").is_file());

    // The rejected 1-10 attempt must leave no artifact behind.
    assert!(!out.path().join("report_p1-10.md").exists());
    assert!(!out.path().join("report_p1-10.error.txt").exists());

    let merged = std::fs::read_to_string(out.path().join("report.md")).expect("merged file");
    assert_eq!(merged.matches(CHUNK_BOUNDARY_MARKER).count(), 3);
    assert_eq!(pass.merged_path, Some(out.path().join("report.md")));
}

#[tokio::test]
async fn pending_submission_is_polled_to_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "record_id": "job-42",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/extract"))
        .and(query_param("record_id", "job-42"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(completed_markdown("# Polled result"))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config_for(&server)).expect("client");
    let source = FakeSource { pages: 3 };
    let out = tempfile::tempdir().expect("tempdir");

    let pass = extractor
        .run_pass(&source, "deck", OutputMode::Markdown, out.path(), false)
        .await
        .expect("pass succeeds");

    assert_eq!(pass.stats.ranges_succeeded, 1);
    let body = std::fs::read_to_string(out.path().join("deck_p1-3.md")).expect("artifact");
    assert_eq!(body, "# Polled result");
    // Merging disabled: no <stem>.md.
    assert!(pass.merged_path.is_none());
    assert!(!out.path().join("deck.md").exists());
}

#[tokio::test]
async fn poll_falls_back_to_path_style_queries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "record_id": "job-7",
        })))
        .mount(&server)
        .await;
    // This deployment only exposes the path-style status route; the
    // query-param style 404s.
    Mock::given(method("GET"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/extract/job-7"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(completed_markdown("# Fallback result"))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config_for(&server)).expect("client");
    let source = FakeSource { pages: 3 };
    let out = tempfile::tempdir().expect("tempdir");

    let pass = extractor
        .run_pass(&source, "deck", OutputMode::Markdown, out.path(), false)
        .await
        .expect("pass succeeds");

    assert_eq!(pass.stats.ranges_succeeded, 1);
    assert_eq!(pass.stats.ranges_failed, 0);
    let body = std::fs::read_to_string(out.path().join("deck_p1-3.md")).expect("artifact");
    assert_eq!(body, "# Fallback result");
}

#[tokio::test]
async fn transport_timeout_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    // The first submission stalls past the client timeout; the retry lands.
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(completed_markdown("# Stalled").set_delay(Duration::from_secs(3)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(completed_markdown("# Recovered"))
        .mount(&server)
        .await;

    let config = ExtractionConfig::builder()
        .api_url(format!("{}/extract", server.uri()))
        .api_key("test-key")
        .request_timeout_secs(1)
        .max_retries(2)
        .retry_backoff_secs(0)
        .default_chunk_size(10)
        .min_chunk_size(5)
        .build()
        .expect("valid test config");

    let extractor = Extractor::new(config).expect("client");
    let source = FakeSource { pages: 3 };
    let out = tempfile::tempdir().expect("tempdir");

    let pass = extractor
        .run_pass(&source, "flaky", OutputMode::Markdown, out.path(), false)
        .await
        .expect("pass succeeds");

    // The timeout was absorbed by the transport retry loop, never reaching
    // the shrink decision.
    assert_eq!(pass.stats.shrink_events, 0);
    assert_eq!(pass.stats.ranges_succeeded, 1);
    let body = std::fs::read_to_string(out.path().join("flaky_p1-3.md")).expect("artifact");
    assert_eq!(body, "# Recovered");
}

#[tokio::test]
async fn non_capacity_error_writes_marker_and_pass_continues() {
    let server = MockServer::start().await;

    // A 400 is not a capacity signal: no shrink, one error marker, and the
    // cursor advances to the next range.
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid document"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(completed_markdown("# Tail"))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config_for(&server)).expect("client");
    let source = FakeSource { pages: 12 };
    let out = tempfile::tempdir().expect("tempdir");

    let pass = extractor
        .run_pass(&source, "scan", OutputMode::Markdown, out.path(), true)
        .await
        .expect("pass succeeds");

    assert_eq!(pass.stats.shrink_events, 0);
    assert_eq!(pass.stats.final_chunk_size, 10);
    assert_eq!(pass.stats.ranges_failed, 1);
    assert_eq!(pass.stats.ranges_succeeded, 1);

    let marker = std::fs::read_to_string(out.path().join("scan_p1-10.error.txt"))
        .expect("error marker");
    assert!(marker.contains("400"), "marker should carry the status: {marker}");
    assert!(marker.contains("invalid document"));
    assert!(out.path().join("scan_p11-12.md").is_file());

    // Failed ranges stay out of the merge.
    let merged = std::fs::read_to_string(out.path().join("scan.md")).expect("merged file");
    assert_eq!(merged.matches(CHUNK_BOUNDARY_MARKER).count(), 1);
    assert!(merged.contains("# Tail"));
}

#[tokio::test]
async fn shrink_stops_at_floor_then_marks_range_failed() {
    let server = MockServer::start().await;

    // The service rejects everything: 10 → 5 (one shrink), then a second
    // capacity failure at the floor becomes an error marker.
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config_for(&server)).expect("client");
    let source = FakeSource { pages: 8 };
    let out = tempfile::tempdir().expect("tempdir");

    let pass = extractor
        .run_pass(&source, "doc", OutputMode::Markdown, out.path(), true)
        .await
        .expect("pass succeeds");

    assert_eq!(pass.stats.shrink_events, 1);
    assert_eq!(pass.stats.final_chunk_size, 5);
    assert_eq!(pass.stats.ranges_succeeded, 0);
    assert_eq!(pass.stats.ranges_failed, 2);
    assert!(out.path().join("doc_p1-5.error.txt").is_file());
    assert!(out.path().join("doc_p6-8.error.txt").is_file());
    // Nothing succeeded, so no merged file.
    assert!(pass.merged_path.is_none());
}

#[tokio::test]
async fn non_markdown_modes_persist_full_json_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "processing_status": "done",
            "tables": [{"rows": 3}],
        })))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config_for(&server)).expect("client");
    let source = FakeSource { pages: 4 };
    let out = tempfile::tempdir().expect("tempdir");

    let pass = extractor
        .run_pass(&source, "ledger", OutputMode::Tables, out.path(), false)
        .await
        .expect("pass succeeds");

    assert_eq!(pass.stats.ranges_succeeded, 1);
    let raw = std::fs::read_to_string(out.path().join("ledger_p1-4.json")).expect("artifact");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(parsed["processing_status"], "done");
    assert_eq!(parsed["tables"][0]["rows"], 3);
}

#[tokio::test]
async fn poll_timeout_at_floor_leaves_timeout_marker() {
    let server = MockServer::start().await;

    // Submissions always hand back a receipt, and the job never finishes.
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "record_id": "stuck-job",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "processing_status": "processing",
            "record_id": "stuck-job",
        })))
        .mount(&server)
        .await;

    let config = ExtractionConfig::builder()
        .api_url(format!("{}/extract", server.uri()))
        .api_key("test-key")
        .poll_interval_secs(1)
        .poll_deadline_secs(1)
        .default_chunk_size(5)
        .min_chunk_size(5)
        .build()
        .expect("valid test config");

    let extractor = Extractor::new(config).expect("client");
    let source = FakeSource { pages: 2 };
    let out = tempfile::tempdir().expect("tempdir");

    let pass = extractor
        .run_pass(&source, "stuck", OutputMode::Markdown, out.path(), true)
        .await
        .expect("pass succeeds");

    // Already at the floor, so the timeout cannot shrink; it must fail the
    // range instead of aborting the pass.
    assert_eq!(pass.stats.shrink_events, 0);
    assert_eq!(pass.stats.ranges_failed, 1);
    let marker =
        std::fs::read_to_string(out.path().join("stuck_p1-2.error.txt")).expect("error marker");
    assert!(marker.contains("timed out"), "marker: {marker}");
    assert!(marker.contains("stuck-job"));
}

#[tokio::test]
async fn extract_document_runs_one_pass_per_mode() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(completed_markdown("# Page content"))
        .mount(&server)
        .await;

    let extractor = Extractor::new(config_for(&server)).expect("client");
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("memo.pdf");
    std::fs::write(&input, build_pdf(3)).expect("write pdf");
    let out_root = dir.path().join("out");

    let outputs = extractor
        .extract_document(&input, &out_root, &[OutputMode::Markdown, OutputMode::Tables])
        .await
        .expect("extraction succeeds");

    assert_eq!(outputs.len(), 2);
    assert!(out_root.join("markdown/memo_p1-3.md").is_file());
    assert!(out_root.join("markdown/memo.md").is_file());
    assert!(out_root.join("tables/memo_p1-3.json").is_file());
    // Only the markdown pass merges.
    assert!(outputs[0].merged_path.is_some());
    assert!(outputs[1].merged_path.is_none());
}

/// Minimal n-page PDF assembled object by object.
fn build_pdf(pages: u32) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(lopdf::dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("serialise pdf");
    buf
}
