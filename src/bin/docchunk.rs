//! CLI binary for docchunk.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs the requested extraction passes, and prints
//! per-range progress.

use anyhow::{Context, Result};
use clap::Parser;
use docchunk::{
    ExtractionConfig, Extractor, OutputMode, PassOutput, PassProgressCallback, PassStats,
    PdfSource, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per pass, measured in pages, with
/// per-range log lines printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>4}/{len} pages  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl PassProgressCallback for CliProgressCallback {
    fn on_pass_start(&self, mode: OutputMode, total_pages: u32) {
        self.bar.reset();
        self.bar.set_length(u64::from(total_pages));
        self.bar.set_prefix(mode.to_string());
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {mode} ({total_pages} pages)…"))
        ));
    }

    fn on_range_start(&self, start: u32, end: u32) {
        self.bar.set_message(format!("pages {start}-{end}"));
    }

    fn on_range_complete(&self, start: u32, end: u32, artifact: &Path) {
        self.bar.println(format!(
            "  {} pages {:>4}-{:<4} → {}",
            green("✓"),
            start,
            end,
            dim(&artifact.display().to_string()),
        ));
        self.bar.inc(u64::from(end - start + 1));
    }

    fn on_range_error(&self, start: u32, end: u32, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            let prefix: String = error.chars().take(79).collect();
            format!("{prefix}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} pages {:>4}-{:<4}  {}",
            red("✗"),
            start,
            end,
            red(&msg),
        ));
        self.bar.inc(u64::from(end - start + 1));
    }

    fn on_shrink(&self, old_size: u32, new_size: u32) {
        self.bar.println(format!(
            "  {} capacity failure — shrinking chunk size {old_size} → {new_size}, retrying",
            yellow("↓"),
        ));
    }

    fn on_pass_complete(&self, mode: OutputMode, stats: &PassStats) {
        self.bar.finish_and_clear();
        if stats.ranges_failed == 0 {
            eprintln!(
                "{} {mode}: {} ranges in {}ms",
                green("✔"),
                stats.ranges_succeeded,
                stats.duration_ms
            );
        } else {
            eprintln!(
                "{} {mode}: {}/{} ranges ok  ({} failed — see *.error.txt)",
                yellow("⚠"),
                stats.ranges_succeeded,
                stats.ranges_succeeded + stats.ranges_failed,
                red(&stats.ranges_failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run all four extraction modes
  docchunk annual_report.pdf

  # Markdown only, into a custom directory
  docchunk --modes markdown -o extracted annual_report.pdf

  # Larger documents: start smaller so the first 413 never happens
  docchunk --chunk-size 5 --min-chunk-size 2 huge_scan.pdf

  # Check page count and size before submitting anything (no API key needed)
  docchunk --inspect-only annual_report.pdf

  # Machine-readable pass summary
  docchunk --json --quiet annual_report.pdf > summary.json

OUTPUT LAYOUT:
  <output>/markdown/<stem>_p<start>-<end>.md     per-range markdown
  <output>/markdown/<stem>.md                    merged markdown
  <output>/boxes/<stem>_p<start>-<end>.json      bounding boxes
  <output>/tables/<stem>_p<start>-<end>.json     tables
  <output>/hierarchy/<stem>_p<start>-<end>.json  hierarchy
  <output>/<mode>/<stem>_p<start>-<end>.error.txt  failed ranges

ADAPTIVE CHUNKING:
  Chunks start at --chunk-size pages. On a capacity error (HTTP 408/413/429/
  5xx or a timeout message) the size is halved — floored at --min-chunk-size —
  and the same page range is retried. The size never grows back within a run.

ENVIRONMENT VARIABLES:
  DOCCHUNK_API_KEY   Bearer token for the extraction service
  DOCCHUNK_API_URL   Override the extraction endpoint
  DOCCHUNK_OUTPUT    Default output directory
"#;

/// Submit large PDFs to a remote extraction service in adaptive page chunks.
#[derive(Parser, Debug)]
#[command(
    name = "docchunk",
    version,
    about = "Submit large PDFs to a remote extraction service in adaptive page chunks",
    long_about = "Split a PDF into contiguous page ranges, submit each range to a remote \
extraction service (markdown, bounding boxes, tables, hierarchy), poll pending jobs to \
completion, and shrink the chunk size automatically when the service rejects a payload \
as too large or too slow.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the PDF document.
    input: PathBuf,

    /// Root output directory (one subdirectory per mode).
    #[arg(short, long, env = "DOCCHUNK_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Extraction service endpoint.
    #[arg(
        long,
        env = "DOCCHUNK_API_URL",
        default_value = "https://extraction-api.nanonets.com/extract"
    )]
    api_url: String,

    /// Bearer token for the extraction service.
    #[arg(long, env = "DOCCHUNK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Comma-separated modes: markdown, boxes, tables, hierarchy.
    #[arg(long, value_delimiter = ',', default_value = "markdown,boxes,tables,hierarchy")]
    modes: Vec<String>,

    /// Pages per chunk at the start of each pass.
    #[arg(long, env = "DOCCHUNK_CHUNK_SIZE", default_value_t = 10)]
    chunk_size: u32,

    /// Floor for automatic chunk shrinking.
    #[arg(long, env = "DOCCHUNK_MIN_CHUNK_SIZE", default_value_t = 5)]
    min_chunk_size: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 300)]
    request_timeout: u64,

    /// Seconds between job-status polls.
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,

    /// Polling deadline per chunk in seconds.
    #[arg(long, default_value_t = 240)]
    poll_deadline: u64,

    /// Submission attempts before a transport failure is escalated.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Backoff base in seconds (attempt n waits base × n).
    #[arg(long, default_value_t = 2)]
    retry_backoff: u64,

    /// Skip writing the merged markdown file.
    #[arg(long)]
    no_merge: bool,

    /// Print document diagnostics only; no submission, no API key needed.
    #[arg(long)]
    inspect_only: bool,

    /// Emit a JSON summary (pass records and stats) on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOCCHUNK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCCHUNK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCCHUNK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides the per-range feedback; suppress INFO-level
    // library logs while it is active so the two don't interleave.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let source = PdfSource::open(&cli.input).context("Failed to open PDF")?;
        let info = source.inspect();

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise diagnostics")?
            );
        } else {
            println!("File:       {}", cli.input.display());
            if let Some(size) = info.file_size {
                println!("Size:       {}", human_size(size));
            }
            println!("Pages:      {}", info.page_count);
            println!("Encrypted:  {}", if info.encrypted { "yes" } else { "no" });
            for dims in &info.sample_pages {
                println!(
                    "  - page {}: {:.1} × {:.1} points",
                    dims.page, dims.width, dims.height
                );
            }
            if info.file_size.is_some_and(|s| s > 80 * 1024 * 1024) {
                println!("Note: file exceeds 80 MB — chunked submission is essential.");
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let modes = parse_modes(&cli.modes)?;
    let api_key = cli
        .api_key
        .clone()
        .context("No API key. Set DOCCHUNK_API_KEY or pass --api-key.")?;

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PassProgressCallback>)
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .api_url(&cli.api_url)
        .api_key(api_key)
        .request_timeout_secs(cli.request_timeout)
        .poll_interval_secs(cli.poll_interval)
        .poll_deadline_secs(cli.poll_deadline)
        .max_retries(cli.max_retries)
        .retry_backoff_secs(cli.retry_backoff)
        .default_chunk_size(cli.chunk_size)
        .min_chunk_size(cli.min_chunk_size);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run passes ───────────────────────────────────────────────────────
    let extractor = Extractor::new(config).context("Failed to initialise extractor")?;
    let source = PdfSource::open(&cli.input).context("Failed to open PDF")?;
    let stem = source.stem().to_string();

    let mut outputs: Vec<PassOutput> = Vec::with_capacity(modes.len());
    for mode in modes {
        let out_dir = cli.output.join(mode.dir_name());
        let merge = mode == OutputMode::Markdown && !cli.no_merge;
        let pass = extractor
            .run_pass(&source, &stem, mode, &out_dir, merge)
            .await
            .with_context(|| format!("Extraction pass '{mode}' failed"))?;
        outputs.push(pass);
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outputs).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        let failed: usize = outputs.iter().map(|p| p.stats.ranges_failed).sum();
        if failed == 0 {
            eprintln!(
                "{} All modes extracted. Artifacts under {}",
                green("✔"),
                bold(&cli.output.display().to_string())
            );
        } else {
            eprintln!(
                "{} Done with {} failed range(s). Check *.error.txt under {}",
                yellow("⚠"),
                failed,
                cli.output.display()
            );
        }
    }

    Ok(())
}

/// Parse `--modes` strings into `OutputMode`s, preserving order and
/// dropping duplicates.
fn parse_modes(raw: &[String]) -> Result<Vec<OutputMode>> {
    let mut modes = Vec::new();
    for s in raw {
        let mode: OutputMode = s
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid --modes entry '{s}'"))?;
        if !modes.contains(&mode) {
            modes.push(mode);
        }
    }
    anyhow::ensure!(!modes.is_empty(), "No extraction modes selected");
    Ok(modes)
}

/// Bytes → human-readable size.
fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}
