//! CLI binary for pdf-cleaner.
//!
//! A thin shim over the library crate that loads the TOML config, maps CLI
//! flags over it and prints progress, preview summaries and results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_cleaner::pipeline::{pdf, report};
use pdf_cleaner::{
    clean_directory, clean_files, BatchReport, CleaningConfig, CleaningProgressCallback,
    CleaningStep, PreviewReport, ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

/// Terminal progress: one bar per document, advanced step by step, with
/// per-document result lines and the preview summary printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(show_bar: bool) -> Arc<Self> {
        let bar = if show_bar {
            let bar = ProgressBar::new(CleaningStep::COUNT as u64);
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos}/{len} steps  {msg}  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        } else {
            ProgressBar::hidden()
        };
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn print(&self, line: String) {
        if self.bar.is_hidden() {
            eprintln!("{line}");
        } else {
            self.bar.println(line);
        }
    }
}

impl CleaningProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.print(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Cleaning {total_files} PDF file(s)…"))
        ));
    }

    fn on_document_start(&self, index: usize, total: usize, file_name: &str) {
        self.bar.reset();
        self.bar.set_prefix(format!("{index}/{total} {file_name}"));
    }

    fn on_step(&self, _file_name: &str, step: CleaningStep) {
        self.bar.set_message(step.label());
        self.bar.inc(1);
    }

    fn on_preview(&self, file_name: &str, report: &PreviewReport) {
        self.print(format!("\n{}", bold(&format!("Preview: {file_name}"))));
        for line in report::render_summary(report).lines() {
            self.print(line.to_string());
        }
    }

    fn on_document_complete(&self, index: usize, total: usize, file_name: &str) {
        self.print(format!(
            "  {} {:>3}/{:<3} {}  {}",
            green("✓"),
            index,
            total,
            file_name,
            dim(&format!("{:.1}s", self.bar.elapsed().as_secs_f64()))
        ));
    }

    fn on_document_error(&self, index: usize, total: usize, file_name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let first_line = error.lines().next().unwrap_or(error);
        self.print(format!(
            "  {} {:>3}/{:<3} {}  {}",
            red("✗"),
            index,
            total,
            file_name,
            red(first_line)
        ));
    }

    fn on_batch_complete(&self, total_files: usize, processed: usize) {
        self.bar.finish_and_clear();
        let failed = total_files.saturating_sub(processed);
        if failed == 0 {
            eprintln!(
                "{} {} file(s) processed successfully",
                green("✔"),
                bold(&processed.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} file(s) processed  ({} failed)",
                if processed == 0 { red("✘") } else { cyan("⚠") },
                bold(&processed.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Preview what would be removed from every PDF in ./context
  pdfclean --preview

  # Clean every PDF in ./context into ./output
  pdfclean

  # One file, stricter detection, no OCR pass
  pdfclean --file context/annual_report.pdf --threshold 0.9 --no-ocr

  # Use a config file and print the combined report
  pdfclean --config cleaning.toml --json > report.json

OUTPUTS (per document, in --output-dir):
  {stem}_raw.pdf              backup of the input
  {stem}_ocr.pdf              ocrmypdf text layer
  {stem}_cleaned.pdf          headers, footers and decorative images covered
  {stem}_cleaned.txt          filtered, normalised text
  {stem}_chunk_simulation.txt retrieval chunk preview
  {stem}_structured.md        Markdown with font-size headings

REPORTS (in --report-dir):
  {stem}_preview.json         detection, image analysis, samples, recommendations
  cleaning_report.json        combined batch report

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  RUST_LOG            Overrides --verbose / --quiet log filtering
  PDFCLEAN_*          Every flag can be set from the environment

EXTERNAL TOOLS:
  ocrmypdf   pip install ocrmypdf   (optional; OCR step is skipped on failure)
  tesseract  apt install tesseract-ocr tesseract-ocr-ara
"#;

/// Clean bilingual Arabic/English PDFs for search ingestion.
#[derive(Parser, Debug)]
#[command(
    name = "pdfclean",
    version,
    about = "Remove repeated headers, footers and decorative images from PDFs",
    long_about = "Detect running headers and footers with three competing algorithms, classify \
every embedded image while protecting tables, cover what should go with white overlays, and \
write direction-aware text, chunk previews and structured Markdown. Run with --preview first \
to see what would be removed.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// TOML configuration file. Flags override its values.
    #[arg(short, long, env = "PDFCLEAN_CONFIG")]
    config: Option<PathBuf>,

    /// Analyse and report only; no cleaned PDF is written.
    #[arg(long, env = "PDFCLEAN_PREVIEW")]
    preview: bool,

    /// Clean a single file instead of the whole input directory.
    #[arg(short, long, env = "PDFCLEAN_FILE")]
    file: Option<PathBuf>,

    /// Directory scanned for *.pdf.
    #[arg(long, env = "PDFCLEAN_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory for PDF versions and text outputs.
    #[arg(short, long, env = "PDFCLEAN_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for JSON reports.
    #[arg(long, env = "PDFCLEAN_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Header/footer detection threshold (0.0–1.0).
    #[arg(long, env = "PDFCLEAN_THRESHOLD")]
    threshold: Option<f64>,

    /// Pages sampled from each end of the document.
    #[arg(long, env = "PDFCLEAN_SAMPLE_PAGES")]
    sample_pages: Option<usize>,

    /// Skip the ocrmypdf pass.
    #[arg(long, env = "PDFCLEAN_NO_OCR")]
    no_ocr: bool,

    /// Print the combined report as JSON on stdout.
    #[arg(long, env = "PDFCLEAN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFCLEAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCLEAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFCLEAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    // ── Ensure PDFium engine is available ────────────────────────────────
    drop(pdf::bind_pdfium().context("PDF engine unavailable")?);

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        let cb = CliProgressCallback::new(show_progress);
        Some(cb as Arc<dyn CleaningProgressCallback>)
    };
    let config = build_config(&cli, progress_cb)?;
    let preview_mode = config.preview.preview_only;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = match &cli.file {
        Some(file) => clean_files(vec![file.clone()], &config).await,
        None => clean_directory(&config).await,
    }
    .context("Cleaning failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&report, &config);
        if preview_mode {
            print_next_steps(&config);
        }
    }

    if report.processed == 0 {
        anyhow::bail!("No file could be processed ({} failed)", report.failures.len());
    }
    Ok(())
}

/// Load the config file (or defaults) and apply CLI overrides.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<CleaningConfig> {
    let mut config = match &cli.config {
        Some(path) => CleaningConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => CleaningConfig::default(),
    };

    if cli.preview {
        config.preview.preview_only = true;
    }
    if cli.no_ocr {
        config.ocr.enabled = false;
    }
    if let Some(dir) = &cli.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &cli.report_dir {
        config.report_dir = dir.clone();
    }
    if let Some(t) = cli.threshold {
        config.detection.detection_threshold = t;
    }
    if let Some(n) = cli.sample_pages {
        config.detection.sample_pages = n;
    }
    config.progress_callback = progress;

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_summary(report: &BatchReport, config: &CleaningConfig) {
    for (name, doc) in &report.files {
        eprintln!(
            "{}  {}  {} spans, {} images covered  {}",
            bold(name),
            dim(&format!("{:?}", doc.status)),
            doc.redaction.text_spans,
            doc.redaction.images,
            dim(&format!("{:.2}s", doc.duration_seconds)),
        );
    }
    for failure in &report.failures {
        eprintln!("{}  {}", red(&failure.file_name), failure.error);
    }
    eprintln!(
        "Report: {}",
        bold(
            &config
                .report_dir
                .join(pdf_cleaner::clean::BATCH_REPORT_FILE)
                .display()
                .to_string()
        )
    );
}

fn print_next_steps(config: &CleaningConfig) {
    eprintln!();
    eprintln!("{}", bold("Next steps:"));
    eprintln!(
        "  1. Review the preview reports in {}",
        config.report_dir.display()
    );
    eprintln!("  2. Adjust detection_threshold or area_threshold in the config if needed");
    eprintln!("  3. Run again without --preview to write the cleaned files");
}
