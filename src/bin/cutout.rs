//! CLI binary for cutout.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `MattingConfig`, builds a segmentation provider and writes the archive.

use anyhow::{Context, Result};
use clap::Parser;
use cutout::{
    ArchiveCompression, BatchPackager, BatchProgressCallback, InputImage, MattingConfig,
    MattingStrategy, ProgressCallback, ResolutionTier, SegmentationProvider,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a percentage bar plus one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Removing backgrounds");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            fallbacks: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_items} image(s)…"))
        ));
    }

    fn on_item_start(&self, index: usize, _total: usize, name: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_item_complete(&self, index: usize, total: usize, strategy: MattingStrategy) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        let marker = match strategy {
            MattingStrategy::Segmentation => green("✓"),
            MattingStrategy::ColourTolerance => {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
                yellow("~")
            }
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<18}  {}",
            marker,
            index,
            total,
            dim(&strategy.to_string()),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_batch_complete(&self, total_items: usize, archive_entries: usize) {
        self.bar.finish_and_clear();
        let fallbacks = self.fallbacks.load(Ordering::SeqCst);
        if fallbacks == 0 {
            eprintln!(
                "{} {}/{} images matted",
                green("✔"),
                bold(&archive_entries.to_string()),
                total_items
            );
        } else {
            eprintln!(
                "{} {}/{} images matted  ({} via colour tolerance)",
                cyan("⚠"),
                bold(&archive_entries.to_string()),
                total_items,
                yellow(&fallbacks.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Colour-tolerance matting only (no model)
  cutout logo.png banner.jpg

  # Person segmentation with a local ONNX model
  cutout --model models/portrait.onnx *.jpg -o people.zip

  # Download the model once, keep more of the subject's fringe
  cutout --model https://example.com/portrait.onnx --threshold 0.5 photo.jpg

  # Machine-readable statistics
  cutout --json --no-progress shots/*.png > stats.json

OUTPUT:
  Every input becomes <stem>_transparent.png inside the archive, in input
  order. Repeated stems are numbered: photo_2_transparent.png, …
  Numbers never take a name another input would get on its own, so a real
  photo_2.jpg always keeps photo_2_transparent.png.
  A file that cannot be decoded aborts the whole batch; no archive is written.

ENVIRONMENT VARIABLES:
  CUTOUT_MODEL             Segmentation model path or URL (same as --model)
  CUTOUT_MODEL_PATH        Path to an existing model file; skips download
  CUTOUT_MODEL_CACHE_DIR   Override the default model cache directory
  RUST_LOG                 Override the log filter (e.g. cutout=debug)
"#;

/// Remove image backgrounds and package the results as a ZIP archive.
#[derive(Parser, Debug)]
#[command(
    name = "cutout",
    version,
    about = "Remove image backgrounds and package the results as a ZIP archive",
    long_about = "Remove the background from a batch of images. Each image is segmented by a \
person-segmentation model when one is configured; otherwise, or when the model fails, pixels \
close to the top-left colour are made transparent. Results are written as transparent PNGs \
into a single ZIP archive.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files to process, in archive order.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Archive to write.
    #[arg(short, long, env = "CUTOUT_OUTPUT", default_value = "transparent_images.zip")]
    output: PathBuf,

    /// Segmentation model: local .onnx path or HTTP(S) URL.
    #[arg(
        long,
        env = "CUTOUT_MODEL",
        long_help = "Segmentation model as a local .onnx path or an HTTP/HTTPS URL.\n\
          URLs are downloaded once and cached. Requires the `onnx` feature; without it\n\
          every image is matted with the colour-tolerance fallback."
    )]
    model: Option<String>,

    /// Foreground probability threshold (0.0–1.0).
    #[arg(long, env = "CUTOUT_THRESHOLD", default_value_t = 0.7)]
    threshold: f32,

    /// Model working resolution: low, medium, high, full.
    #[arg(long, env = "CUTOUT_RESOLUTION", value_enum, default_value = "medium")]
    resolution: ResolutionArg,

    /// Per-channel colour distance treated as background by the fallback.
    #[arg(long, env = "CUTOUT_TOLERANCE", default_value_t = 30)]
    tolerance: u8,

    /// Deflate archive entries instead of storing them.
    #[arg(long, env = "CUTOUT_DEFLATE")]
    deflate: bool,

    /// Print batch statistics as JSON on stdout.
    #[arg(long, env = "CUTOUT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CUTOUT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CUTOUT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CUTOUT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ResolutionArg {
    Low,
    Medium,
    High,
    Full,
}

impl From<ResolutionArg> for ResolutionTier {
    fn from(v: ResolutionArg) -> Self {
        match v {
            ResolutionArg::Low => ResolutionTier::Low,
            ResolutionArg::Medium => ResolutionTier::Medium,
            ResolutionArg::High => ResolutionTier::High,
            ResolutionArg::Full => ResolutionTier::Full,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
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

    // ── Segmentation provider ────────────────────────────────────────────
    let provider = Arc::new(build_provider(&cli)?);

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Read inputs ──────────────────────────────────────────────────────
    let inputs = InputImage::from_paths(&cli.inputs)
        .await
        .context("Failed to read input images")?;

    // ── Run batch ────────────────────────────────────────────────────────
    let packager = BatchPackager::new(Arc::clone(&provider), config);
    let stats = tokio::select! {
        result = packager.package_to_file(&inputs, &cli.output) => {
            result.context("Background removal failed")?
        }
        _ = tokio::signal::ctrl_c() => {
            provider.shutdown();
            anyhow::bail!("Interrupted; no archive written");
        }
    };

    let Some(stats) = stats else {
        anyhow::bail!("No images to process");
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise statistics")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} images ({} segmented, {} fallback)  {}  {}ms  →  {}",
            if stats.fallback_items == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.total_items,
            stats.segmented_items,
            stats.fallback_items,
            dim(&format!("{} bytes", stats.archive_bytes)),
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `MattingConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<MattingConfig> {
    let compression = if cli.deflate {
        ArchiveCompression::Deflated
    } else {
        ArchiveCompression::Stored
    };

    let mut builder = MattingConfig::builder()
        .segmentation_threshold(cli.threshold)
        .internal_resolution(cli.resolution.clone().into())
        .colour_tolerance(cli.tolerance)
        .archive_compression(compression);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(feature = "onnx")]
fn build_provider(cli: &Cli) -> Result<SegmentationProvider> {
    use cutout::pipeline::onnx::OnnxBackend;

    let Some(ref source) = cli.model else {
        return Ok(SegmentationProvider::unavailable("no --model given"));
    };

    // Fetch the model up front so the download gets its own progress bar.
    // A failed download is not fatal: the provider remembers the failure
    // and every image falls back to colour tolerance.
    let resolved = if model_cache::cached_model_path(source).is_none() && !cli.quiet {
        let dl_bar = ProgressBar::new(0);
        dl_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        dl_bar.set_prefix("Model");
        dl_bar.enable_steady_tick(Duration::from_millis(80));

        let bar = dl_bar.clone();
        let result = tokio::task::block_in_place(|| {
            model_cache::ensure_model(
                source,
                Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length().unwrap_or(0) != t {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }),
            )
        });
        dl_bar.finish_and_clear();
        result
    } else {
        tokio::task::block_in_place(|| model_cache::ensure_model(source, None))
    };

    match resolved {
        Ok(path) => Ok(SegmentationProvider::new(Arc::new(OnnxBackend::new(
            path.to_string_lossy().into_owned(),
        )))),
        Err(e) => {
            tracing::warn!("{e}; images will use colour tolerance");
            Ok(SegmentationProvider::unavailable(e.to_string()))
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn build_provider(cli: &Cli) -> Result<SegmentationProvider> {
    if cli.model.is_some() {
        tracing::warn!("--model ignored: built without the `onnx` feature");
        if !cli.quiet {
            eprintln!(
                "{} --model needs the `onnx` feature; using colour tolerance for every image",
                yellow("⚠")
            );
        }
    }
    Ok(SegmentationProvider::unavailable(
        "segmentation support not compiled in",
    ))
}
