//! CLI binary for superres-client.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `EnhanceConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use superres_client::{
    diagnose_system, enhance_stream, load_asset, validate, validate_dimensions, BatchItem,
    EnhanceConfig, EnhanceError, EnhanceOptions, EnhanceProgressCallback, EnhancementOutcome,
    Enhancer, ErrorLog, ImageAsset, ProgressCallback, RetryContext, ValidationOptions,
};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all inputs plus a log line per
/// finished image. Events from concurrent calls are keyed by asset name.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:32.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Enhancing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, name: &str) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(name))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let total = self.bar.length().unwrap_or(0) as usize;
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} image(s) enhanced", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} image(s) enhanced  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl EnhanceProgressCallback for CliProgressCallback {
    fn on_validated(&self, name: &str, _size_bytes: u64) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(name.to_string(), Instant::now());
        }
    }

    fn on_attempt_start(&self, name: &str, ctx: RetryContext) {
        if ctx.attempt > 1 {
            self.bar
                .set_message(format!("{name}: attempt {}/{}", ctx.attempt, ctx.max_attempts));
        } else {
            self.bar.set_message(format!("{name}: uploading"));
        }
    }

    fn on_poll(&self, name: &str, _task_id: &str, attempt: u32, max_attempts: u32) {
        self.bar
            .set_message(format!("{name}: processing ({}/{})", attempt + 1, max_attempts));
    }

    fn on_attempt_failed(&self, name: &str, ctx: RetryContext, error: &EnhanceError) {
        if !ctx.is_last() {
            self.bar.println(format!(
                "  {} {}  {}",
                yellow("↻"),
                name,
                dim(&format!("attempt {} failed: {}", ctx.attempt, error)),
            ));
        }
    }

    fn on_fallback(&self, name: &str, _error: &EnhanceError) {
        self.bar.println(format!(
            "  {} {}  {}",
            yellow("⚠"),
            name,
            yellow("enhancement failed, using original image")
        ));
    }

    fn on_complete(&self, name: &str, outcome: &EnhancementOutcome) {
        let elapsed = self.elapsed(name);
        self.bar.println(format!(
            "  {} {:<24}  {:<12}  {}",
            green("✓"),
            name,
            dim(&format!("{}x{}", outcome.width, outcome.height)),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_error(&self, name: &str, error: &EnhanceError) {
        let elapsed = self.elapsed(name);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = error.to_string();
        let msg = match msg.char_indices().nth(79) {
            Some((i, _)) => format!("{}\u{2026}", &msg[..i]),
            None => msg,
        };
        self.bar.println(format!(
            "  {} {:<24}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            elapsed,
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Enhance one image, print the result URL
  superres photo.jpg

  # Download the enhanced image to a file
  superres photo.jpg -o photo_hd.jpg

  # Several images into a directory, 2 at a time
  superres a.png b.png c.webp -o enhanced/ --concurrency 2

  # Enhance an image straight from a URL
  superres https://example.com/cat.png -o cat_hd.png

  # Keep the original when the service is unavailable
  superres --fallback photo.jpg -o photo_hd.jpg

  # Check files against the upload limits without uploading
  superres --validate-only --check-dimensions *.png

  # Machine-readable output
  superres --json photo.jpg

  # Host diagnostics and recent errors
  superres --diagnose
  superres --show-errors --error-log ~/.cache/superres/errors.json

LIMITS:
  Formats      jpg, jpeg, png, bmp, webp, gif
  Size         20 MB (--max-size-mb)
  Dimensions   50–5000 px per side (--check-dimensions)

ENVIRONMENT VARIABLES:
  SUPERRES_API_KEY    API key sent as X-API-KEY
  SUPERRES_BASE_URL   Service root (default https://techhk.aoscdn.com)
  RUST_LOG            Override log filter (e.g. superres_client=debug)
"#;

/// Upscale images with a remote super-resolution service.
#[derive(Parser, Debug)]
#[command(
    name = "superres",
    version,
    about = "Upscale images with a remote super-resolution service",
    long_about = "Upload images (local files or URLs) to a remote super-resolution service, \
wait for the enhanced result, and print or download it. Inputs are validated locally first; \
failed attempts are retried and can fall back to the original image.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present_any = ["diagnose", "show_errors"])]
    inputs: Vec<String>,

    /// Output file (one input) or directory (several inputs).
    #[arg(short, long, env = "SUPERRES_OUTPUT")]
    output: Option<PathBuf>,

    /// API key for the enhancement service.
    #[arg(long, env = "SUPERRES_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Service root URL.
    #[arg(long, env = "SUPERRES_BASE_URL")]
    base_url: Option<String>,

    /// Wall-clock budget per upload-and-poll attempt, in milliseconds.
    #[arg(long, env = "SUPERRES_TIMEOUT_MS", default_value_t = 60_000)]
    timeout_ms: u64,

    /// Timeout for downloading URL inputs and result images, in seconds.
    #[arg(
        long,
        env = "SUPERRES_DOWNLOAD_TIMEOUT_SECS",
        default_value_t = EnhanceConfig::default().download_timeout_secs
    )]
    download_timeout_secs: u64,

    /// Extra attempts after the first failure.
    #[arg(long, env = "SUPERRES_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Status checks allowed after the first one.
    #[arg(long, env = "SUPERRES_POLL_ATTEMPTS", default_value_t = 15)]
    poll_attempts: u32,

    /// Pause between status checks, in milliseconds.
    #[arg(long, env = "SUPERRES_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Largest accepted file, in megabytes.
    #[arg(long, env = "SUPERRES_MAX_SIZE_MB", default_value_t = 20.0)]
    max_size_mb: f64,

    /// Accepted extensions, comma separated.
    #[arg(long, env = "SUPERRES_FORMATS", value_delimiter = ',')]
    formats: Vec<String>,

    /// Reject images outside 50–5000 px per side before uploading.
    #[arg(long, env = "SUPERRES_CHECK_DIMENSIONS")]
    check_dimensions: bool,

    /// Return the original image when every attempt fails.
    #[arg(long, env = "SUPERRES_FALLBACK")]
    fallback: bool,

    /// Images processed concurrently.
    #[arg(short, long, env = "SUPERRES_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Rolling JSON log of the last 20 errors.
    #[arg(long, env = "SUPERRES_ERROR_LOG")]
    error_log: Option<PathBuf>,

    /// Output structured JSON instead of text.
    #[arg(long, env = "SUPERRES_JSON")]
    json: bool,

    /// Only run local validation; nothing is uploaded.
    #[arg(long)]
    validate_only: bool,

    /// Print host diagnostics and exit.
    #[arg(long)]
    diagnose: bool,

    /// Print the error log and exit (requires --error-log).
    #[arg(long, requires = "error_log")]
    show_errors: bool,

    /// Disable progress bar.
    #[arg(long, env = "SUPERRES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SUPERRES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SUPERRES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.validate_only;
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

    // ── Maintenance modes ────────────────────────────────────────────────
    if cli.diagnose {
        return print_diagnostics(cli.json).await;
    }
    if cli.show_errors {
        return match cli.error_log {
            Some(ref path) => print_error_log(path, cli.json).await,
            None => anyhow::bail!("--show-errors needs --error-log"),
        };
    }

    // ── Load inputs ──────────────────────────────────────────────────────
    let download_timeout = Duration::from_secs(cli.download_timeout_secs.max(1));
    let mut assets = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let asset = load_asset(input, download_timeout)
            .await
            .with_context(|| format!("Failed to load {input}"))?;
        assets.push(asset);
    }

    if cli.validate_only {
        return validate_inputs(&cli, &assets).await;
    }

    // ── Build enhancer ───────────────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new(assets.len()))
    } else {
        None
    };
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|p| p as Arc<dyn EnhanceProgressCallback>),
    )?;
    let enhancer = Enhancer::from_config(config).context("Failed to set up the enhancement service")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let options = EnhanceOptions::default();
    let items = match cli.output {
        Some(ref output) if assets.len() == 1 => {
            let asset = &assets[0];
            let result = enhancer.enhance_to_file(asset, output, &options).await;
            vec![BatchItem {
                index: 0,
                name: asset.name().to_string(),
                result,
            }]
        }
        Some(ref dir) => enhance_into_dir(&enhancer, assets, dir, &options).await?,
        None => {
            let mut items: Vec<BatchItem> = enhance_stream(&enhancer, assets, options).collect().await;
            items.sort_by_key(|i| i.index);
            items
        }
    };

    if let Some(ref p) = progress {
        p.finish();
    }
    report(&cli, &items)
}

/// Map CLI args to `EnhanceConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<EnhanceConfig> {
    let mut builder = EnhanceConfig::builder()
        .timeout_ms(cli.timeout_ms)
        .download_timeout_secs(cli.download_timeout_secs)
        .max_retries(cli.max_retries)
        .poll_max_attempts(cli.poll_attempts)
        .poll_interval_ms(cli.poll_interval_ms)
        .max_size_mb(cli.max_size_mb)
        .check_dimensions(cli.check_dimensions)
        .enable_fallback(cli.fallback)
        .concurrency(cli.concurrency)
        .run_diagnostics(cli.verbose);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if !cli.formats.is_empty() {
        builder = builder.formats(cli.formats.iter().cloned());
    }
    if let Some(ref path) = cli.error_log {
        builder = builder.error_log_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Enhance several assets, writing each result into `dir`.
async fn enhance_into_dir(
    enhancer: &Enhancer,
    assets: Vec<ImageAsset>,
    dir: &Path,
    options: &EnhanceOptions,
) -> Result<Vec<BatchItem>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let concurrency = enhancer.config().concurrency;
    let mut items: Vec<BatchItem> = stream::iter(assets.into_iter().enumerate().map(
        |(index, asset)| async move {
            let target = dir.join(output_name(asset.name(), index));
            let result = enhancer.enhance_to_file(&asset, &target, options).await;
            BatchItem {
                index,
                name: asset.name().to_string(),
                result,
            }
        },
    ))
    .buffer_unordered(concurrency)
    .collect()
    .await;
    items.sort_by_key(|i| i.index);
    Ok(items)
}

/// `photo.jpg` → `photo_enhanced.jpg`.
fn output_name(name: &str, index: usize) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("image_{index}"));
    match path.extension() {
        Some(ext) => format!("{stem}_enhanced.{}", ext.to_string_lossy()),
        None => format!("{stem}_enhanced"),
    }
}

/// Print results; fail the process when any image failed.
fn report(cli: &Cli, items: &[BatchItem]) -> Result<()> {
    let failed = items.iter().filter(|i| !i.is_ok()).count();

    if cli.json {
        let values: Vec<_> = items.iter().map(item_json).collect();
        let out = if values.len() == 1 {
            values.into_iter().next().unwrap_or_default()
        } else {
            serde_json::Value::Array(values)
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialise output")?
        );
    } else {
        for item in items {
            match &item.result {
                Ok(out) if cli.output.is_some() => {
                    if !cli.quiet && cli.no_progress {
                        eprintln!("{} {}  {}x{}", green("✓"), item.name, out.width, out.height);
                    }
                }
                Ok(out) if out.degraded => println!("{}\t{}", item.name, dim("(original image)")),
                Ok(out) => println!("{}\t{}", item.name, out.image_url),
                Err(e) => {
                    eprintln!("{} {}: [{}] {}", red("✗"), item.name, e.kind, e);
                    if cli.verbose {
                        if let Some(detail) = e.detail() {
                            eprintln!("    {}", dim(&detail));
                        }
                    }
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} image(s) failed", items.len());
    }
    Ok(())
}

fn item_json(item: &BatchItem) -> serde_json::Value {
    match &item.result {
        Ok(out) => json!({ "name": item.name, "ok": true, "outcome": out }),
        Err(e) => json!({
            "name": item.name,
            "ok": false,
            "error": { "kind": e.kind, "message": e.message, "status": e.status, "detail": e.detail() },
        }),
    }
}

async fn validate_inputs(cli: &Cli, assets: &[ImageAsset]) -> Result<()> {
    let mut options = ValidationOptions {
        max_size_mb: cli.max_size_mb,
        ..ValidationOptions::default()
    };
    if !cli.formats.is_empty() {
        options.formats = cli.formats.iter().map(|f| f.trim().to_lowercase()).collect();
    }

    let mut invalid = 0;
    let mut reports = Vec::with_capacity(assets.len());
    for asset in assets {
        let mut result = validate(Some(asset), &options);
        if result.valid && cli.check_dimensions {
            result = validate_dimensions(asset).await;
        }
        if !result.valid {
            invalid += 1;
        }
        if cli.json {
            reports.push(json!({ "name": asset.name(), "valid": result.valid, "errors": result.errors }));
        } else if result.valid {
            println!("{} {}", green("✓"), asset.name());
        } else {
            println!("{} {}", red("✗"), asset.name());
            for e in &result.errors {
                println!("    {e}");
            }
        }
    }
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise output")?
        );
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} file(s) failed validation", assets.len());
    }
    Ok(())
}

async fn print_diagnostics(as_json: bool) -> Result<()> {
    let diag = diagnose_system().await;
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&diag).context("Failed to serialise diagnostics")?
        );
        return Ok(());
    }
    println!("Memory:       {} MB available / {} MB total", diag.available_memory_mb, diag.total_memory_mb);
    match diag.temp_space_mb {
        Some(mb) => println!("Temp space:   {mb} MB free"),
        None => println!("Temp space:   unknown"),
    }
    println!("GPU:          {}", if diag.gpu_detected { "detected" } else { "not detected" });
    if diag.is_healthy() {
        println!("{} no issues found", green("✔"));
    } else {
        for issue in &diag.issues {
            println!("{} {}", yellow("⚠"), issue);
        }
    }
    Ok(())
}

async fn print_error_log(path: &Path, as_json: bool) -> Result<()> {
    let entries = ErrorLog::open(path)
        .entries()
        .await
        .with_context(|| format!("Failed to read error log {}", path.display()))?;
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Failed to serialise error log")?
        );
        return Ok(());
    }
    if entries.is_empty() {
        println!("No errors recorded.");
    }
    for entry in &entries {
        println!(
            "{}  {:<10}  {}",
            dim(&entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            entry.kind,
            entry.message
        );
        if let Some(ref detail) = entry.detail {
            println!("    {}", dim(detail));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_timeout_defaults_to_library_value() {
        let cli = Cli::try_parse_from(["superres", "a.png"]).unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(
            config.download_timeout_secs,
            EnhanceConfig::default().download_timeout_secs
        );
        assert_eq!(
            config.download_timeout(),
            Duration::from_secs(cli.download_timeout_secs)
        );
    }

    #[test]
    fn download_timeout_flag_reaches_config() {
        let cli =
            Cli::try_parse_from(["superres", "--download-timeout-secs", "45", "a.png"]).unwrap();
        assert_eq!(build_config(&cli, None).unwrap().download_timeout_secs, 45);
    }
}
