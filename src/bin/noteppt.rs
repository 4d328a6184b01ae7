//! CLI binary for noteppt.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, wires up credentials from the environment and prints
//! results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use noteppt::credentials::generate_master_key;
use noteppt::{
    convert_to_file, ConversionConfig, ConversionProgressCallback, CredentialResolver,
    DeploymentConfig, JsonFileKeyStore, KeyVault, PdfiumRasterizer, ProgressCallback,
    ProviderKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per slide. Slides may finish out of
/// order when `--concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the slide count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Writing notes");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, slide: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&slide))
            .map_or(0.0, |t| t.elapsed().as_secs_f64())
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_slides: usize) {
        self.activate_bar(total_slides);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendered {total_slides} slides"))
        ));
    }

    fn on_slide_start(&self, slide: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(slide, Instant::now());
        }
        self.bar.set_message(format!("slide {slide}"));
    }

    fn on_slide_complete(&self, slide: usize, total: usize, notes_len: usize) {
        let secs = self.elapsed_secs(slide);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            slide,
            total,
            dim(&format!("{notes_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide: usize, total: usize, error: String) {
        let secs = self.elapsed_secs(slide);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };

        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            slide,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_slides: usize, with_notes: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} speaker notes written for {}/{} slides",
                green("✔"),
                bold(&with_notes.to_string()),
                total_slides
            );
        } else {
            eprintln!(
                "{} {}/{} slides have notes  ({} failed)",
                if failed == total_slides {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&with_notes.to_string()),
                total_slides,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert with Gemini (default provider), write deck.pptx next to the PDF
  noteppt deck.pdf

  # Pick provider, model and output path
  noteppt deck.pdf -o talk.pptx --provider claude --model claude-3-5-haiku-20241022

  # Give the model background material, notes in Korean
  noteppt deck.pdf --context-file briefing.md --language Korean

  # Picture-only deck, no AI calls, keep the corner badge
  noteppt deck.pdf --no-notes --keep-watermark

  # Use the caller's stored key
  noteppt deck.pdf --user alice --key-store keys.json

  # Key management
  noteppt --generate-master-key
  echo "$OPENAI_API_KEY" | ENCRYPTION_MASTER_KEY=... noteppt --encrypt-key

PROVIDERS:
  gemini              gemini-2.5-flash (default)
  openai              gpt-4o
  anthropic, claude   claude-3-5-sonnet-20241022
  grok, xai           grok-2-1212
  Run `noteppt --list-models` for every supported model.

API KEY RESOLUTION (first match wins):
  1. --api-key / NOTEPPT_API_KEY
  2. the --user's record in --key-store, decrypted with ENCRYPTION_MASTER_KEY
  3. GEMINI_API_KEY (GOOGLE_API_KEY), OPENAI_API_KEY, ANTHROPIC_API_KEY,
     XAI_API_KEY (GROK_API_KEY)

ENVIRONMENT VARIABLES:
  ENCRYPTION_MASTER_KEY   base64 32-byte secret protecting stored keys
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Overrides the log filter
"#;

/// Convert PDF decks to PowerPoint with AI-generated speaker notes.
#[derive(Parser, Debug)]
#[command(
    name = "noteppt",
    version,
    about = "Convert PDF decks to PowerPoint with AI-generated speaker notes",
    long_about = "Render every page of a PDF deck into a full-slide picture, ask a vision model \
for presenter notes on each slide, and write the result as a .pptx presentation. Supports \
Google Gemini, OpenAI, Anthropic and xAI Grok.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to convert.
    input: Option<PathBuf>,

    /// Write the presentation here. Default: input path with `.pptx`.
    #[arg(short, long, env = "NOTEPPT_OUTPUT")]
    output: Option<PathBuf>,

    /// AI provider: gemini, openai, anthropic (claude), grok (xai).
    #[arg(long, env = "NOTEPPT_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Model ID. Default: the provider's recommended model.
    #[arg(long, env = "NOTEPPT_MODEL")]
    model: Option<String>,

    /// API key for this run. Wins over stored and fallback keys.
    #[arg(long, env = "NOTEPPT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Background material for the notes.
    #[arg(long, env = "NOTEPPT_CONTEXT", conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the background material from a file.
    #[arg(long, env = "NOTEPPT_CONTEXT_FILE")]
    context_file: Option<PathBuf>,

    /// Language for the notes, e.g. "Korean". Default: the slide's language.
    #[arg(long, env = "NOTEPPT_LANGUAGE")]
    language: Option<String>,

    /// Rendering DPI (1–600).
    #[arg(long, env = "NOTEPPT_DPI", default_value_t = 144,
          value_parser = clap::value_parser!(u32).range(1..=600))]
    dpi: u32,

    /// Leave the bottom-right corner untouched.
    #[arg(long, env = "NOTEPPT_KEEP_WATERMARK")]
    keep_watermark: bool,

    /// Build a picture-only deck without contacting any provider.
    #[arg(long, env = "NOTEPPT_NO_NOTES")]
    no_notes: bool,

    /// Number of concurrent provider calls.
    #[arg(short, long, env = "NOTEPPT_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Retries per slide on transient provider failures.
    #[arg(long, env = "NOTEPPT_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-slide provider timeout in seconds.
    #[arg(long, env = "NOTEPPT_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Max output tokens per slide.
    #[arg(long, env = "NOTEPPT_MAX_TOKENS", default_value_t = 2000)]
    max_tokens: u32,

    /// Sampling temperature (0.0–2.0). Default: provider default.
    #[arg(long, env = "NOTEPPT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Override the provider base URL (gateways, proxies).
    #[arg(long, env = "NOTEPPT_BASE_URL")]
    base_url: Option<String>,

    /// User whose stored key should be used.
    #[arg(long, env = "NOTEPPT_USER", requires = "key_store")]
    user: Option<String>,

    /// JSON file of encrypted keys: { user: { provider: ciphertext } }.
    #[arg(long, env = "NOTEPPT_KEY_STORE")]
    key_store: Option<PathBuf>,

    /// Print a JSON report of the conversion on stdout.
    #[arg(long, env = "NOTEPPT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "NOTEPPT_NO_PROGRESS")]
    no_progress: bool,

    /// Print the page count only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// List supported models (for --provider if given explicitly, else all).
    #[arg(long)]
    list_models: bool,

    /// Read an API key from stdin and print its encrypted record.
    #[arg(long)]
    encrypt_key: bool,

    /// Print a fresh ENCRYPTION_MASTER_KEY value.
    #[arg(long)]
    generate_master_key: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTEPPT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTEPPT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose mode always wins.
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

    // ── Utility modes ────────────────────────────────────────────────────
    if cli.generate_master_key {
        println!("{}", generate_master_key());
        return Ok(());
    }

    if cli.list_models {
        return list_models(&cli);
    }

    if cli.encrypt_key {
        return encrypt_key();
    }

    let input = cli
        .input
        .clone()
        .context("No input PDF given (see --help)")?;
    let pdf = tokio::fs::read(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    if cli.inspect_only {
        return inspect(&input, pdf, cli.json).await;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    let mut credentials = CredentialResolver::from_deployment(DeploymentConfig::from_env())
        .context("Invalid ENCRYPTION_MASTER_KEY")?;
    if let Some(ref path) = cli.key_store {
        credentials = credentials.with_store(Arc::new(JsonFileKeyStore::new(path)));
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&input));

    let output = convert_to_file(&pdf, &output_path, &config, &credentials)
        .await
        .context("Conversion failed")?;
    let stats = &output.stats;

    if cli.json {
        let json = serde_json::to_string_pretty(&output.report())
            .context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {}/{} slides with notes  {}ms  →  {}",
            if stats.failed_slides == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.slides_with_notes,
            stats.total_slides,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if let (Some(provider), Some(model)) = (&stats.provider, &stats.model) {
            eprintln!("   {}", dim(&format!("{provider} / {model}")));
        }
        if !show_progress && stats.failed_slides > 0 {
            eprintln!("  {} slides without notes due to errors", stats.failed_slides);
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let context = match (&cli.context, &cli.context_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read context from {:?}", path))?,
        ),
        (None, None) => None,
    };

    let mut builder = ConversionConfig::builder()
        .provider(cli.provider.clone())
        .dpi(cli.dpi)
        .remove_watermark(!cli.keep_watermark)
        .generate_notes(!cli.no_notes)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .max_tokens(cli.max_tokens);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ctx) = context {
        builder = builder.context(ctx);
    }
    if let Some(ref lang) = cli.language {
        builder = builder.notes_language(lang.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref user) = cli.user {
        builder = builder.user_id(user.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("pptx")
}

fn list_models(cli: &Cli) -> Result<()> {
    let provider_given = std::env::args().any(|a| a == "--provider" || a.starts_with("--provider="));
    let kinds: Vec<ProviderKind> = if provider_given {
        vec![cli.provider.parse()?]
    } else {
        ProviderKind::ALL.to_vec()
    };

    for kind in kinds {
        let aliases = kind.aliases();
        if aliases.is_empty() {
            println!("{}", bold(kind.as_str()));
        } else {
            println!("{} {}", bold(kind.as_str()), dim(&format!("({})", aliases.join(", "))));
        }
        for model in kind.models() {
            if *model == kind.default_model() {
                println!("  {model} {}", green("(default)"));
            } else {
                println!("  {model}");
            }
        }
    }
    Ok(())
}

fn encrypt_key() -> Result<()> {
    let vault = KeyVault::from_config(&DeploymentConfig::from_env())
        .context("Invalid ENCRYPTION_MASTER_KEY")?;
    if !vault.is_secure() {
        bail!("ENCRYPTION_MASTER_KEY must be set to encrypt keys (try --generate-master-key)");
    }

    let mut key = String::new();
    io::stdin()
        .read_to_string(&mut key)
        .context("Failed to read key from stdin")?;
    let key = key.trim();
    if key.is_empty() {
        bail!("No key on stdin");
    }

    println!("{}", vault.encrypt(key)?);
    Ok(())
}

async fn inspect(input: &Path, pdf: Vec<u8>, json: bool) -> Result<()> {
    let pages = tokio::task::spawn_blocking(move || PdfiumRasterizer::new().page_count(&pdf))
        .await
        .context("Inspect task panicked")?
        .context("Failed to inspect PDF")?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "file": input.display().to_string(), "pages": pages })
        );
    } else {
        println!("File:   {}", input.display());
        println!("Pages:  {pages}");
    }
    Ok(())
}
