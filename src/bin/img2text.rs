//! CLI binary for edgequake-img2text.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, then either works through the images named on the
//! command line or prompts for paths on stdin until `quit`.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2text::config::{
    DEFAULT_MAX_DIMENSION, DEFAULT_MODEL, DEFAULT_PROVIDER, DEFAULT_SIZE_THRESHOLD_BYTES,
};
use edgequake_img2text::extract::write_text_file;
use edgequake_img2text::{
    output_path_for, ExtractionConfig, ExtractionError, ExtractionProgressCallback,
    ExtractionResult, Extractor, PromptStyle, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while an image is preprocessed and the model is thinking,
/// plus one ✓/✗ line per finished image.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_image_start(&self, index: usize, total: usize, source: &str) {
        if let Ok(mut t) = self.started.lock() {
            *t = Some(Instant::now());
        }
        if total > 1 {
            self.bar.set_prefix(format!("Image {index}/{total}"));
        } else {
            self.bar.set_prefix("Extracting");
        }
        self.bar.set_message(source.to_string());
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_image_complete(&self, _index: usize, _total: usize, text_len: usize) {
        let secs = self.elapsed_secs();
        let source = self.bar.message();
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            source,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.disable_steady_tick();
        self.bar.set_message("");
    }

    fn on_image_error(&self, _index: usize, _total: usize, error: &str) {
        let secs = self.elapsed_secs();
        let source = self.bar.message();
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            source,
            red(first_line),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.disable_steady_tick();
        self.bar.set_message("");
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let mark = if success_count == total { green("✔") } else { red("⚠") };
        eprintln!("{mark}  {success_count}/{total} images");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text from one image to stdout
  img2text receipt.jpg

  # Save to a file (overwritten if it exists)
  img2text scan.png -o scan.txt

  # Several images, one .txt per image
  img2text page1.jpg page2.jpg page3.jpg --output-dir transcripts/

  # Interactive: type paths, 'quit' to stop
  img2text

  # Plain transcript without layout notes, from a URL
  img2text --prompt-style basic https://example.com/sign.png

  # JSON with token counts and preprocessing stats
  img2text --json photo.jpg

PREPROCESSING:
  Files larger than --size-threshold (default 5 MiB) are downscaled so that
  neither side exceeds --max-dimension (default 2048 px) and re-encoded as
  PNG. Smaller files are sent unchanged with their detected media type.

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key (default provider)
  OPENAI_API_KEY          OpenAI API key      (--provider openai)
  GEMINI_API_KEY          Google Gemini key   (--provider gemini)
  GOOGLE_API_KEY          Alternative to GEMINI_API_KEY
  MISTRAL_API_KEY         Mistral API key     (--provider mistral)
  EDGEQUAKE_PROVIDER      Override provider
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter
"#;

/// Extract text from images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "img2text",
    version,
    about = "Extract text from images using Vision LLMs",
    long_about = "Send images (local files or URLs) to a Vision Language Model and print or save \
the text it reads. Oversized images are downscaled before upload. With no inputs, paths are read \
interactively from stdin until 'quit'.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file paths or HTTP/HTTPS URLs. Omit to enter paths interactively.
    inputs: Vec<String>,

    /// Write the text to this file instead of stdout (single input only).
    #[arg(short, long, env = "IMG2TEXT_OUTPUT", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write one `<stem>.txt` per image into this directory.
    #[arg(long, env = "IMG2TEXT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// LLM provider: anthropic, openai, gemini, mistral, ollama.
    #[arg(long, env = "EDGEQUAKE_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// Max LLM output tokens per image.
    #[arg(long, env = "IMG2TEXT_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "IMG2TEXT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Built-in instruction: basic or comprehensive.
    #[arg(long, env = "IMG2TEXT_PROMPT_STYLE", value_enum, default_value = "comprehensive")]
    prompt_style: PromptStyleArg,

    /// Path to a text file containing a custom instruction.
    #[arg(long, env = "IMG2TEXT_PROMPT")]
    prompt: Option<PathBuf>,

    /// File size in bytes above which images are downscaled.
    #[arg(long, env = "IMG2TEXT_SIZE_THRESHOLD", default_value_t = DEFAULT_SIZE_THRESHOLD_BYTES,
          value_parser = clap::value_parser!(u64).range(1..))]
    size_threshold: u64,

    /// Longest side in pixels after downscaling.
    #[arg(long, env = "IMG2TEXT_MAX_DIMENSION", default_value_t = DEFAULT_MAX_DIMENSION,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_dimension: u32,

    /// Output structured JSON (ExtractionResult) instead of plain text.
    #[arg(long, env = "IMG2TEXT_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "IMG2TEXT_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "IMG2TEXT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2TEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2TEXT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PromptStyleArg {
    Basic,
    Comprehensive,
}

impl From<PromptStyleArg> for PromptStyle {
    fn from(v: PromptStyleArg) -> Self {
        match v {
            PromptStyleArg::Basic => PromptStyle::Basic,
            PromptStyleArg::Comprehensive => PromptStyle::Comprehensive,
        }
    }
}

/// Where extracted text goes.
enum Sink {
    Stdout,
    File(PathBuf),
    Dir(PathBuf),
}

struct OutputOptions {
    sink: Sink,
    json: bool,
    quiet: bool,
    /// The progress callback already reports per-image failures.
    spinner: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let interactive = cli.inputs.is_empty();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner reports every image itself, so INFO logs stay quiet while
    // it runs.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !interactive && io::stderr().is_terminal();
    let filter = log_filter(cli.verbose, cli.quiet, show_progress);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Output routing ───────────────────────────────────────────────────
    let sink = match (&cli.output, &cli.output_dir) {
        (Some(path), _) => {
            if cli.inputs.len() != 1 {
                anyhow::bail!("--output takes exactly one input image; use --output-dir for several");
            }
            Sink::File(path.clone())
        }
        (None, Some(dir)) => Sink::Dir(dir.clone()),
        (None, None) => Sink::Stdout,
    };

    // ── Build config + extractor ─────────────────────────────────────────
    // A missing API key stops here, before any image is read.
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let extractor = Extractor::new(config).context("Cannot start extraction")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let out = OutputOptions {
        sink,
        json: cli.json,
        quiet: cli.quiet,
        spinner: show_progress,
    };
    let failed = if interactive {
        run_interactive(&extractor, &out).await?
    } else {
        run_batch(&extractor, &cli.inputs, &out).await
    };

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Default tracing filter when `RUST_LOG` is unset.
fn log_filter(verbose: bool, quiet: bool, spinner: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet || spinner {
        "error"
    } else {
        "info"
    }
}

/// Process every positional input in order, printing or saving each result
/// as soon as it arrives. Returns the failure count.
async fn run_batch(extractor: &Extractor, inputs: &[String], out: &OutputOptions) -> usize {
    let total = inputs.len();
    let multiple = total > 1;
    let targets = batch_targets(inputs, &out.sink);
    let mut failed = 0;

    let cb = extractor.config().progress_callback.clone();
    if let Some(ref cb) = cb {
        cb.on_batch_start(total);
    }

    for (i, input) in inputs.iter().enumerate() {
        let result = extractor.extract_indexed(input, i + 1, total).await;
        let target = targets.as_ref().map(|t| t[i].as_path());
        if !handle_result(input, result, out, multiple, target).await {
            failed += 1;
        }
    }

    if let Some(ref cb) = cb {
        cb.on_batch_complete(total, total - failed);
    }
    failed
}

/// Output file per input for a directory sink.
///
/// Inputs sharing a file stem get `-2`, `-3`, ... suffixes so no transcript
/// overwrites another. `None` for the other sinks.
fn batch_targets(inputs: &[String], sink: &Sink) -> Option<Vec<PathBuf>> {
    let Sink::Dir(dir) = sink else {
        return None;
    };
    let mut seen: HashSet<PathBuf> = HashSet::with_capacity(inputs.len());
    let targets = inputs
        .iter()
        .map(|input| {
            let base = output_path_for(input, dir);
            let mut candidate = base.clone();
            let mut n = 2;
            while !seen.insert(candidate.clone()) {
                let stem = base
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                candidate = base.with_file_name(format!("{stem}-{n}.txt"));
                n += 1;
            }
            candidate
        })
        .collect();
    Some(targets)
}

/// Prompt for paths on stdin until `quit`, `exit` or EOF. Returns the failure count.
async fn run_interactive(extractor: &Extractor, out: &OutputOptions) -> Result<usize> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut failed = 0;

    loop {
        if !out.quiet {
            eprint!("{} ", bold("Image path or URL ('quit' to exit):"));
            io::stderr().flush().ok();
        }

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let Some(input) = parse_interactive_line(&line) else {
            continue;
        };
        if is_quit(input) {
            break;
        }

        let result = extractor.extract(input).await;
        if !handle_result(input, result, out, false, None).await {
            failed += 1;
        }
    }
    Ok(failed)
}

/// Trim whitespace and one pair of surrounding quotes; `None` for blank lines.
fn parse_interactive_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(trimmed)
        .trim();
    (!unquoted.is_empty()).then_some(unquoted)
}

fn is_quit(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit")
}

/// Print or save one result. Returns false if the image (or its output) failed.
///
/// `target` overrides the directory sink's file name (see [`batch_targets`]).
async fn handle_result(
    input: &str,
    result: Result<ExtractionResult, ExtractionError>,
    out: &OutputOptions,
    multiple: bool,
    target: Option<&Path>,
) -> bool {
    let result = match result {
        Ok(r) => r,
        Err(e) => {
            if !out.spinner {
                eprintln!("{} {}: {}", red("✗"), input, e);
            }
            return false;
        }
    };

    // Several results on stdout are emitted as JSON Lines.
    let json_lines = multiple && matches!(out.sink, Sink::Stdout);
    let body = match render_body(&result, out.json, json_lines) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("{} {}: failed to serialise result: {}", red("✗"), input, e);
            return false;
        }
    };

    let target = match &out.sink {
        Sink::Stdout => None,
        Sink::File(path) => Some(path.clone()),
        Sink::Dir(dir) => Some(
            target
                .map(Path::to_path_buf)
                .unwrap_or_else(|| output_path_for(input, dir)),
        ),
    };

    match target {
        None => print_to_stdout(input, &body, multiple && !out.json),
        Some(path) => {
            if let Err(e) = write_text_file(&path, &body).await {
                eprintln!("{} {}: {}", red("✗"), input, e);
                return false;
            }
            if !out.quiet {
                eprintln!(
                    "   {} → {}  {}",
                    input,
                    bold(&path.display().to_string()),
                    dim(&format!(
                        "{} tokens in / {} out",
                        result.stats.input_tokens, result.stats.output_tokens
                    )),
                );
            }
        }
    }
    true
}

/// Plain text, pretty JSON, or one compact JSON object for a JSON Lines stream.
fn render_body(
    result: &ExtractionResult,
    json: bool,
    json_lines: bool,
) -> serde_json::Result<String> {
    match (json, json_lines) {
        (false, _) => Ok(result.text.clone()),
        (true, true) => serde_json::to_string(result),
        (true, false) => serde_json::to_string_pretty(result),
    }
}

fn print_to_stdout(input: &str, body: &str, with_header: bool) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if with_header {
        writeln!(handle, "==> {input} <==").ok();
    }
    handle.write_all(body.as_bytes()).ok();
    if !body.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    if with_header {
        handle.write_all(b"\n").ok();
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .provider_name(&cli.provider)
        .model(&cli.model)
        .max_tokens(cli.max_tokens)
        .prompt_style(cli.prompt_style.clone().into())
        .size_threshold_bytes(cli.size_threshold)
        .max_dimension(cli.max_dimension)
        .download_timeout_secs(cli.download_timeout);

    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
