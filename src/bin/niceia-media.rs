//! CLI binary for niceia-media.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use niceia_media::{
    normalize, probe_dimensions, rasterize, Backoff, CropContext, LinkCheckState, LinkVerifier,
    MediaFile, Notifier, PipelineConfig, PixelCrop, ReqwestBackend, RetryPolicy, Session,
    SourceImage, UploadDispatcher, UploadPayload, UploadSlot, UploadTarget, API_BASE_URL_ENV,
};
use std::io;
use std::path::{Path, PathBuf};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Terminal notifier ────────────────────────────────────────────────────────

/// Prints notifications above an optional spinner, like toasts in a browser.
struct CliNotifier {
    bar: Option<ProgressBar>,
}

impl CliNotifier {
    fn new(show_spinner: bool, message: &str) -> Arc<Self> {
        let bar = show_spinner.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_prefix("niceia");
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Arc::new(Self { bar })
    }

    fn print(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Notifier for CliNotifier {
    fn success(&self, message: &str) {
        self.print(format!("{} {}", green("✔"), message));
    }

    fn warning(&self, message: &str) {
        self.print(format!("{} {}", yellow("⚠"), message));
    }

    fn error(&self, message: &str) {
        self.print(format!("{} {}", red("✘"), message));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Circular profile crop, written locally
  niceia-media crop me.png --crop 10,10,100,100 -o avatar.jpg

  # Integer crop fields the server would receive for a banner
  niceia-media coords banner.jpg --crop 0,0,300.4,100.5

  # Upload a profile photo, cropped client-side
  niceia-media upload me.png --target upload-membro-perfil --crop 10,10,100,100

  # Upload a banner with server-side crop coordinates
  niceia-media upload banner.jpg --target upload-membro-fundo --crop 0,0,300,100 --server-crop

  # Check that project documents are reachable
  niceia-media verify https://cdn.example.org/a.pdf /files/b.pdf

  # Same, waiting 1 s, 2 s, 4 s between five attempts
  niceia-media verify --probe-attempts 5 --exponential /files/b.pdf

UPLOAD TARGETS:
  upload-membro-perfil    upload-membro-fundo     image/jpeg, image/png, image/jpg
  upload-usuario-perfil   upload-usuario-fundo    image/jpeg, image/png, image/jpg
  upload-noticia-imagem   upload-evento-imagem    image/jpeg, image/png, image/jpg
  upload-projeto-imagem                           image/jpeg, image/png, image/jpg
  upload-projeto-arquivo                          application/pdf

ENVIRONMENT VARIABLES:
  NEXT_PUBLIC_API_BASE_URL  Backend origin (default http://localhost:8080)
  NICEIA_TOKEN              Bearer token for uploads
  RUST_LOG                  Override log filter (e.g. niceia_media=debug)
"#;

/// Crop, upload and verify media for the Niceia portal.
#[derive(Parser, Debug)]
#[command(
    name = "niceia-media",
    version,
    about = "Crop, upload and verify media for the Niceia portal",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend origin, e.g. https://api.niceia.org.
    #[arg(long, global = true, env = API_BASE_URL_ENV)]
    api_base_url: Option<String>,

    /// JPEG quality for client-side crops (0.0–1.0).
    #[arg(long, global = true, env = "NICEIA_JPEG_QUALITY", default_value_t = 0.8)]
    jpeg_quality: f32,

    /// Upload request timeout in seconds.
    #[arg(long, global = true, env = "NICEIA_UPLOAD_TIMEOUT", default_value_t = 60)]
    upload_timeout: u64,

    /// Link-check attempts per document.
    #[arg(long, global = true, env = "NICEIA_PROBE_ATTEMPTS", default_value_t = 3)]
    probe_attempts: u32,

    /// Wait between link-check attempts, in milliseconds.
    #[arg(long, global = true, env = "NICEIA_PROBE_BACKOFF_MS", default_value_t = 1000)]
    probe_backoff_ms: u64,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "NICEIA_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "NICEIA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "NICEIA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "NICEIA_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crop an image locally and write the JPEG result.
    Crop {
        input: PathBuf,
        /// Crop rectangle as x,y,width,height in source pixels.
        #[arg(long)]
        crop: String,
        /// Crop context: profile (circular) or background (rectangular).
        #[arg(long, value_enum, default_value = "profile")]
        context: ContextArg,
        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the integer crop fields sent for a server-side crop.
    Coords {
        input: PathBuf,
        #[arg(long)]
        crop: String,
    },
    /// Upload a file to a backend upload endpoint.
    Upload {
        input: PathBuf,
        /// Endpoint name, e.g. upload-membro-perfil.
        #[arg(long)]
        target: String,
        /// Crop rectangle as x,y,width,height.
        #[arg(long)]
        crop: Option<String>,
        /// Send the original file plus crop fields instead of a cropped JPEG.
        #[arg(long, requires = "crop")]
        server_crop: bool,
        /// Bearer token.
        #[arg(long, env = "NICEIA_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Check that document links are reachable.
    Verify {
        /// Absolute URLs or backend-relative paths.
        #[arg(required = true)]
        urls: Vec<String>,
        /// Double the wait after each failed attempt instead of keeping it fixed.
        #[arg(long)]
        exponential: bool,
    },
    /// Print an image's dimensions and type without decoding it.
    Inspect { input: PathBuf },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ContextArg {
    Profile,
    Background,
}

impl From<ContextArg> for CropContext {
    fn from(v: ContextArg) -> Self {
        match v {
            ContextArg::Profile => CropContext::Profile,
            ContextArg::Background => CropContext::Background,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let show_spinner = !cli.quiet && !cli.no_progress && !cli.json;

    match &cli.command {
        Command::Crop {
            input,
            crop,
            context,
            output,
        } => {
            let crop = parse_crop(crop)?;
            let file = read_input(input).await?;
            let source = tokio::task::spawn_blocking(move || SourceImage::decode(&file.bytes))
                .await
                .context("Decode task panicked")?
                .context("Failed to decode image")?;
            let asset = rasterize(&source, &crop, (*context).into(), &config)
                .await
                .context("Crop failed")?;
            tokio::fs::write(output, &asset.bytes)
                .await
                .with_context(|| format!("Failed to write {:?}", output))?;

            if cli.json {
                let json = serde_json::json!({
                    "output": output,
                    "width": asset.width,
                    "height": asset.height,
                    "bytes": asset.bytes.len(),
                    "mimeType": asset.mime_type,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else if !cli.quiet {
                eprintln!(
                    "{} {}x{}  {}  →  {}",
                    green("✔"),
                    asset.width,
                    asset.height,
                    dim(&format!("{} bytes", asset.bytes.len())),
                    bold(&output.display().to_string()),
                );
            }
        }

        Command::Coords { input, crop } => {
            let crop = parse_crop(crop)?;
            let file = read_input(input).await?;
            let (w, h) = probe_dimensions(&file.bytes).context("Failed to read image header")?;
            let coords = normalize(&crop, w, h).context("Invalid crop")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&coords)?);
            } else {
                for (name, value) in coords.form_fields() {
                    println!("{name:<11} {value}");
                }
            }
        }

        Command::Upload {
            input,
            target,
            crop,
            server_crop,
            token,
        } => {
            let target = UploadTarget::parse(target)
                .with_context(|| format!("Unknown upload target '{target}'"))?;
            let crop = crop.as_deref().map(parse_crop).transpose()?;
            let file = read_input(input).await?;
            let payload = build_payload(file, target, crop, *server_crop, &config).await?;

            let backend = Arc::new(ReqwestBackend::new(&config)?);
            let dispatcher = UploadDispatcher::new(backend, config.clone());
            let notifier = CliNotifier::new(show_spinner, &format!("Uploading to {target}…"));
            let session = Session::with_token(token.as_str());

            let result = dispatcher.dispatch(&session, target, payload).await;
            notifier.finish();
            let result = result.with_context(|| format!("Upload to {target} failed"))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.media_url);
                if !cli.quiet {
                    eprintln!("{} {}", dim("display:"), result.cache_busted());
                }
            }
        }

        Command::Verify { urls, exponential } => {
            let backend = Arc::new(ReqwestBackend::new(&config)?);
            let mut verifier = LinkVerifier::new(backend, &config);
            if *exponential {
                verifier = verifier.with_policy(RetryPolicy::new(
                    config.probe_attempts,
                    Backoff::Exponential {
                        base: Duration::from_millis(config.probe_backoff_ms),
                    },
                ));
            }
            let notifier = CliNotifier::new(show_spinner, "Checking documents…");
            let links = verifier
                .verify_all(urls.iter().map(|u| (u.as_str(), u.as_str())), notifier.as_ref())
                .await;
            notifier.finish();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&links)?);
            } else {
                for link in &links {
                    let mark = match &link.state {
                        LinkCheckState::Verified { .. } => green("✓"),
                        LinkCheckState::ExhaustedWithWarning { .. } => yellow("⚠"),
                        LinkCheckState::Unchecked => dim("·"),
                    };
                    println!("{} {}", mark, link.url);
                }
            }
        }

        Command::Inspect { input } => {
            let file = read_input(input).await?;
            let (w, h) = probe_dimensions(&file.bytes).context("Failed to read image header")?;

            if cli.json {
                let json = serde_json::json!({
                    "file": file.file_name,
                    "mimeType": file.mime_type,
                    "bytes": file.len(),
                    "width": w,
                    "height": h,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("File:         {}", file.file_name);
                println!("Type:         {}", file.mime_type);
                println!("Size:         {} bytes", file.len());
                println!("Dimensions:   {}x{}", w, h);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .jpeg_quality(cli.jpeg_quality)
        .upload_timeout_secs(cli.upload_timeout)
        .probe_attempts(cli.probe_attempts)
        .probe_backoff_ms(cli.probe_backoff_ms);
    if let Some(ref url) = cli.api_base_url {
        builder = builder.api_base_url(url.clone());
    }
    builder.build().context("Invalid configuration")
}

async fn read_input(path: &Path) -> Result<MediaFile> {
    MediaFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}

/// Pick the upload mode from the flags: raw file, client-side crop, or
/// original plus server-side crop fields.
async fn build_payload(
    file: MediaFile,
    target: UploadTarget,
    crop: Option<PixelCrop>,
    server_crop: bool,
    config: &PipelineConfig,
) -> Result<UploadPayload> {
    let Some(crop) = crop else {
        return Ok(UploadPayload::File(file));
    };

    if server_crop {
        let (w, h) = probe_dimensions(&file.bytes).context("Failed to read image header")?;
        let coords = normalize(&crop, w, h).context("Invalid crop")?;
        return Ok(UploadPayload::Coordinates {
            original: file,
            crop: coords,
        });
    }

    let context = match target.slot {
        UploadSlot::Perfil => CropContext::Profile,
        _ => CropContext::Background,
    };
    let source = tokio::task::spawn_blocking(move || SourceImage::decode(&file.bytes))
        .await
        .context("Decode task panicked")?
        .context("Failed to decode image")?;
    let asset = rasterize(&source, &crop, context, config)
        .await
        .context("Crop failed")?;
    Ok(UploadPayload::File(asset.into()))
}

/// Parse `--crop x,y,width,height` into a `PixelCrop`.
fn parse_crop(s: &str) -> Result<PixelCrop> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<f64>()
                .context(format!("Invalid crop value: '{}'", p.trim()))
        })
        .collect::<Result<Vec<_>>>()?;

    match parts.as_slice() {
        [x, y, w, h] => Ok(PixelCrop::new(*x, *y, *w, *h)),
        _ => anyhow::bail!(
            "Crop must be x,y,width,height (got {} values)",
            parts.len()
        ),
    }
}
