//! CLI binary for autoslides.
//!
//! The terminal shell around [`PipelineController`]: maps flags onto a
//! `SlidesConfig`, drains shell events into a spinner, and opens the finished
//! presentation.

use anyhow::{bail, Context, Result};
use autoslides::browser::{SystemBrowser, UrlOpener};
use autoslides::pipeline::{CredentialBroker, OAuthBroker, PdfiumExtractor, TextExtractor};
use autoslides::{
    progress, PipelineController, ShellEvent, ShellReceiver, SlidesConfig, Stage, Stages,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run: PDF → summary → Google Slides deck, opened in the browser
  autoslides --project-id my-project report.pdf

  # Check the OAuth setup only (opens the consent screen on first use)
  autoslides --auth-only

  # Print the text that would be sent to the model
  autoslides --extract-only report.pdf

  # Headless: print the deck URL and the run state as JSON
  autoslides --no-open --json report.pdf

SETUP:
  1. Create an OAuth client of type "Desktop app" in the cloud console and
     save its JSON as credentials.json (or pass --credentials).
  2. Enable the Google Slides API and Vertex AI API for your project.
  3. Set AUTOSLIDES_PROJECT_ID (a .env file in the working directory works).

  The first run opens a consent screen; the resulting token is stored in
  token.json and refreshed automatically afterwards.

ENVIRONMENT VARIABLES:
  AUTOSLIDES_PROJECT_ID   Cloud project id for the AI endpoint
  AUTOSLIDES_MODEL        Override the Gemini model id
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides --verbose/--quiet
"#;

/// Turn a PDF into a Google Slides presentation with Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "autoslides",
    version,
    about = "Turn a PDF into a Google Slides presentation with Gemini",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to summarise.
    #[arg(required_unless_present = "auth_only")]
    input: Option<PathBuf>,

    /// Cloud project id used in the AI endpoint URL.
    #[arg(long, env = "AUTOSLIDES_PROJECT_ID")]
    project_id: Option<String>,

    /// AI endpoint location.
    #[arg(long, env = "AUTOSLIDES_LOCATION", default_value = "global")]
    location: String,

    /// Gemini model id.
    #[arg(long, env = "AUTOSLIDES_MODEL", default_value = "gemini-2.5-pro")]
    model: String,

    /// OAuth client secret JSON.
    #[arg(long, env = "AUTOSLIDES_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Where the OAuth token is stored.
    #[arg(long, env = "AUTOSLIDES_TOKEN", default_value = "token.json")]
    token: PathBuf,

    /// pdfium shared library, or the directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Seconds to wait for the browser consent callback.
    #[arg(long, env = "AUTOSLIDES_CONSENT_TIMEOUT", default_value_t = 300)]
    consent_timeout: u64,

    /// Per-request timeout for the AI and Slides APIs, in seconds.
    #[arg(long, env = "AUTOSLIDES_API_TIMEOUT", default_value_t = 90)]
    api_timeout: u64,

    /// Print the deck URL instead of opening it.
    #[arg(long)]
    no_open: bool,

    /// Only acquire (and store) OAuth credentials.
    #[arg(long, conflicts_with = "extract_only")]
    auth_only: bool,

    /// Only extract and print the PDF text.
    #[arg(long)]
    extract_only: bool,

    /// Print the final run state as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Renders shell events on the terminal.
struct TerminalShell {
    bar: Option<ProgressBar>,
    opener: Option<Arc<dyn UrlOpener>>,
    quiet: bool,
}

impl TerminalShell {
    fn new(show_progress: bool, open: bool, quiet: bool) -> Self {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Self {
            bar,
            opener: open.then(|| Arc::new(SystemBrowser) as Arc<dyn UrlOpener>),
            quiet,
        }
    }

    fn line(&self, text: String) {
        match &self.bar {
            Some(bar) => bar.println(text),
            None if !self.quiet => eprintln!("{text}"),
            None => {}
        }
    }

    fn render(&self, event: ShellEvent) {
        match event {
            ShellEvent::Stage {
                index,
                total,
                status,
            } => match &self.bar {
                Some(bar) => {
                    bar.set_prefix(format!("{index}/{total}"));
                    bar.set_message(status.text);
                }
                None => self.line(status.text),
            },
            ShellEvent::Status(status) if status.is_error => {
                if let Some(bar) = &self.bar {
                    bar.finish_and_clear();
                }
                eprintln!("{} {}", red("✘"), status.text);
            }
            ShellEvent::Status(status) => self.line(format!("{} {}", green("✔"), status.text)),
            ShellEvent::OpenResult(url) => {
                if let Some(bar) = &self.bar {
                    bar.finish_and_clear();
                }
                if !self.quiet {
                    eprintln!("{} {}", green("✔"), bold(&url));
                }
                match &self.opener {
                    Some(opener) => {
                        if let Err(e) = opener.open(&url) {
                            warn!("Could not open the browser: {}", e);
                            println!("{url}");
                        }
                    }
                    None => println!("{url}"),
                }
            }
            ShellEvent::Controls(_) | ShellEvent::Selection(_) => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; everything can come from flags.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the stage messages, so library INFO logs are
    // suppressed while it is active. The consent URL stays visible for
    // hosts where no browser can be launched.
    let show_progress = !cli.quiet && !cli.json && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn,autoslides::pipeline::auth::consent=info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Auth-only mode ───────────────────────────────────────────────────
    if cli.auth_only {
        let broker = OAuthBroker::new(&config).context("Failed to set up OAuth")?;
        broker.acquire().await.context("Authentication failed")?;
        if !cli.quiet {
            eprintln!(
                "{} Authenticated; token stored at {}",
                green("✔"),
                bold(&config.token_path.display().to_string())
            );
        }
        return Ok(());
    }

    let input = cli.input.clone().context("No input PDF given")?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let text = PdfiumExtractor::new(config.pdfium_lib_path.clone())
            .extract(&input)
            .await
            .context("Text extraction failed")?;
        println!("{text}");
        return Ok(());
    }

    // ── Full run ─────────────────────────────────────────────────────────
    let stages = Stages::production(&config).context("Failed to set up the pipeline")?;
    let (tx, rx) = progress::channel();
    let controller = PipelineController::new(stages, &config, tx);
    let shell = TerminalShell::new(show_progress, !cli.no_open, cli.quiet);

    let Some(run) = controller.start(&input) else {
        bail!("{} is not a PDF file", input.display());
    };
    let stage = drive_shell(&shell, rx, run.wait()).await;

    if cli.json {
        let snapshot = controller.snapshot();
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("Failed to serialise run state")?
        );
    }

    if stage != Stage::Succeeded {
        let reason = controller
            .snapshot()
            .last_error
            .map(|f| f.message)
            .unwrap_or_else(|| "run did not complete".to_string());
        bail!(reason);
    }
    Ok(())
}

/// Render events until the run finishes, then flush whatever is queued.
async fn drive_shell(
    shell: &TerminalShell,
    mut rx: ShellReceiver,
    run: impl std::future::Future<Output = Stage>,
) -> Stage {
    tokio::pin!(run);
    loop {
        tokio::select! {
            Some(event) = rx.recv() => shell.render(event),
            stage = &mut run => {
                while let Ok(event) = rx.try_recv() {
                    shell.render(event);
                }
                if let Some(bar) = &shell.bar {
                    bar.finish_and_clear();
                }
                return stage;
            }
        }
    }
}

/// Map CLI args to `SlidesConfig`.
fn build_config(cli: &Cli) -> Result<SlidesConfig> {
    let mut builder = SlidesConfig::builder()
        .location(&cli.location)
        .model(&cli.model)
        .client_secret_path(&cli.credentials)
        .token_path(&cli.token)
        .consent_timeout_secs(cli.consent_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref id) = cli.project_id {
        builder = builder.project_id(id);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }

    builder.build().context("Invalid configuration")
}
