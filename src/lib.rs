//! # autoslides
//!
//! Turn a PDF into a Google Slides presentation: extract the text, ask a
//! Gemini model for a structured summary, and build a deck from it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract   page text via pdfium (spawn_blocking), whitespace collapsed
//!  ├─ 2. Auth      stored token → refresh → loopback OAuth consent
//!  ├─ 3. Summary   one Vertex AI generateContent call, JSON response
//!  └─ 4. Deck      presentations.create + one batchUpdate
//! ```
//!
//! A [`PipelineController`] runs the stages in order on a background task,
//! allows one run at a time, and reports progress to the shell over a
//! [`progress::channel`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autoslides::{progress, PipelineController, SlidesConfig, Stage, Stages};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SlidesConfig::builder().project_id("my-project").build()?;
//!     let (tx, mut rx) = progress::channel();
//!     let controller = PipelineController::new(Stages::production(&config)?, &config, tx);
//!
//!     let run = controller.start("report.pdf").expect("idle controller");
//!     let printer = tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             if let Some(status) = event.status() {
//!                 eprintln!("{}", status.text);
//!             }
//!         }
//!     });
//!
//!     if run.wait().await == Stage::Succeeded {
//!         println!("{}", controller.snapshot().result_url.unwrap_or_default());
//!     }
//!     drop(controller);
//!     printer.abort();
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `autoslides` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SlidesConfig, SlidesConfigBuilder};
pub use controller::{PipelineController, PipelineRun, RunFailure, RunHandle, Stage};
pub use error::{
    AuthError, ConfigError, DeckError, ExtractError, FailureKind, PipelineError, SynthesisError,
};
pub use output::{DeckResult, KeyPoint, Summary};
pub use pipeline::{
    AuthorizedContext, ContentSynthesizer, CredentialBroker, DeckBuilder, Stages, TextExtractor,
};
pub use progress::{ShellEvent, ShellReceiver, ShellSender, StatusMessage};
