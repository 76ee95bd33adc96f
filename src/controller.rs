//! The pipeline controller: single-flight orchestration of the four stages.
//!
//! ## State machine
//!
//! ```text
//! Idle ─generate─▶ Extracting ─▶ Authenticating ─▶ Synthesizing ─▶ BuildingDeck ─▶ Succeeded
//!                  └──────────────── any error ─────────────────────┘──▶ Failed ─reset─▶ Idle
//! ```
//!
//! A run executes on its own tokio task. The controller never waits on the
//! shell: every progress line, control change and result goes out through a
//! [`ShellSender`] and is rendered whenever the shell drains its receiver.
//!
//! While a run is active, `select`, `generate` and `start` are rejected and
//! leave the state untouched. There is no queue and no cancellation.

use crate::config::SlidesConfig;
use crate::error::{ExtractError, FailureKind, PipelineError};
use crate::output::{DeckResult, Summary};
use crate::pipeline::input::has_pdf_extension;
use crate::pipeline::Stages;
use crate::progress::{ControlState, ShellEvent, ShellSender, StatusMessage};
use crate::prompts::truncate_chars;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Number of numbered stages reported to the shell.
pub const STAGE_COUNT: usize = 4;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Idle,
    Extracting,
    Authenticating,
    Synthesizing,
    BuildingDeck,
    Succeeded,
    Failed,
}

impl Stage {
    /// A run is in flight.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Stage::Extracting | Stage::Authenticating | Stage::Synthesizing | Stage::BuildingDeck
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed)
    }

    /// Whether `self → next` is a legal transition.
    ///
    /// Forward one step at a time, `Failed` from any active stage, a new run
    /// from any idle or terminal stage, and `reset` from a terminal stage.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Idle | Succeeded | Failed, Extracting) => true,
            (Extracting, Authenticating)
            | (Authenticating, Synthesizing)
            | (Synthesizing, BuildingDeck)
            | (BuildingDeck, Succeeded) => true,
            (from, Failed) => from.is_active(),
            (Succeeded | Failed, Idle) => true,
            _ => false,
        }
    }

    /// 1-based position among the numbered stages.
    pub fn index(self) -> Option<usize> {
        match self {
            Stage::Extracting => Some(1),
            Stage::Authenticating => Some(2),
            Stage::Synthesizing => Some(3),
            Stage::BuildingDeck => Some(4),
            _ => None,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Stage::Extracting => "Extracting text from the PDF...",
            Stage::Authenticating => "Authenticating with Google...",
            Stage::Synthesizing => "Generating content with AI (Gemini)... (this may take a while)",
            Stage::BuildingDeck => "Creating the presentation in Google Slides...",
            Stage::Idle => "Idle",
            Stage::Succeeded => "Done",
            Stage::Failed => "Failed",
        }
    }
}

/// Why the last run failed, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// State of the current (or last) run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub source_path: Option<PathBuf>,
    pub stage: Stage,
    pub extracted_text: Option<String>,
    pub summary: Option<Summary>,
    pub result_url: Option<String>,
    pub last_error: Option<RunFailure>,
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self {
            source_path: None,
            stage: Stage::Idle,
            extracted_text: None,
            summary: None,
            result_url: None,
            last_error: None,
        }
    }
}

/// Handle to a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    join: JoinHandle<Stage>,
}

impl RunHandle {
    /// Wait for the run to finish and return its terminal stage.
    pub async fn wait(self) -> Stage {
        match self.join.await {
            Ok(stage) => stage,
            Err(e) => {
                error!("Pipeline supervisor task failed: {}", e);
                Stage::Failed
            }
        }
    }
}

struct Inner {
    stages: Stages,
    max_prompt_chars: usize,
    state: Mutex<PipelineRun>,
    events: ShellSender,
}

/// Drives document → deck runs and reports to the shell.
///
/// Cheap to clone; clones share one run state.
#[derive(Clone)]
pub struct PipelineController {
    inner: Arc<Inner>,
}

impl PipelineController {
    pub fn new(stages: Stages, config: &SlidesConfig, events: ShellSender) -> Self {
        Self {
            inner: Arc::new(Inner {
                stages,
                max_prompt_chars: config.max_prompt_chars,
                state: Mutex::new(PipelineRun::default()),
                events,
            }),
        }
    }

    /// Choose the document for the next run. Returns `false` if rejected.
    pub fn select(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut run = self.inner.lock();
        if !self.inner.take_selection(&mut run, path) {
            return false;
        }
        drop(run);
        self.inner.selected(path);
        true
    }

    /// Start a run on the selected document.
    ///
    /// `None` when a run is already active or nothing is selected.
    pub fn generate(&self) -> Option<RunHandle> {
        let mut run = self.inner.lock();
        if run.stage.is_active() {
            debug!("Generate ignored: a run is in progress");
            return None;
        }
        let Some(path) = Inner::begin(&mut run) else {
            drop(run);
            self.inner
                .events
                .status(StatusMessage::error("Error: no PDF file selected."));
            return None;
        };
        drop(run);
        Some(self.launch(path))
    }

    /// Select `path` and start a run on it in one step.
    ///
    /// The selection and the move to `Extracting` happen under one lock, so
    /// an accepted handle always runs on `path`.
    pub fn start(&self, path: impl AsRef<Path>) -> Option<RunHandle> {
        let path = path.as_ref();
        let mut run = self.inner.lock();
        if !self.inner.take_selection(&mut run, path) {
            return None;
        }
        let source = Inner::begin(&mut run)?;
        drop(run);
        self.inner.selected(path);
        Some(self.launch(source))
    }

    fn launch(&self, path: PathBuf) -> RunHandle {
        info!("Starting run for {}", path.display());
        self.inner.events.controls(ControlState::BUSY);
        self.inner.announce(Stage::Extracting);

        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move {
            let worker = tokio::spawn(Arc::clone(&inner).drive(path));
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(e) => Err(PipelineError::Unexpected(format!("pipeline task failed: {e}"))),
            };
            inner.finish(outcome)
        });
        RunHandle { join }
    }

    pub fn snapshot(&self) -> PipelineRun {
        self.inner.lock().clone()
    }

    /// Return a finished run to `Idle`. The selection is kept as is.
    pub fn reset(&self) -> bool {
        let mut run = self.inner.lock();
        if !run.stage.can_advance_to(Stage::Idle) {
            return false;
        }
        run.stage = Stage::Idle;
        run.last_error = None;
        true
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, PipelineRun> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate `path` and make it the selection of a fresh run.
    fn take_selection(&self, run: &mut PipelineRun, path: &Path) -> bool {
        if run.stage.is_active() {
            debug!("Selection ignored: a run is in progress");
            return false;
        }
        if !has_pdf_extension(path) {
            self.events
                .status(StatusMessage::error("Error: please select a valid .pdf file."));
            return false;
        }
        *run = PipelineRun {
            source_path: Some(path.to_path_buf()),
            ..PipelineRun::default()
        };
        true
    }

    /// Move the selected run to `Extracting`, returning its path.
    fn begin(run: &mut PipelineRun) -> Option<PathBuf> {
        let path = run.source_path.clone()?;
        run.stage = Stage::Extracting;
        run.extracted_text = None;
        run.summary = None;
        run.result_url = None;
        run.last_error = None;
        Some(path)
    }

    fn selected(&self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!("Selected {}", path.display());
        self.events
            .send(ShellEvent::Selection(Some(path.to_path_buf())));
        self.events
            .status(StatusMessage::info(format!("Selected file: {name}")));
        self.events.controls(ControlState::READY);
    }

    fn announce(&self, stage: Stage) {
        if let Some(index) = stage.index() {
            let text = format!("Step {index}/{STAGE_COUNT}: {}", stage.description());
            info!("{}", text);
            self.events.stage(index, STAGE_COUNT, text);
        }
    }

    fn advance(&self, next: Stage) -> Result<(), PipelineError> {
        {
            let mut run = self.lock();
            if !run.stage.can_advance_to(next) {
                return Err(PipelineError::Unexpected(format!(
                    "illegal stage transition {:?} -> {:?}",
                    run.stage, next
                )));
            }
            run.stage = next;
        }
        self.announce(next);
        Ok(())
    }

    async fn drive(self: Arc<Self>, path: PathBuf) -> Result<DeckResult, PipelineError> {
        let text = self.stages.extractor.extract(&path).await?;
        if text.trim().is_empty() {
            return Err(ExtractError::Empty { path }.into());
        }
        self.lock().extracted_text = Some(text.clone());

        self.advance(Stage::Authenticating)?;
        let ctx = self.stages.broker.acquire().await?;

        self.advance(Stage::Synthesizing)?;
        let prompt_text = truncate_chars(&text, self.max_prompt_chars);
        if prompt_text.len() < text.len() {
            debug!(
                "Document text truncated to {} chars for synthesis",
                self.max_prompt_chars
            );
        }
        let summary = self.stages.synthesizer.synthesize(prompt_text, &ctx).await?;
        self.lock().summary = Some(summary.clone());

        self.advance(Stage::BuildingDeck)?;
        let deck = self.stages.deck.build(&summary, &ctx).await?;
        Ok(deck)
    }

    fn finish(&self, outcome: Result<DeckResult, PipelineError>) -> Stage {
        let outcome = outcome.and_then(|deck| {
            self.advance(Stage::Succeeded)?;
            Ok(deck)
        });

        match outcome {
            Ok(deck) => {
                info!("Presentation ready: {}", deck.url);
                {
                    let mut run = self.lock();
                    run.result_url = Some(deck.url.clone());
                    run.source_path = None;
                    run.extracted_text = None;
                    run.summary = None;
                }
                self.events
                    .status(StatusMessage::info("Done! Opening presentation..."));
                self.events.send(ShellEvent::OpenResult(deck.url));
                self.events.send(ShellEvent::Selection(None));
                self.events.controls(ControlState::AWAITING_FILE);
                Stage::Succeeded
            }
            Err(e) => {
                error!(kind = ?e.kind(), "Run failed: {}", e);
                let message = e.user_message();
                {
                    let mut run = self.lock();
                    if !run.stage.can_advance_to(Stage::Failed) {
                        warn!("Failure reported from stage {:?}", run.stage);
                    }
                    run.stage = Stage::Failed;
                    run.extracted_text = None;
                    run.summary = None;
                    run.last_error = Some(RunFailure {
                        kind: e.kind(),
                        message: message.clone(),
                    });
                }
                self.events.status(StatusMessage::error(message));
                self.events.controls(ControlState::READY);
                Stage::Failed
            }
        }
    }
}
