//! Controller scenarios with stub stages.
//!
//! No network, no pdfium: every stage is a stub that records how often it
//! was called, so the tests can check both the final state and which stages
//! ran.

use async_trait::async_trait;
use autoslides::progress::{self, ControlState};
use autoslides::{
    AuthError, AuthorizedContext, ContentSynthesizer, CredentialBroker, DeckBuilder, DeckError,
    DeckResult, ExtractError, FailureKind, KeyPoint, PipelineController, ShellEvent,
    ShellReceiver, SlidesConfig, Stage, Stages, Summary, SynthesisError, TextExtractor,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Barrier, Notify};
use tracing_subscriber::EnvFilter;

// ── Stubs ────────────────────────────────────────────────────────────────────

struct StubExtractor {
    text: String,
    calls: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
    /// When set, extraction waits here until notified.
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_path_buf());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.text.clone())
    }
}

struct StubBroker {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialBroker for StubBroker {
    async fn acquire(&self) -> Result<AuthorizedContext, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::ConsentDenied("access_denied".into()));
        }
        AuthorizedContext::new("stub-token".to_string().into())
    }
}

enum SynthReply {
    Summary(Summary),
    Invalid,
}

struct StubSynthesizer {
    reply: SynthReply,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl ContentSynthesizer for StubSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _ctx: &AuthorizedContext,
    ) -> Result<Summary, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        match &self.reply {
            SynthReply::Summary(s) => Ok(s.clone()),
            SynthReply::Invalid => Err(SynthesisError::InvalidJson("expected value".into())),
        }
    }
}

struct StubDeck {
    calls: AtomicUsize,
}

#[async_trait]
impl DeckBuilder for StubDeck {
    async fn build(
        &self,
        summary: &Summary,
        _ctx: &AuthorizedContext,
    ) -> Result<DeckResult, DeckError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(summary.key_points.len(), 3);
        Ok(DeckResult {
            presentation_id: n.to_string(),
            url: format!("https://slides.example/{n}"),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

fn three_point_summary() -> Summary {
    Summary::new(
        "T",
        vec![
            KeyPoint::new("A", "a"),
            KeyPoint::new("B", "b"),
            KeyPoint::new("C", "c"),
        ],
    )
}

struct Harness {
    extractor: Arc<StubExtractor>,
    broker: Arc<StubBroker>,
    synth: Arc<StubSynthesizer>,
    deck: Arc<StubDeck>,
    controller: PipelineController,
    rx: ShellReceiver,
}

struct Setup {
    text: String,
    auth_fails: bool,
    reply: SynthReply,
    gate: Option<Arc<Notify>>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            text: "Alpha. Beta.".into(),
            auth_fails: false,
            reply: SynthReply::Summary(three_point_summary()),
            gate: None,
        }
    }
}

/// Route the controller's logs to the test output (`RUST_LOG=debug`).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness(setup: Setup) -> Harness {
    init_tracing();
    let extractor = Arc::new(StubExtractor {
        text: setup.text,
        calls: AtomicUsize::new(0),
        paths: Mutex::new(Vec::new()),
        gate: setup.gate,
    });
    let broker = Arc::new(StubBroker {
        fail: setup.auth_fails,
        calls: AtomicUsize::new(0),
    });
    let synth = Arc::new(StubSynthesizer {
        reply: setup.reply,
        calls: AtomicUsize::new(0),
        seen: Mutex::new(Vec::new()),
    });
    let deck = Arc::new(StubDeck {
        calls: AtomicUsize::new(0),
    });

    let stages = Stages::new(
        extractor.clone(),
        broker.clone(),
        synth.clone(),
        deck.clone(),
    );
    let (tx, rx) = progress::channel();
    let controller = PipelineController::new(stages, &SlidesConfig::default(), tx);
    Harness {
        extractor,
        broker,
        synth,
        deck,
        controller,
        rx,
    }
}

fn drain(rx: &mut ShellReceiver) -> Vec<ShellEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

fn stage_events(events: &[ShellEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            ShellEvent::Stage { index, total, .. } => {
                assert_eq!(*total, 4);
                Some(*index)
            }
            _ => None,
        })
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn happy_path_reports_four_stages_and_opens_result() {
    let mut h = harness(Setup::default());

    let run = h.controller.start("doc.pdf").expect("idle controller accepts");
    assert_eq!(run.wait().await, Stage::Succeeded);

    let snap = h.controller.snapshot();
    assert_eq!(snap.stage, Stage::Succeeded);
    assert_eq!(snap.result_url.as_deref(), Some("https://slides.example/1"));
    assert!(snap.last_error.is_none());

    let events = drain(&mut h.rx);
    assert_eq!(stage_events(&events), vec![1, 2, 3, 4]);
    assert!(events.contains(&ShellEvent::OpenResult("https://slides.example/1".into())));
    assert_eq!(
        events.last(),
        Some(&ShellEvent::Controls(ControlState::AWAITING_FILE))
    );
    assert_eq!(h.synth.seen.lock().unwrap().as_slice(), ["Alpha. Beta."]);
}

#[tokio::test]
async fn auth_failure_stops_before_synthesis() {
    let mut h = harness(Setup {
        auth_fails: true,
        ..Setup::default()
    });

    let run = h.controller.start("doc.pdf").unwrap();
    assert_eq!(run.wait().await, Stage::Failed);

    let snap = h.controller.snapshot();
    let failure = snap.last_error.expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::Auth);
    assert!(failure.message.contains("terminal"));
    // retained for a retry
    assert_eq!(snap.source_path.as_deref(), Some(Path::new("doc.pdf")));

    assert_eq!(h.broker.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.synth.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.deck.calls.load(Ordering::SeqCst), 0);

    let events = drain(&mut h.rx);
    assert_eq!(stage_events(&events), vec![1, 2]);
    assert!(events
        .iter()
        .any(|e| e.status().is_some_and(|s| s.is_error)));
    assert_eq!(events.last(), Some(&ShellEvent::Controls(ControlState::READY)));
}

#[tokio::test]
async fn blank_text_fails_without_authenticating() {
    let h = harness(Setup {
        text: " \n\t ".into(),
        ..Setup::default()
    });

    let run = h.controller.start("scan.pdf").unwrap();
    assert_eq!(run.wait().await, Stage::Failed);

    let snap = h.controller.snapshot();
    assert_eq!(snap.last_error.unwrap().kind, FailureKind::Document);
    assert_eq!(snap.source_path.as_deref(), Some(Path::new("scan.pdf")));
    assert_eq!(h.broker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_synthesis_skips_deck() {
    let h = harness(Setup {
        reply: SynthReply::Invalid,
        ..Setup::default()
    });

    let run = h.controller.start("doc.pdf").unwrap();
    assert_eq!(run.wait().await, Stage::Failed);
    assert_eq!(
        h.controller.snapshot().last_error.unwrap().kind,
        FailureKind::Synthesis
    );
    assert_eq!(h.deck.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn second_start_while_running_is_a_no_op() {
    let gate = Arc::new(Notify::new());
    let mut h = harness(Setup {
        gate: Some(gate.clone()),
        ..Setup::default()
    });

    let run = h.controller.start("first.pdf").unwrap();
    assert!(h.controller.snapshot().stage.is_active());

    assert!(h.controller.start("second.pdf").is_none());
    assert!(h.controller.generate().is_none());
    assert!(!h.controller.select("third.pdf"));
    assert_eq!(
        h.controller.snapshot().source_path.as_deref(),
        Some(Path::new("first.pdf"))
    );

    gate.notify_one();
    assert_eq!(run.wait().await, Stage::Succeeded);
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.deck.calls.load(Ordering::SeqCst), 1);
    assert_eq!(stage_events(&drain(&mut h.rx)), vec![1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_run_the_accepted_callers_file() {
    const CALLERS: usize = 8;
    let gate = Arc::new(Notify::new());
    let h = harness(Setup {
        gate: Some(gate.clone()),
        ..Setup::default()
    });

    let barrier = Arc::new(Barrier::new(CALLERS));
    let callers: Vec<_> = (0..CALLERS)
        .map(|i| {
            let controller = h.controller.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                let path = PathBuf::from(format!("doc{i}.pdf"));
                barrier.wait().await;
                let run = controller.start(&path);
                (path, run)
            })
        })
        .collect();

    let mut accepted = Vec::new();
    for caller in callers {
        let (path, run) = caller.await.unwrap();
        if let Some(run) = run {
            accepted.push((path, run));
        }
    }
    assert_eq!(accepted.len(), 1, "exactly one start wins");
    let (path, run) = accepted.pop().unwrap();
    assert_eq!(h.controller.snapshot().source_path.as_ref(), Some(&path));

    gate.notify_one();
    assert_eq!(run.wait().await, Stage::Succeeded);
    assert_eq!(h.extractor.paths.lock().unwrap().as_slice(), [path]);
}

#[tokio::test]
async fn success_clears_run_and_allows_a_fresh_run() {
    let mut h = harness(Setup::default());

    assert_eq!(
        h.controller.start("one.pdf").unwrap().wait().await,
        Stage::Succeeded
    );
    let snap = h.controller.snapshot();
    assert!(snap.source_path.is_none());
    assert!(snap.extracted_text.is_none());
    assert!(snap.summary.is_none());

    // generate is locked until a new file is chosen
    assert!(h.controller.generate().is_none());
    drain(&mut h.rx);

    assert_eq!(
        h.controller.start("two.pdf").unwrap().wait().await,
        Stage::Succeeded
    );
    assert_eq!(stage_events(&drain(&mut h.rx)), vec![1, 2, 3, 4]);
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.controller.snapshot().result_url.as_deref(),
        Some("https://slides.example/2")
    );
}

#[tokio::test]
async fn failed_run_can_be_retried_with_generate() {
    let h = harness(Setup {
        auth_fails: true,
        ..Setup::default()
    });
    assert_eq!(h.controller.start("doc.pdf").unwrap().wait().await, Stage::Failed);

    let retry = h.controller.generate().expect("selection retained");
    assert_eq!(retry.wait().await, Stage::Failed);
    assert_eq!(h.broker.calls.load(Ordering::SeqCst), 2);

    assert!(h.controller.reset());
    assert_eq!(h.controller.snapshot().stage, Stage::Idle);
    assert!(h.controller.snapshot().last_error.is_none());
}

#[tokio::test]
async fn prompt_text_is_capped_at_8000_chars() {
    let long: String = "é".repeat(9_000);
    let h = harness(Setup {
        text: long.clone(),
        ..Setup::default()
    });

    assert_eq!(
        h.controller.start("big.pdf").unwrap().wait().await,
        Stage::Succeeded
    );
    let seen = h.synth.seen.lock().unwrap();
    assert_eq!(seen[0].chars().count(), 8_000);
    assert!(long.starts_with(seen[0].as_str()));
}

#[tokio::test]
async fn non_pdf_selection_is_rejected() {
    let mut h = harness(Setup::default());
    assert!(h.controller.start("notes.txt").is_none());
    assert_eq!(h.controller.snapshot().stage, Stage::Idle);
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);

    let events = drain(&mut h.rx);
    assert!(events[0].status().is_some_and(|s| s.is_error));
}
