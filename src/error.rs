//! Error types for the autoslides library.
//!
//! Each pipeline stage owns a narrow error enum describing how *that* stage
//! can fail ([`ExtractError`], [`AuthError`], [`SynthesisError`],
//! [`DeckError`]). The controller folds them into a [`PipelineError`], which
//! carries exactly one of five [`FailureKind`]s and knows the single status
//! line the shell should show for it.
//!
//! The shell never receives a structured error: it gets
//! [`PipelineError::user_message`]. The full source chain is logged.

use std::path::PathBuf;
use thiserror::Error;

/// Maximum length for HTTP error bodies kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncate a remote error body so token fragments or huge HTML pages do not
/// flood the log.
pub fn sanitize_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((idx, _)) => format!("{}… (truncated)", &body[..idx]),
        None => body.to_string(),
    }
}

// ── Stage errors ─────────────────────────────────────────────────────────

/// Failures of the text-extraction stage.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF file not found: '{path}'")]
    NotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists but does not start with the `%PDF` magic.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Zero pages, or pages without any extractable text.
    #[error("PDF '{path}' contains no extractable text")]
    Empty { path: PathBuf },

    #[error("PDF '{path}' is corrupt or malformed: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    #[error("Failed to bind to the pdfium library: {0}")]
    Binding(String),

    #[error("Unexpected extraction error: {0}")]
    Internal(String),
}

/// Failures while obtaining an access credential.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OAuth client secret file not found: '{path}'\nDownload it from the cloud console and place it there.")]
    MissingClientSecret { path: PathBuf },

    #[error("OAuth client secret file '{path}' is invalid: {detail}")]
    InvalidClientSecret { path: PathBuf, detail: String },

    #[error("Could not read or write the token file '{path}': {detail}")]
    TokenStore { path: PathBuf, detail: String },

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("The user declined the consent request ({0})")]
    ConsentDenied(String),

    #[error("No consent callback received within {secs}s")]
    ConsentTimeout { secs: u64 },

    #[error("Consent flow failed: {0}")]
    Consent(String),

    #[error("Token endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Could not reach the token endpoint: {0}")]
    Request(String),

    #[error("Access token cannot be used as a header value: {0}")]
    InvalidToken(String),
}

/// Failures of the generative-AI call.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Configuration error, fatal for this stage only.
    #[error("No cloud project id configured; the AI endpoint URL cannot be built")]
    MissingProjectId,

    #[error("AI request failed: {0}")]
    Request(String),

    #[error("AI request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("AI API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response had no `candidates[0].content.parts[0].text`.
    #[error("AI response did not have the expected format: {0}")]
    MissingContent(String),

    #[error("AI response text is not valid summary JSON: {0}")]
    InvalidJson(String),

    /// Parsed fine but violates the summary contract (e.g. key point count).
    #[error("AI summary violates the data contract: {0}")]
    Contract(String),
}

/// Which presentation API call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckOperation {
    Create,
    BatchUpdate,
}

impl std::fmt::Display for DeckOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeckOperation::Create => f.write_str("presentations.create"),
            DeckOperation::BatchUpdate => f.write_str("presentations.batchUpdate"),
        }
    }
}

/// Failures while building the slide deck.
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("{operation} request failed: {detail}")]
    Request {
        operation: DeckOperation,
        detail: String,
    },

    #[error("{operation} returned HTTP {status}: {body}")]
    Http {
        operation: DeckOperation,
        status: u16,
        body: String,
    },

    #[error("presentations.create response has no presentationId")]
    MissingPresentationId,

    #[error("{operation} returned an unreadable body: {detail}")]
    InvalidResponse {
        operation: DeckOperation,
        detail: String,
    },
}

// ── Pipeline error ───────────────────────────────────────────────────────

/// Coarse classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// Empty, unreadable or corrupt input document.
    Document,
    /// Consent, refresh or credential configuration failure.
    Auth,
    /// HTTP or schema failure from the AI call.
    Synthesis,
    /// HTTP or schema failure from the presentation API.
    Deck,
    /// Anything else (task panic, illegal state transition).
    Unexpected,
}

/// The error a pipeline run terminates with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("document stage failed: {0}")]
    Document(#[source] ExtractError),

    #[error("authentication stage failed: {0}")]
    Auth(#[source] AuthError),

    #[error("synthesis stage failed: {0}")]
    Synthesis(#[source] SynthesisError),

    #[error("deck stage failed: {0}")]
    Deck(#[source] DeckError),

    #[error("unexpected pipeline error: {0}")]
    Unexpected(String),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Document(_) => FailureKind::Document,
            PipelineError::Auth(_) => FailureKind::Auth,
            PipelineError::Synthesis(_) => FailureKind::Synthesis,
            PipelineError::Deck(_) => FailureKind::Deck,
            PipelineError::Unexpected(_) => FailureKind::Unexpected,
        }
    }

    /// The one-line status shown to the user.
    ///
    /// The consent flow runs in the browser, so auth failures point at the
    /// diagnostic log rather than trying to explain what went wrong there.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Document(_) => {
                "Error: could not extract text from the PDF. Is it empty or a scanned image?"
                    .to_string()
            }
            PipelineError::Auth(_) => {
                "Authentication error. Check the terminal output for details.".to_string()
            }
            PipelineError::Synthesis(_) => {
                "Error: the AI API did not return usable content.".to_string()
            }
            PipelineError::Deck(_) => {
                "Error: could not create the presentation in Google Slides.".to_string()
            }
            PipelineError::Unexpected(detail) => format!("Error in the process: {detail}"),
        }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(e: ExtractError) -> Self {
        PipelineError::Document(e)
    }
}

impl From<AuthError> for PipelineError {
    fn from(e: AuthError) -> Self {
        PipelineError::Auth(e)
    }
}

impl From<SynthesisError> for PipelineError {
    fn from(e: SynthesisError) -> Self {
        PipelineError::Synthesis(e)
    }
}

impl From<DeckError> for PipelineError {
    fn from(e: DeckError) -> Self {
        PipelineError::Deck(e)
    }
}

/// Builder validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
