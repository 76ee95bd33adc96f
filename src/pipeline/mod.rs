//! Pipeline stages for PDF-to-deck generation.
//!
//! Each submodule implements exactly one step behind a trait, so the
//! controller can be driven by stubs in tests and each production
//! implementation can be exercised on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ auth ──▶ synthesize ──▶ deck
//! (path)    (pdfium)    (OAuth)  (Gemini JSON)  (Slides batch)
//! ```
//!
//! 1. [`input`]: validate the selected path is a readable PDF
//! 2. [`extract`]: page text via pdfium in `spawn_blocking`, whitespace
//!    collapsed to one line
//! 3. [`auth`]: stored token, refresh, or loopback consent
//! 4. [`synthesize`]: one `generateContent` call returning the summary JSON
//! 5. [`deck`]: `presentations.create` then one `batchUpdate`

pub mod auth;
pub mod deck;
pub mod extract;
pub mod input;
pub mod synthesize;

use crate::config::SlidesConfig;
use crate::error::AuthError;
use std::sync::Arc;

pub use auth::{AuthorizedContext, CredentialBroker, OAuthBroker};
pub use deck::{DeckBuilder, SlidesDeckBuilder};
pub use extract::{PdfiumExtractor, TextExtractor};
pub use synthesize::{ContentSynthesizer, VertexSynthesizer};

/// The four stage implementations a controller drives.
#[derive(Clone)]
pub struct Stages {
    pub extractor: Arc<dyn TextExtractor>,
    pub broker: Arc<dyn CredentialBroker>,
    pub synthesizer: Arc<dyn ContentSynthesizer>,
    pub deck: Arc<dyn DeckBuilder>,
}

impl Stages {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        broker: Arc<dyn CredentialBroker>,
        synthesizer: Arc<dyn ContentSynthesizer>,
        deck: Arc<dyn DeckBuilder>,
    ) -> Self {
        Self {
            extractor,
            broker,
            synthesizer,
            deck,
        }
    }

    /// The production stages, configured from `config`.
    pub fn production(config: &SlidesConfig) -> Result<Self, AuthError> {
        Ok(Self::new(
            Arc::new(PdfiumExtractor::new(config.pdfium_lib_path.clone())),
            Arc::new(OAuthBroker::new(config)?),
            Arc::new(VertexSynthesizer::new(config)),
            Arc::new(SlidesDeckBuilder::new(config)),
        ))
    }
}
