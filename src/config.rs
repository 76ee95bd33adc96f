//! Configuration for the PDF-to-deck pipeline.
//!
//! Everything the stages need from the outside world (project id, credential
//! file locations, endpoint bases, limits) lives in [`SlidesConfig`]. It is
//! built once at startup and passed by reference into the stage
//! constructors; nothing inside the library reads the process environment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// OAuth scopes requested by default: slide editing plus the cloud-platform
/// scope the generative endpoint accepts.
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/presentations",
    "https://www.googleapis.com/auth/cloud-platform",
];

/// Configuration for a PDF-to-deck run.
///
/// Built via [`SlidesConfig::builder()`] or [`SlidesConfig::default()`].
///
/// # Example
/// ```rust
/// use autoslides::SlidesConfig;
///
/// let config = SlidesConfig::builder()
///     .project_id("my-project")
///     .model("gemini-2.5-pro")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_prompt_chars, 8000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidesConfig {
    /// Cloud project id used in the AI endpoint URL. Only the synthesis stage
    /// needs it; a missing id fails that stage, not startup.
    pub project_id: Option<String>,

    /// Endpoint location segment. Default: `"global"`.
    pub location: String,

    /// Generative model id. Default: `"gemini-2.5-pro"`.
    pub model: String,

    /// Base URL of the generative AI API.
    pub ai_base_url: String,

    /// Base URL of the presentation API.
    pub slides_base_url: String,

    /// OAuth client secret JSON, provided by the operator.
    pub client_secret_path: PathBuf,

    /// Persisted OAuth token, created on first consent and rewritten on refresh.
    pub token_path: PathBuf,

    pub scopes: Vec<String>,

    /// Prefix of the extracted text sent to the model, in characters. Default: 8000.
    pub max_prompt_chars: usize,

    /// Sampling temperature. Default: 0.5.
    pub temperature: f32,

    /// Output token ceiling for the summary. Default: 8192.
    pub max_output_tokens: u32,

    /// Per-request timeout for the AI and presentation APIs. Default: 90.
    pub api_timeout_secs: u64,

    /// How long the consent flow waits for the browser callback. Default: 300.
    pub consent_timeout_secs: u64,

    /// Explicit pdfium shared library; system lookup when `None`.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for SlidesConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: "global".to_string(),
            model: "gemini-2.5-pro".to_string(),
            ai_base_url: "https://aiplatform.googleapis.com".to_string(),
            slides_base_url: "https://slides.googleapis.com".to_string(),
            client_secret_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            max_prompt_chars: 8000,
            temperature: 0.5,
            max_output_tokens: 8192,
            api_timeout_secs: 90,
            consent_timeout_secs: 300,
            pdfium_lib_path: None,
        }
    }
}

impl SlidesConfig {
    /// Create a new builder for `SlidesConfig`.
    pub fn builder() -> SlidesConfigBuilder {
        SlidesConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full `generateContent` URL for the configured model.
    pub fn ai_endpoint(&self) -> Option<String> {
        let project = self.project_id.as_deref().filter(|p| !p.trim().is_empty())?;
        Some(format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.ai_base_url.trim_end_matches('/'),
            project,
            self.location,
            self.model
        ))
    }
}

/// Builder for [`SlidesConfig`].
#[derive(Debug)]
pub struct SlidesConfigBuilder {
    config: SlidesConfig,
}

impl SlidesConfigBuilder {
    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.config.project_id = Some(id.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = location.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn ai_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.ai_base_url = url.into();
        self
    }

    pub fn slides_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.slides_base_url = url.into();
        self
    }

    pub fn client_secret_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.client_secret_path = path.into();
        self
    }

    pub fn token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.token_path = path.into();
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.config.max_prompt_chars = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn consent_timeout_secs(mut self, secs: u64) -> Self {
        self.config.consent_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SlidesConfig, ConfigError> {
        let c = &self.config;
        if c.max_prompt_chars == 0 {
            return Err(ConfigError::Invalid(
                "max_prompt_chars must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ConfigError::Invalid("api_timeout_secs must be ≥ 1".into()));
        }
        if c.scopes.is_empty() {
            return Err(ConfigError::Invalid("at least one OAuth scope is required".into()));
        }
        for (name, url) in [("ai_base_url", &c.ai_base_url), ("slides_base_url", &c.slides_base_url)] {
            if reqwest::Url::parse(url).is_err() {
                return Err(ConfigError::Invalid(format!("{name} is not a valid URL: {url}")));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_contract() {
        let c = SlidesConfig::default();
        assert_eq!(c.max_prompt_chars, 8000);
        assert_eq!(c.max_output_tokens, 8192);
        assert!((c.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(c.scopes.len(), 2);
    }

    #[test]
    fn endpoint_requires_project() {
        let c = SlidesConfig::default();
        assert!(c.ai_endpoint().is_none());

        let c = SlidesConfig::builder().project_id("   ").build().unwrap();
        assert!(c.ai_endpoint().is_none());

        let c = SlidesConfig::builder()
            .project_id("demo-123")
            .ai_base_url("http://localhost:9000/")
            .build()
            .unwrap();
        assert_eq!(
            c.ai_endpoint().as_deref(),
            Some("http://localhost:9000/v1/projects/demo-123/locations/global/publishers/google/models/gemini-2.5-pro:generateContent")
        );
    }

    #[test]
    fn build_rejects_bad_values() {
        assert!(SlidesConfig::builder().max_prompt_chars(0).build().is_err());
        assert!(SlidesConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(SlidesConfig::builder()
            .scopes(Vec::<String>::new())
            .build()
            .is_err());
        assert!(SlidesConfig::builder()
            .slides_base_url("not a url")
            .build()
            .is_err());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = SlidesConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
