//! Summary generation via the Vertex AI `generateContent` endpoint.
//!
//! One POST per run, no retries. The model is asked for JSON directly
//! (`responseMimeType: application/json`); a stray markdown fence around the
//! JSON is still tolerated.

use crate::config::SlidesConfig;
use crate::error::{sanitize_body, SynthesisError};
use crate::output::Summary;
use crate::pipeline::auth::AuthorizedContext;
use crate::prompts::summary_prompt;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Turns document text into a validated [`Summary`].
#[async_trait]
pub trait ContentSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        ctx: &AuthorizedContext,
    ) -> Result<Summary, SynthesisError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// ```` ```json ... ``` ```` around the whole reply.
static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```(?:json|JSON)?\s*\n?(.*?)\n?\s*```\s*$").unwrap());

/// Remove a markdown code fence wrapping the model's reply, if present.
pub fn strip_json_fence(text: &str) -> &str {
    match RE_JSON_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => text.trim(),
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a raw response body.
pub fn response_text(body: &str) -> Result<String, SynthesisError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| SynthesisError::MissingContent(format!("unreadable response: {e}")))?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            SynthesisError::MissingContent("no candidates[0].content.parts[0].text".to_string())
        })
}

/// Decode and validate the model's JSON answer.
pub fn parse_summary(text: &str) -> Result<Summary, SynthesisError> {
    let summary: Summary = serde_json::from_str(strip_json_fence(text))
        .map_err(|e| SynthesisError::InvalidJson(e.to_string()))?;
    summary.validate().map_err(SynthesisError::Contract)?;
    Ok(summary)
}

/// [`ContentSynthesizer`] that calls a Gemini model on Vertex AI.
#[derive(Debug, Clone)]
pub struct VertexSynthesizer {
    endpoint: Option<String>,
    temperature: f32,
    max_output_tokens: u32,
    timeout: Duration,
}

impl VertexSynthesizer {
    pub fn new(config: &SlidesConfig) -> Self {
        Self {
            endpoint: config.ai_endpoint(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    pub fn build_request(&self, text: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(summary_prompt(text)),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl ContentSynthesizer for VertexSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        ctx: &AuthorizedContext,
    ) -> Result<Summary, SynthesisError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(SynthesisError::MissingProjectId)?;

        let start = Instant::now();
        debug!("POST {} ({} chars of document text)", endpoint, text.chars().count());

        let response = ctx
            .client()
            .post(endpoint)
            .headers(ctx.auth_headers().clone())
            .timeout(self.timeout)
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout {
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    SynthesisError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(SynthesisError::Http {
                status: status.as_u16(),
                body: sanitize_body(&body),
            });
        }

        let summary = parse_summary(&response_text(&body)?)?;
        info!(
            "Summary received in {:?}: \"{}\" with {} key points",
            start.elapsed(),
            summary.title,
            summary.key_points.len()
        );
        Ok(summary)
    }
}
