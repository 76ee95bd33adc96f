//! Deck construction through the Google Slides REST API.
//!
//! Two calls per run: `presentations.create` with the summary title, then a
//! single `presentations.batchUpdate` that adds a title slide, one
//! title-and-body slide per key point, and removes the blank slide every new
//! presentation starts with (object id `p`).
//!
//! Object ids are deterministic and only need to be unique within the new
//! presentation.

use crate::config::SlidesConfig;
use crate::error::{sanitize_body, DeckError, DeckOperation};
use crate::output::{DeckResult, Summary};
use crate::pipeline::auth::AuthorizedContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Object id of the blank slide in a freshly created presentation.
pub const DEFAULT_SLIDE_ID: &str = "p";

const TITLE_SLIDE_ID: &str = "title_slide_01";
const TITLE_SLIDE_TITLE_ID: &str = "title_slide_title";
const TITLE_SLIDE_SUBTITLE_ID: &str = "title_slide_subtitle";

/// Creates a presentation from a summary.
#[async_trait]
pub trait DeckBuilder: Send + Sync {
    async fn build(
        &self,
        summary: &Summary,
        ctx: &AuthorizedContext,
    ) -> Result<DeckResult, DeckError>;
}

/// Browser URL of a presentation, for responses that omit `presentationUrl`.
pub fn presentation_url(presentation_id: &str) -> String {
    format!("https://docs.google.com/presentation/d/{presentation_id}/edit")
}

// ── batchUpdate request model ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlideRequest {
    CreateSlide(CreateSlide),
    InsertText(InsertText),
    DeleteObject(DeleteObject),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlide {
    pub object_id: String,
    pub slide_layout_reference: LayoutReference,
    pub placeholder_id_mappings: Vec<PlaceholderMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutReference {
    pub predefined_layout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderMapping {
    pub layout_placeholder: Placeholder,
    pub object_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placeholder {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertText {
    pub object_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteObject {
    pub object_id: String,
}

impl SlideRequest {
    fn create(object_id: String, layout: &str, placeholders: [(&str, String); 2]) -> Self {
        SlideRequest::CreateSlide(CreateSlide {
            object_id,
            slide_layout_reference: LayoutReference {
                predefined_layout: layout.to_string(),
            },
            placeholder_id_mappings: placeholders
                .into_iter()
                .map(|(kind, object_id)| PlaceholderMapping {
                    layout_placeholder: Placeholder {
                        kind: kind.to_string(),
                    },
                    object_id,
                })
                .collect(),
        })
    }

    fn insert(object_id: impl Into<String>, text: &str) -> Self {
        SlideRequest::InsertText(InsertText {
            object_id: object_id.into(),
            text: text.to_string(),
        })
    }
}

/// The full batch for `summary`: `2 + 3 * key_points + 1` requests.
///
/// The title slide maps both of its placeholders even though only the title
/// receives text; the layout rejects a partial mapping. Key point `i`
/// (1-based) lives on `content_slide_{i:02}`.
pub fn build_batch(summary: &Summary) -> Vec<SlideRequest> {
    let mut requests = Vec::with_capacity(3 + 3 * summary.key_points.len());

    requests.push(SlideRequest::create(
        TITLE_SLIDE_ID.to_string(),
        "TITLE_SLIDE",
        [
            ("CENTERED_TITLE", TITLE_SLIDE_TITLE_ID.to_string()),
            ("SUBTITLE", TITLE_SLIDE_SUBTITLE_ID.to_string()),
        ],
    ));
    requests.push(SlideRequest::insert(TITLE_SLIDE_TITLE_ID, &summary.title));

    for (i, point) in summary.key_points.iter().enumerate() {
        let n = i + 1;
        let title_id = format!("title_placeholder_{n:02}");
        let body_id = format!("body_placeholder_{n:02}");
        requests.push(SlideRequest::create(
            format!("content_slide_{n:02}"),
            "TITLE_AND_BODY",
            [("TITLE", title_id.clone()), ("BODY", body_id.clone())],
        ));
        requests.push(SlideRequest::insert(title_id, &point.slide_title));
        requests.push(SlideRequest::insert(body_id, &point.slide_body));
    }

    requests.push(SlideRequest::DeleteObject(DeleteObject {
        object_id: DEFAULT_SLIDE_ID.to_string(),
    }));
    requests
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPresentation {
    #[serde(default)]
    presentation_id: Option<String>,
    #[serde(default)]
    presentation_url: Option<String>,
}

#[derive(Serialize)]
struct BatchUpdateBody<'a> {
    requests: &'a [SlideRequest],
}

/// [`DeckBuilder`] that talks to the Slides REST API.
#[derive(Debug, Clone)]
pub struct SlidesDeckBuilder {
    base_url: String,
    timeout: Duration,
}

impl SlidesDeckBuilder {
    pub fn new(config: &SlidesConfig) -> Self {
        Self {
            base_url: config.slides_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        ctx: &AuthorizedContext,
        operation: DeckOperation,
        url: &str,
        body: &B,
    ) -> Result<String, DeckError> {
        debug!("{} → POST {}", operation, url);
        let response = ctx
            .client()
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| DeckError::Request {
                operation,
                detail: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| DeckError::Request {
            operation,
            detail: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(DeckError::Http {
                operation,
                status: status.as_u16(),
                body: sanitize_body(&text),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl DeckBuilder for SlidesDeckBuilder {
    async fn build(
        &self,
        summary: &Summary,
        ctx: &AuthorizedContext,
    ) -> Result<DeckResult, DeckError> {
        info!("Creating presentation \"{}\"", summary.title);
        let body = self
            .post(
                ctx,
                DeckOperation::Create,
                &format!("{}/v1/presentations", self.base_url),
                &serde_json::json!({ "title": summary.title }),
            )
            .await?;

        let created: CreatedPresentation =
            serde_json::from_str(&body).map_err(|e| DeckError::InvalidResponse {
                operation: DeckOperation::Create,
                detail: e.to_string(),
            })?;
        let presentation_id = created
            .presentation_id
            .filter(|id| !id.is_empty())
            .ok_or(DeckError::MissingPresentationId)?;
        info!("Presentation created with id {}", presentation_id);

        let requests = build_batch(summary);
        info!("Sending {} batch requests", requests.len());
        self.post(
            ctx,
            DeckOperation::BatchUpdate,
            &format!(
                "{}/v1/presentations/{}:batchUpdate",
                self.base_url, presentation_id
            ),
            &BatchUpdateBody {
                requests: &requests,
            },
        )
        .await?;

        let url = created
            .presentation_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| presentation_url(&presentation_id));
        Ok(DeckResult {
            presentation_id,
            url,
        })
    }
}
