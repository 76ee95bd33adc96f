//! Credential acquisition for the cloud APIs.
//!
//! [`OAuthBroker`] resolves a usable access token in this order:
//!
//! 1. the token cached in memory from an earlier run, if still valid;
//! 2. the persisted token file, if still valid;
//! 3. a refresh of the persisted token, if it carries a refresh token;
//! 4. the interactive loopback consent flow.
//!
//! Steps 3 and 4 persist the new token before returning. A failed refresh is
//! not fatal: it falls through to consent.

pub mod consent;
pub mod token;

use crate::browser::{SystemBrowser, UrlOpener};
use crate::config::SlidesConfig;
use crate::error::AuthError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use token::{StoredToken, TokenStore};

/// Timeout for token-endpoint calls.
const TOKEN_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// An access token plus the headers and HTTP client that carry it.
///
/// Cloning is cheap; the stages downstream of authentication share one.
#[derive(Clone)]
pub struct AuthorizedContext {
    token: SecretString,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl AuthorizedContext {
    pub fn new(token: SecretString) -> Result<Self, AuthError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers.clone())
            .build()
            .map_err(|e| AuthError::Request(e.to_string()))?;

        Ok(Self {
            token,
            headers,
            client,
        })
    }

    /// `Authorization: Bearer …` and `Content-Type: application/json`.
    pub fn auth_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// HTTP client that sends [`auth_headers`](Self::auth_headers) on every request.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }
}

impl fmt::Debug for AuthorizedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedContext")
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Produces an [`AuthorizedContext`], interactively if it must.
///
/// May block for minutes waiting on the user; callers run it off any UI
/// thread.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn acquire(&self) -> Result<AuthorizedContext, AuthError>;
}

/// Installed-app OAuth with a persisted token file.
pub struct OAuthBroker {
    client_secret_path: PathBuf,
    store: TokenStore,
    scopes: Vec<String>,
    consent_timeout: Duration,
    http: reqwest::Client,
    opener: Arc<dyn UrlOpener>,
    cached: Mutex<Option<StoredToken>>,
}

impl OAuthBroker {
    pub fn new(config: &SlidesConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(TOKEN_HTTP_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Request(e.to_string()))?;

        Ok(Self {
            client_secret_path: config.client_secret_path.clone(),
            store: TokenStore::new(config.token_path.clone()),
            scopes: config.scopes.clone(),
            consent_timeout: Duration::from_secs(config.consent_timeout_secs),
            http,
            opener: Arc::new(SystemBrowser),
            cached: Mutex::new(None),
        })
    }

    /// Replace how the consent URL is shown to the user.
    pub fn with_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    async fn resolve(&self) -> Result<StoredToken, AuthError> {
        if let Some(stored) = self.store.load() {
            if stored.is_valid() {
                debug!("Using stored token from {}", self.store.path().display());
                return Ok(stored);
            }
            if stored.is_refreshable() {
                match token::refresh(&self.http, &stored).await {
                    Ok(fresh) => {
                        self.store.save(&fresh)?;
                        return Ok(fresh);
                    }
                    Err(e) => warn!("{}; falling back to interactive consent", e),
                }
            } else {
                info!("Stored token expired and cannot be refreshed");
            }
        }

        let client = token::load_client_secret(&self.client_secret_path)?;
        let grant = consent::run(
            &client,
            &self.scopes,
            self.consent_timeout,
            self.opener.as_ref(),
        )
        .await?;
        let fresh = token::exchange_code(
            &self.http,
            &client,
            &grant.code,
            &grant.code_verifier,
            &grant.redirect_uri,
            &self.scopes,
        )
        .await?;
        self.store.save(&fresh)?;
        Ok(fresh)
    }
}

#[async_trait]
impl CredentialBroker for OAuthBroker {
    async fn acquire(&self) -> Result<AuthorizedContext, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(t) = cached.as_ref().filter(|t| t.is_valid()) {
            return AuthorizedContext::new(SecretString::from(t.token.clone()));
        }

        let fresh = self.resolve().await?;
        let ctx = AuthorizedContext::new(SecretString::from(fresh.token.clone()))?;
        *cached = Some(fresh);
        info!("Authenticated");
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    #[test]
    fn context_headers() {
        let ctx = AuthorizedContext::new(SecretString::from("ya29.tok".to_string())).unwrap();
        let auth = ctx.auth_headers().get(AUTHORIZATION).unwrap();
        assert!(auth.is_sensitive());
        assert_eq!(auth.to_str().unwrap(), "Bearer ya29.tok");
        assert_eq!(
            ctx.auth_headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(!format!("{ctx:?}").contains("ya29"));
    }

    #[test]
    fn context_rejects_header_breaking_token() {
        let err = AuthorizedContext::new(SecretString::from("bad\ntoken".to_string())).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    fn broker_in(dir: &std::path::Path) -> OAuthBroker {
        let config = SlidesConfig::builder()
            .client_secret_path(dir.join("credentials.json"))
            .token_path(dir.join("token.json"))
            .consent_timeout_secs(1)
            .build()
            .unwrap();
        OAuthBroker::new(&config)
            .unwrap()
            .with_opener(Arc::new(crate::browser::NoBrowser))
    }

    #[tokio::test]
    async fn valid_stored_token_needs_no_network() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker_in(dir.path());
        broker
            .store()
            .save(&StoredToken {
                token: "ya29.stored".into(),
                refresh_token: None,
                token_uri: token::DEFAULT_TOKEN_URI.into(),
                client_id: "cid".into(),
                client_secret: "cs".into(),
                scopes: vec![],
                expiry: Some(Utc::now() + ChronoDuration::hours(1)),
            })
            .unwrap();

        let ctx = broker.acquire().await.unwrap();
        assert_eq!(ctx.token().expose_secret(), "ya29.stored");

        // cached: works even after the file disappears
        std::fs::remove_file(dir.path().join("token.json")).unwrap();
        assert!(broker.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn missing_client_secret_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = broker_in(dir.path()).acquire().await.unwrap_err();
        assert!(matches!(err, AuthError::MissingClientSecret { .. }));
    }
}
