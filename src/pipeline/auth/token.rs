//! OAuth token persistence and token-endpoint calls.
//!
//! The token file uses the "authorized user" JSON layout Google's client
//! libraries write, so an existing `token.json` keeps working. Writes go
//! through a temp file in the same directory followed by a rename, so a crash
//! mid-write never leaves a truncated token behind.

use crate::error::{sanitize_body, AuthError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// A persisted OAuth credential.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// The access token.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl StoredToken {
    /// Usable as-is at `now`. A token without an expiry never expires.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(exp) => exp - ChronoDuration::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Build a stored token from a token-endpoint response.
    ///
    /// Refresh responses usually omit `refresh_token`; the previous one is
    /// kept in that case.
    pub fn from_response(
        response: TokenResponse,
        client: &ClientSecret,
        previous_refresh: Option<String>,
        scopes: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        let scopes = match response.scope {
            Some(ref s) if !s.trim().is_empty() => {
                s.split_whitespace().map(str::to_string).collect()
            }
            _ => scopes.to_vec(),
        };
        Self {
            token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            token_uri: client.token_uri.clone(),
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            scopes,
            expiry: response
                .expires_in
                .map(|secs| now + ChronoDuration::seconds(secs as i64)),
        }
    }

    /// The client credentials this token was issued to.
    fn client(&self) -> ClientSecret {
        ClientSecret {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: self.token_uri.clone(),
        }
    }
}

/// Response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth client registration, as downloaded from the cloud console.
#[derive(Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecret")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Deserialize)]
struct ClientSecretFile {
    #[serde(default)]
    installed: Option<ClientSecret>,
    #[serde(default)]
    web: Option<ClientSecret>,
}

/// Read the operator-provided client secret file.
pub fn load_client_secret(path: &Path) -> Result<ClientSecret, AuthError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AuthError::MissingClientSecret {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(AuthError::InvalidClientSecret {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })
        }
    };

    let file: ClientSecretFile =
        serde_json::from_str(&raw).map_err(|e| AuthError::InvalidClientSecret {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    file.installed
        .or(file.web)
        .ok_or_else(|| AuthError::InvalidClientSecret {
            path: path.to_path_buf(),
            detail: "expected an \"installed\" or \"web\" client section".to_string(),
        })
}

/// File-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted token, if any.
    ///
    /// An unreadable or malformed file is reported and treated as absent so
    /// the consent flow can replace it.
    pub fn load(&self) -> Option<StoredToken> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No token file at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Could not read token file {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring malformed token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Atomically write `token` to the store.
    pub fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let store_err = |detail: String| AuthError::TokenStore {
            path: self.path.clone(),
            detail,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| store_err(e.to_string()))?;

        let json = serde_json::to_vec_pretty(token).map_err(|e| store_err(e.to_string()))?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(&dir).map_err(|e| store_err(e.to_string()))?;
        tmp.write_all(&json).map_err(|e| store_err(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| store_err(e.error.to_string()))?;

        info!("Token saved to {}", self.path.display());
        Ok(())
    }
}

async fn post_token_form(
    http: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let response = http
        .post(token_uri)
        .form(params)
        .send()
        .await
        .map_err(|e| AuthError::Request(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Http {
            status,
            body: sanitize_body(&body),
        });
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::Request(format!("unreadable token response: {e}")))
}

/// Exchange a refresh token for a new access token.
pub async fn refresh(http: &Client, token: &StoredToken) -> Result<StoredToken, AuthError> {
    let refresh_token = token
        .refresh_token
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| AuthError::Refresh("no refresh token stored".to_string()))?;

    info!("Refreshing access token");
    let params = [
        ("client_id", token.client_id.as_str()),
        ("client_secret", token.client_secret.as_str()),
        ("refresh_token", refresh_token.expose_secret()),
        ("grant_type", "refresh_token"),
    ];

    let response = post_token_form(http, &token.token_uri, &params)
        .await
        .map_err(|e| AuthError::Refresh(e.to_string()))?;

    Ok(StoredToken::from_response(
        response,
        &token.client(),
        token.refresh_token.clone(),
        &token.scopes,
        Utc::now(),
    ))
}

/// Exchange an authorization code (with its PKCE verifier) for tokens.
pub async fn exchange_code(
    http: &Client,
    client: &ClientSecret,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
    scopes: &[String],
) -> Result<StoredToken, AuthError> {
    let params = [
        ("client_id", client.client_id.as_str()),
        ("client_secret", client.client_secret.as_str()),
        ("code", code),
        ("code_verifier", code_verifier),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];

    let response = post_token_form(http, &client.token_uri, &params).await?;
    if response.refresh_token.is_none() {
        warn!("Token endpoint issued no refresh token; consent will be needed again on expiry");
    }
    Ok(StoredToken::from_response(response, client, None, scopes, Utc::now()))
}
