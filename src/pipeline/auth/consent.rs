//! Interactive consent via a loopback redirect.
//!
//! A small axum server is bound on `127.0.0.1` with an OS-assigned port, the
//! consent screen is opened in the user's browser, and the first request
//! carrying our `state` is taken as the answer. Connections are served
//! concurrently, so an idle browser preconnect cannot hold up the callback.
//! The wait is bounded by a caller-supplied timeout but can still take
//! minutes of wall-clock time: never call this from a rendering context.
//!
//! PKCE (S256) protects the authorization code; `state` protects against
//! stray or forged callbacks.

use crate::browser::UrlOpener;
use crate::error::AuthError;
use crate::pipeline::auth::token::ClientSecret;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
<p>You can close this window and return to the application.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Authorization was not completed.</h3>\
<p>Return to the application for details.</p></body></html>";

/// PKCE verifier and its S256 challenge.
#[derive(Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        // Two v4 UUIDs give 64 hex chars, inside the 43–128 range RFC 7636 allows.
        let verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    pub fn challenge_for(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }
}

/// What the consent flow hands back for the code exchange.
pub struct ConsentGrant {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

/// Build the consent screen URL.
pub fn authorization_url(
    client: &ClientSecret,
    scopes: &[String],
    redirect_uri: &str,
    state: &str,
    code_challenge: &str,
) -> Result<Url, AuthError> {
    let mut url = Url::parse(&client.auth_uri)
        .map_err(|e| AuthError::Consent(format!("invalid auth_uri '{}': {e}", client.auth_uri)))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &client.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state)
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    Ok(url)
}

/// Outcome of one request hitting the loopback listener.
#[derive(Debug, PartialEq, Eq)]
pub enum Callback {
    Code(String),
    Denied(String),
    /// Not ours (wrong state, no parameters); keep waiting.
    Ignored,
}

/// Interpret the query parameters of a callback request.
pub fn parse_callback(params: &HashMap<String, String>, expected_state: &str) -> Callback {
    let code = params.get("code");
    let error = params.get("error");

    if params.get("state").map(String::as_str) != Some(expected_state) {
        if code.is_some() || error.is_some() {
            warn!("Ignoring consent callback with mismatched state");
        }
        return Callback::Ignored;
    }
    match (code, error) {
        (_, Some(err)) => Callback::Denied(err.clone()),
        (Some(code), None) if !code.is_empty() => Callback::Code(code.clone()),
        _ => Callback::Ignored,
    }
}

type Reply = Result<String, AuthError>;

/// Shared between the callback handler and [`run`].
#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    reply: Arc<Mutex<Option<oneshot::Sender<Reply>>>>,
}

async fn handle_callback(
    State(cb): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    let (outcome, page) = match parse_callback(&params, &cb.expected_state) {
        Callback::Code(code) => (Ok(code), SUCCESS_PAGE),
        Callback::Denied(reason) => (Err(AuthError::ConsentDenied(reason)), FAILURE_PAGE),
        Callback::Ignored => return (StatusCode::NOT_FOUND, Html(FAILURE_PAGE)),
    };

    let sender = cb.reply.lock().unwrap_or_else(|e| e.into_inner()).take();
    match sender {
        Some(tx) => {
            let _ = tx.send(outcome);
            (StatusCode::OK, Html(page))
        }
        // A second valid callback after the first was taken.
        None => (StatusCode::GONE, Html(FAILURE_PAGE)),
    }
}

/// Run the consent flow and return the authorization code.
pub async fn run(
    client: &ClientSecret,
    scopes: &[String],
    timeout: Duration,
    opener: &dyn UrlOpener,
) -> Result<ConsentGrant, AuthError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| AuthError::Consent(format!("cannot bind loopback listener: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| AuthError::Consent(e.to_string()))?
        .port();
    let redirect_uri = format!("http://127.0.0.1:{port}/");

    let pkce = Pkce::generate();
    let state = uuid::Uuid::new_v4().simple().to_string();
    let url = authorization_url(client, scopes, &redirect_uri, &state, &pkce.challenge)?;

    let (reply_tx, reply_rx) = oneshot::channel();
    let app = Router::new()
        .route("/", get(handle_callback))
        .with_state(CallbackState {
            expected_state: Arc::from(state.as_str()),
            reply: Arc::new(Mutex::new(Some(reply_tx))),
        });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        if let Err(e) = server.await {
            warn!("Consent listener stopped: {}", e);
        }
    });
    debug!("Consent listener on {}", redirect_uri);

    info!("Opening consent screen. If no browser appears, visit:\n{}", url);
    if let Err(e) = opener.open(url.as_str()) {
        warn!("Could not launch a browser ({}); open the URL above manually", e);
    }

    let outcome = tokio::time::timeout(timeout, reply_rx).await;
    let _ = shutdown_tx.send(());

    let code = match outcome {
        Err(_) => {
            return Err(AuthError::ConsentTimeout {
                secs: timeout.as_secs(),
            })
        }
        Ok(Err(_)) => {
            return Err(AuthError::Consent(
                "loopback listener stopped before a callback arrived".into(),
            ))
        }
        Ok(Ok(reply)) => reply?,
    };

    info!("Consent granted");
    Ok(ConsentGrant {
        code,
        code_verifier: pkce.verifier,
        redirect_uri,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::auth::token::{DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};

    fn client() -> ClientSecret {
        ClientSecret {
            client_id: "cid.apps".into(),
            client_secret: "cs".into(),
            auth_uri: DEFAULT_AUTH_URI.into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
        }
    }

    #[test]
    fn pkce_known_vector() {
        // RFC 7636 appendix B
        assert_eq!(
            Pkce::challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
        let p = Pkce::generate();
        assert_eq!(p.verifier.len(), 64);
        assert_eq!(p.challenge, Pkce::challenge_for(&p.verifier));
    }

    #[test]
    fn auth_url_carries_consent_parameters() {
        let url = authorization_url(
            &client(),
            &["a".to_string(), "b".to_string()],
            "http://127.0.0.1:5555/",
            "st",
            "ch",
        )
        .unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["scope"], "a b");
        assert_eq!(pairs["prompt"], "consent");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:5555/");
    }

    fn params(query: &str) -> HashMap<String, String> {
        Url::parse(&format!("http://127.0.0.1/?{query}"))
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }

    #[test]
    fn callback_parsing() {
        assert_eq!(
            parse_callback(&params("state=s1&code=4%2F0abc"), "s1"),
            Callback::Code("4/0abc".into())
        );
        assert_eq!(
            parse_callback(&params("error=access_denied&state=s1"), "s1"),
            Callback::Denied("access_denied".into())
        );
        assert_eq!(
            parse_callback(&params("state=other&code=x"), "s1"),
            Callback::Ignored
        );
        assert_eq!(parse_callback(&params("state=s1"), "s1"), Callback::Ignored);
        assert_eq!(parse_callback(&HashMap::new(), "s1"), Callback::Ignored);
    }

    /// Plays the browser: follows the consent URL straight to the redirect.
    ///
    /// With `preconnect`, an idle connection is opened first and held for the
    /// rest of the test, the way browsers warm up a socket before navigating.
    #[derive(Default)]
    struct RedirectingOpener {
        seen: Mutex<Option<String>>,
        deny: bool,
        wrong_state_first: bool,
        preconnect: bool,
    }

    impl UrlOpener for RedirectingOpener {
        fn open(&self, url: &str) -> std::io::Result<()> {
            *self.seen.lock().unwrap() = Some(url.to_string());
            let parsed = Url::parse(url).unwrap();
            let pairs: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
            let redirect = pairs["redirect_uri"].clone();
            let state = pairs["state"].clone();
            let deny = self.deny;
            let wrong_state_first = self.wrong_state_first;
            let preconnect = self.preconnect;
            tokio::spawn(async move {
                let _idle = if preconnect {
                    let addr = redirect
                        .trim_start_matches("http://")
                        .trim_end_matches('/')
                        .to_string();
                    let socket = tokio::net::TcpStream::connect(addr).await.unwrap();
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Some(socket)
                } else {
                    None
                };
                if wrong_state_first {
                    let stray = reqwest::get(format!("{redirect}?code=stale&state=old"))
                        .await
                        .unwrap();
                    assert_eq!(stray.status(), reqwest::StatusCode::NOT_FOUND);
                }
                let query = if deny {
                    format!("error=access_denied&state={state}")
                } else {
                    format!("code=the-code&state={state}")
                };
                let _ = reqwest::get(format!("{redirect}?{query}")).await;
                tokio::time::sleep(Duration::from_secs(10)).await;
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn loopback_flow_receives_code() {
        let opener = RedirectingOpener::default();
        let grant = run(&client(), &["s".into()], Duration::from_secs(5), &opener)
            .await
            .unwrap();
        assert_eq!(grant.code, "the-code");
        assert_eq!(grant.code_verifier.len(), 64);
        assert!(grant.redirect_uri.starts_with("http://127.0.0.1:"));
        assert!(opener.seen.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn loopback_flow_reports_denial() {
        let opener = RedirectingOpener {
            deny: true,
            ..Default::default()
        };
        let err = run(&client(), &["s".into()], Duration::from_secs(5), &opener)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::ConsentDenied(ref r) if r == "access_denied"));
    }

    #[tokio::test]
    async fn loopback_flow_skips_stale_state() {
        let opener = RedirectingOpener {
            wrong_state_first: true,
            ..Default::default()
        };
        let grant = run(&client(), &["s".into()], Duration::from_secs(5), &opener)
            .await
            .unwrap();
        assert_eq!(grant.code, "the-code");
    }

    #[tokio::test]
    async fn idle_connection_does_not_block_callback() {
        let opener = RedirectingOpener {
            preconnect: true,
            ..Default::default()
        };
        let started = std::time::Instant::now();
        let grant = run(&client(), &["s".into()], Duration::from_secs(3), &opener)
            .await
            .unwrap();
        assert_eq!(grant.code, "the-code");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn loopback_flow_times_out() {
        let err = run(
            &client(),
            &["s".into()],
            Duration::from_millis(100),
            &crate::browser::NoBrowser,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AuthError::ConsentTimeout { .. }));
    }
}
