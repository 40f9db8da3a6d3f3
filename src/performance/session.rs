use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

const TOKEN_PATH: &str = "/api/client/token";

/// Shaved off the declared token lifetime so a request never races the
/// upstream expiry boundary.
const EXPIRY_SAFETY_MARGIN_SECS: u64 = 3;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing performance api credentials in env")]
    MissingCredentials,
    #[error("token exchange failed: HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("token exchange request failed: {0}")]
    Request(String),
    #[error("token exchange returned malformed payload: {0}")]
    Parse(String),
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
}

#[derive(Clone)]
struct SessionToken {
    /// Full `Authorization` header value, e.g. "Bearer <token>".
    header: String,
    expires_at: Instant,
}

impl SessionToken {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Owns the client-credentials identity and the current short-lived bearer
/// token for the performance API.
///
/// All token state sits behind one async mutex, which doubles as the
/// single-flight gate: concurrent requests that observe an expired token
/// queue here, the first one runs the exchange, the rest reuse its result.
pub struct CredentialSession {
    client_id: String,
    client_secret: String,
    state: Mutex<Option<SessionToken>>,
}

impl CredentialSession {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            state: Mutex::new(None),
        }
    }

    /// Current `Authorization` header value, exchanging credentials first if
    /// the token is absent or past its expiry instant.
    pub async fn bearer(&self, http: &Client, base_url: &str) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.as_ref() {
            if !token.is_expired() {
                return Ok(token.header.clone());
            }
        }
        let token = self.exchange(http, base_url).await?;
        let header = token.header.clone();
        *state = Some(token);
        Ok(header)
    }

    /// Forced refresh after an unauthorized response. If another task already
    /// replaced `stale` while this one was in flight, the newer token is
    /// returned without a second exchange.
    pub async fn reauthorize(
        &self,
        http: &Client,
        base_url: &str,
        stale: &str,
    ) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.as_ref() {
            if token.header != stale && !token.is_expired() {
                return Ok(token.header.clone());
            }
        }
        let token = self.exchange(http, base_url).await?;
        let header = token.header.clone();
        *state = Some(token);
        Ok(header)
    }

    async fn exchange(&self, http: &Client, base_url: &str) -> Result<SessionToken, AuthError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let body = TokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            grant_type: "client_credentials",
        };
        let response = http
            .post(format!("{base_url}{TOKEN_PATH}"))
            .json(&body)
            .send()
            .await
            .map_err(|err| AuthError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Status(response.status()));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|err| AuthError::Parse(err.to_string()))?;

        let lifetime =
            Duration::from_secs(payload.expires_in.saturating_sub(EXPIRY_SAFETY_MARGIN_SECS));
        debug!(
            target = "ozon.performance",
            expires_in = payload.expires_in,
            "session token refreshed"
        );

        Ok(SessionToken {
            header: format!("{} {}", payload.token_type, payload.access_token),
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_body(token: &str) -> serde_json::Value {
        serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 1800,
        })
    }

    #[tokio::test]
    async fn exchanges_credentials_for_bearer_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/client/token"))
            .and(body_partial_json(serde_json::json!({
                "client_id": "cid",
                "grant_type": "client_credentials",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1")))
            .expect(1)
            .mount(&server)
            .await;

        let session = CredentialSession::new("cid", "secret");
        let http = build_client();

        let header = session.bearer(&http, &server.uri()).await.expect("bearer");
        assert_eq!(header, "Bearer tok-1");

        // Second call reuses the cached token; expect(1) above enforces it.
        let again = session.bearer(&http, &server.uri()).await.expect("bearer");
        assert_eq!(again, "Bearer tok-1");
    }

    #[tokio::test]
    async fn non_success_exchange_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/client/token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let session = CredentialSession::new("cid", "secret");
        let err = session
            .bearer(&build_client(), &server.uri())
            .await
            .expect_err("should fail");
        assert!(matches!(err, AuthError::Status(status) if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/client/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"nope": true})),
            )
            .mount(&server)
            .await;

        let session = CredentialSession::new("cid", "secret");
        let err = session
            .bearer(&build_client(), &server.uri())
            .await
            .expect_err("should fail");
        assert!(matches!(err, AuthError::Parse(_)));
    }

    #[tokio::test]
    async fn empty_credentials_fail_without_a_request() {
        let session = CredentialSession::new("", "");
        let err = session
            .bearer(&build_client(), "http://localhost:9")
            .await
            .expect_err("should fail");
        assert!(matches!(err, AuthError::MissingCredentials));
    }

    #[tokio::test]
    async fn reauthorize_skips_exchange_when_token_already_replaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/client/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(1)
            .mount(&server)
            .await;

        let session = CredentialSession::new("cid", "secret");
        let http = build_client();

        let current = session.bearer(&http, &server.uri()).await.expect("bearer");
        assert_eq!(current, "Bearer fresh");

        // A caller holding an older header observes the replacement and does
        // not trigger a second exchange.
        let refreshed = session
            .reauthorize(&http, &server.uri(), "Bearer stale")
            .await
            .expect("reauthorize");
        assert_eq!(refreshed, "Bearer fresh");
    }
}
