use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::PerformanceError;
use super::session::CredentialSession;

/// Auth-retry wrapper around the raw HTTP client.
///
/// Every performance-API request goes through here: an expired token is
/// refreshed before sending (single-flight via the session mutex), and an
/// unauthorized/forbidden response triggers exactly one re-authorization and
/// one replay. Everything else, server errors included, passes through to
/// the caller untouched.
pub struct AuthTransport {
    http: Client,
    base_url: String,
    session: CredentialSession,
}

impl AuthTransport {
    pub fn new(http: Client, base_url: impl Into<String>, session: CredentialSession) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session,
        }
    }

    pub async fn get(&self, path_and_query: &str) -> Result<Response, PerformanceError> {
        self.send(Method::GET, path_and_query, None).await
    }

    pub async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, PerformanceError> {
        let body = serde_json::to_value(body)
            .map_err(|err| PerformanceError::Parse(format!("serialize request body: {err}")))?;
        self.send(Method::POST, path, Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, PerformanceError> {
        let bearer = self.session.bearer(&self.http, &self.base_url).await?;
        let response = self.dispatch(&method, path, body.as_ref(), &bearer).await?;
        if !denied(response.status()) {
            return Ok(response);
        }

        debug!(
            target = "ozon.performance",
            %method,
            path,
            status = response.status().as_u16(),
            "unauthorized response, refreshing token and replaying once"
        );
        let refreshed = self
            .session
            .reauthorize(&self.http, &self.base_url, &bearer)
            .await?;
        let replay = self
            .dispatch(&method, path, body.as_ref(), &refreshed)
            .await?;
        if denied(replay.status()) {
            return Err(PerformanceError::Unauthorized(replay.status()));
        }
        Ok(replay)
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        bearer: &str,
    ) -> Result<Response, PerformanceError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, bearer);
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|err| PerformanceError::Transport(err.to_string()))
    }
}

fn denied(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use wiremock::matchers::{header, method as http_method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_response(token: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 1800,
        }))
    }

    fn transport(server: &MockServer) -> AuthTransport {
        AuthTransport::new(
            build_client(),
            server.uri(),
            CredentialSession::new("cid", "secret"),
        )
    }

    #[tokio::test]
    async fn refreshes_once_and_replays_once_on_unauthorized() {
        let server = MockServer::start().await;

        // Two exchanges total: the initial one and the refresh after the 401.
        Mock::given(http_method("POST"))
            .and(url_path("/api/client/token"))
            .respond_with(token_response("tok"))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(http_method("GET"))
            .and(url_path("/api/client/campaign"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(http_method("GET"))
            .and(url_path("/api/client/campaign"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(&server)
            .get("/api/client/campaign")
            .await
            .expect("replayed request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn second_unauthorized_surfaces_the_error() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(url_path("/api/client/token"))
            .respond_with(token_response("tok"))
            .expect(2)
            .mount(&server)
            .await;

        // Always denied: exactly one replay is attempted, then the failure
        // is surfaced.
        Mock::given(http_method("GET"))
            .and(url_path("/api/client/campaign"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let err = transport(&server)
            .get("/api/client/campaign")
            .await
            .expect_err("should surface the second 401");
        assert!(
            matches!(err, PerformanceError::Unauthorized(status) if status == StatusCode::UNAUTHORIZED)
        );
    }

    #[tokio::test]
    async fn server_errors_pass_through() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(url_path("/api/client/token"))
            .respond_with(token_response("tok"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(http_method("GET"))
            .and(url_path("/api/client/campaign"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(&server)
            .get("/api/client/campaign")
            .await
            .expect("5xx is the caller's concern");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_token_exchange() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(url_path("/api/client/token"))
            .respond_with(token_response("tok"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(http_method("GET"))
            .and(url_path("/api/client/campaign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [],
            })))
            .mount(&server)
            .await;

        let transport = transport(&server);
        let (a, b, c) = tokio::join!(
            transport.get("/api/client/campaign"),
            transport.get("/api/client/campaign"),
            transport.get("/api/client/campaign"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
    }
}
