//! Seller-API client: FBO posting history and product metadata lookups.
//!
//! Authentication is static header pairs (`Client-Id` / `Api-Key`), no token
//! lifecycle. All endpoints are POST-with-JSON; the posting list paginates
//! with offset/limit.

mod postings;
mod products;

pub use products::ProductInfo;

use chrono_tz::Tz;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SellerError {
    #[error("seller api transport error: {0}")]
    Transport(String),
    #[error("seller api error: {0}")]
    Api(String),
    #[error("seller api response malformed: {0}")]
    Parse(String),
    #[error("invalid seller request: {0}")]
    Validation(String),
}

pub struct SellerClient {
    http: Client,
    base_url: String,
    client_id: String,
    api_key: String,
    zone: Tz,
}

impl SellerClient {
    pub fn new(
        client_id: impl Into<String>,
        api_key: impl Into<String>,
        zone: Tz,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: crate::http::build_client(),
            base_url: base_url.into(),
            client_id: client_id.into(),
            api_key: api_key.into(),
            zone,
        }
    }

    pub(crate) fn zone(&self) -> Tz {
        self.zone
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, SellerError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Client-Id", &self.client_id)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| SellerError::Transport(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| SellerError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(SellerError::Api(format!("HTTP {status}: {text}")));
        }
        serde_json::from_str(&text).map_err(|err| SellerError::Parse(format!("{err}: {text}")))
    }
}
