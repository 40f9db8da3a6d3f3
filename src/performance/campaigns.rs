use serde::Deserialize;
use tracing::debug;

use super::{PerformanceClient, PerformanceError, read_json};
use crate::models::lenient_u64;

const CAMPAIGN_PATH: &str = "/api/client/campaign";

/// Campaign descriptor as returned by the advertising API. Persisting the
/// catalog is the database collaborator's job; this type just carries it
/// across the boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    pub state: String,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
}

#[derive(Deserialize)]
struct CampaignList {
    list: Vec<Campaign>,
}

#[derive(Deserialize)]
struct CampaignObjects {
    list: Vec<CampaignObject>,
}

#[derive(Deserialize)]
struct CampaignObject {
    #[serde(deserialize_with = "lenient_u64")]
    id: u64,
}

impl PerformanceClient {
    /// All SKU-type advertising campaigns on the account.
    pub async fn get_campaigns(&self) -> Result<Vec<Campaign>, PerformanceError> {
        let response = self
            .transport()
            .get(&format!("{CAMPAIGN_PATH}?advObjectType=SKU"))
            .await?;
        let payload: CampaignList = read_json(response).await?;
        debug!(
            target = "ozon.performance",
            count = payload.list.len(),
            "campaigns loaded"
        );
        Ok(payload.list)
    }

    /// Product ids advertised by one campaign.
    pub async fn get_campaign_products(
        &self,
        campaign_id: u64,
    ) -> Result<Vec<u64>, PerformanceError> {
        let response = self
            .transport()
            .get(&format!("{CAMPAIGN_PATH}/{campaign_id}/objects"))
            .await?;
        let payload: CampaignObjects = read_json(response).await?;
        Ok(payload.list.into_iter().map(|object| object.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Moscow;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/client/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "token_type": "Bearer",
                "expires_in": 1800,
            })))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> PerformanceClient {
        PerformanceClient::new("cid", "secret", Moscow, server.uri())
    }

    #[tokio::test]
    async fn lists_sku_campaigns() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/client/campaign"))
            .and(query_param("advObjectType", "SKU"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [
                    {"id": "101", "title": "Shoes", "state": "CAMPAIGN_STATE_RUNNING"},
                    {"id": "102", "state": "CAMPAIGN_STATE_STOPPED", "toDate": "2024-09-01"},
                ],
            })))
            .mount(&server)
            .await;

        let campaigns = client(&server).get_campaigns().await.expect("campaigns");
        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[0].id, 101);
        assert_eq!(campaigns[0].title.as_deref(), Some("Shoes"));
        assert_eq!(campaigns[1].to_date.as_deref(), Some("2024-09-01"));
    }

    #[tokio::test]
    async fn lists_campaign_products() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/client/campaign/101/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [{"id": "555"}, {"id": "556"}],
            })))
            .mount(&server)
            .await;

        let products = client(&server)
            .get_campaign_products(101)
            .await
            .expect("products");
        assert_eq!(products, vec![555, 556]);
    }

    #[tokio::test]
    async fn missing_list_field_is_a_parse_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/client/campaign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = client(&server).get_campaigns().await.expect_err("parse");
        assert!(matches!(err, PerformanceError::Parse(_)));
    }
}
