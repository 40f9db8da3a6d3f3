use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SellerClient, SellerError};
use crate::models::{comma_f64, lenient_u64};

const PRODUCT_INFO_PATH: &str = "/v2/product/info/list";
pub(crate) const PRODUCT_INFO_LIMIT: usize = 1000;

#[derive(Serialize)]
struct ProductInfoRequest<'a> {
    sku: &'a [u64],
}

#[derive(Deserialize)]
struct ProductInfoResponse {
    result: ProductInfoResult,
}

#[derive(Deserialize)]
struct ProductInfoResult {
    items: Vec<ProductInfo>,
}

/// Catalog metadata used to backfill sale rows that arrived without an
/// offer identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInfo {
    #[serde(deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(default)]
    pub offer_id: String,
    #[serde(deserialize_with = "comma_f64", default)]
    pub price: f64,
}

impl SellerClient {
    /// Batch product lookup by stock-keeping id. The endpoint caps each call
    /// at 1000 ids and this method refuses larger inputs rather than
    /// splitting silently.
    pub async fn get_products_by_sku(&self, skus: &[u64]) -> Result<Vec<ProductInfo>, SellerError> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }
        if skus.len() > PRODUCT_INFO_LIMIT {
            return Err(SellerError::Validation(format!(
                "{} skus exceed the per-call limit of {PRODUCT_INFO_LIMIT}",
                skus.len()
            )));
        }

        let body = ProductInfoRequest { sku: skus };
        let response: ProductInfoResponse = self.post_json(PRODUCT_INFO_PATH, &body).await?;
        debug!(
            target = "ozon.seller",
            requested = skus.len(),
            found = response.result.items.len(),
            "product metadata looked up"
        );
        Ok(response.result.items)
    }
}
