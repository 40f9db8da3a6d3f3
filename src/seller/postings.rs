use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{SellerClient, SellerError};
use crate::models::{SaleRecord, comma_f64, lenient_u64, local_day_bounds};
use crate::pagination::fetch_all_pages;

const POSTING_LIST_PATH: &str = "/v2/posting/fbo/list";
pub(crate) const POSTING_PAGE_SIZE: usize = 1000;

#[derive(Serialize)]
struct PostingListRequest {
    dir: &'static str,
    filter: PostingFilter,
    limit: usize,
    offset: usize,
    translit: bool,
    with: PostingWith,
}

#[derive(Serialize)]
struct PostingFilter {
    since: String,
    status: &'static str,
    to: String,
}

#[derive(Serialize)]
struct PostingWith {
    analytics_data: bool,
    financial_data: bool,
}

#[derive(Deserialize)]
struct PostingListResponse {
    result: Option<Vec<Posting>>,
}

#[derive(Deserialize)]
pub(crate) struct Posting {
    #[serde(default)]
    products: Vec<PostingProduct>,
    #[serde(default)]
    financial_data: Option<FinancialData>,
}

#[derive(Deserialize)]
struct PostingProduct {
    #[serde(deserialize_with = "lenient_u64")]
    sku: u64,
    #[serde(default)]
    offer_id: Option<String>,
    quantity: i64,
    #[serde(deserialize_with = "comma_f64")]
    price: f64,
    #[serde(default)]
    currency_code: Option<String>,
}

#[derive(Deserialize)]
struct FinancialData {
    #[serde(default)]
    products: Vec<FinancialProduct>,
}

#[derive(Deserialize)]
struct FinancialProduct {
    #[serde(deserialize_with = "lenient_u64")]
    product_id: u64,
    payout: f64,
}

impl SellerClient {
    /// All FBO postings whose creation falls inside the local-day bounds of
    /// the range, walked page by page until a short page.
    pub async fn get_posting_fbo_list(
        &self,
        since: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Posting>, SellerError> {
        let (since_ts, to_ts) =
            local_day_bounds(self.zone(), since, to).map_err(SellerError::Validation)?;

        let postings = fetch_all_pages(POSTING_PAGE_SIZE, |offset, limit| {
            let since_ts = since_ts.clone();
            let to_ts = to_ts.clone();
            async move {
                let body = PostingListRequest {
                    dir: "ASC",
                    filter: PostingFilter {
                        since: since_ts,
                        status: "",
                        to: to_ts,
                    },
                    limit,
                    offset,
                    translit: true,
                    with: PostingWith {
                        analytics_data: true,
                        financial_data: true,
                    },
                };
                let page: PostingListResponse = self.post_json(POSTING_LIST_PATH, &body).await?;
                page.result.ok_or_else(|| {
                    SellerError::Parse("posting list response missing result".to_string())
                })
            }
        })
        .await?;

        info!(
            target = "ozon.seller",
            postings = postings.len(),
            %since,
            %to,
            "posting history fetched"
        );
        Ok(postings)
    }

    /// Per-product sale records for the range. Profit is the financial-data
    /// payout when the posting carries one for that product, otherwise the
    /// listed price times quantity.
    pub async fn get_sales(
        &self,
        since: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SaleRecord>, SellerError> {
        let postings = self.get_posting_fbo_list(since, to).await?;
        Ok(sale_records(postings))
    }
}

fn sale_records(postings: Vec<Posting>) -> Vec<SaleRecord> {
    let mut records = Vec::new();
    for posting in postings {
        let payouts = posting.financial_data.map(|data| data.products);
        for product in posting.products {
            let payout = payouts.as_deref().and_then(|products| {
                products
                    .iter()
                    .find(|entry| entry.product_id == product.sku)
                    .map(|entry| entry.payout)
            });
            let profit = payout.unwrap_or(product.price * product.quantity as f64);
            records.push(SaleRecord {
                sku: product.sku,
                offer_id: product.offer_id,
                quantity: product.quantity,
                price: product.price,
                currency_code: product.currency_code,
                profit,
            });
        }
    }
    records
}
