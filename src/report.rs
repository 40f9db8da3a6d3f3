//! Advertising-spend share report: joins performance statistics with seller
//! sales on the stock-keeping id and derives spend-to-profit ratios.

use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{ReconciledRow, ReportRow, SaleRecord};
use crate::performance::{PerformanceClient, PerformanceError};
use crate::seller::{SellerClient, SellerError};

pub const BASE_CURRENCY: &str = "RUB";
pub const TOTAL_LABEL: &str = "TOTAL";

const PRODUCT_LOOKUP_CHUNK: usize = 1000;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Performance(#[from] PerformanceError),
    #[error(transparent)]
    Seller(#[from] SellerError),
}

pub struct DrrReport {
    since: NaiveDate,
    to: NaiveDate,
}

#[derive(Default)]
struct PerformanceAggregate {
    campaigns: Vec<u64>,
    views: i64,
    clicks: i64,
    money_spent: f64,
    bid_sum: f64,
    orders: i64,
    orders_money: f64,
    models: i64,
    models_money: f64,
    rows: u32,
}

#[derive(Default)]
struct SalesAggregate {
    offer_id: Option<String>,
    currency_code: Option<String>,
    quantity: i64,
    price: f64,
    profit: f64,
}

struct MergedRow {
    sku: u64,
    offer_id: Option<String>,
    quantity: i64,
    price: f64,
    profit: f64,
    currency_code: Option<String>,
    money_spent: f64,
    avg_bid: f64,
    orders: i64,
    orders_money: f64,
    models: i64,
    models_money: f64,
}

impl DrrReport {
    pub fn new(since: NaiveDate, to: NaiveDate) -> Self {
        Self { since, to }
    }

    /// Runs the full reconciliation: both sources fetched concurrently,
    /// joined, backfilled from the product catalog, and finalized with a
    /// trailing total row.
    pub async fn process(
        &self,
        seller: &SellerClient,
        performance: &PerformanceClient,
    ) -> Result<Vec<ReconciledRow>, ReportError> {
        let (sales, statistics) = tokio::try_join!(
            async { seller.get_sales(self.since, self.to).await.map_err(ReportError::from) },
            async {
                performance
                    .get_statistics_report(self.since, self.to)
                    .await
                    .map_err(ReportError::from)
            },
        )?;
        info!(
            target = "ozon.report",
            sales = sales.len(),
            statistics = statistics.len(),
            "sources fetched"
        );

        let mut merged = merge(aggregate_sales(sales), aggregate_performance(statistics));
        self.backfill_offers(seller, &mut merged).await?;
        Ok(finalize(merged))
    }

    /// Performance-only rows carry no catalog fields; fill offer id, name
    /// and price from the product metadata endpoint.
    async fn backfill_offers(
        &self,
        seller: &SellerClient,
        merged: &mut [MergedRow],
    ) -> Result<(), ReportError> {
        let missing: Vec<u64> = merged
            .iter()
            .filter(|row| row.offer_id.is_none())
            .map(|row| row.sku)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        debug!(target = "ozon.report", skus = missing.len(), "backfilling offer ids");

        let mut catalog = HashMap::new();
        for chunk in missing.chunks(PRODUCT_LOOKUP_CHUNK) {
            for product in seller.get_products_by_sku(chunk).await? {
                catalog.insert(product.id, product);
            }
        }

        for row in merged.iter_mut().filter(|row| row.offer_id.is_none()) {
            if let Some(product) = catalog.get(&row.sku) {
                row.offer_id = Some(product.offer_id.clone());
                if row.price == 0.0 {
                    row.price = product.price;
                }
            }
        }
        Ok(())
    }
}

fn aggregate_performance(rows: Vec<ReportRow>) -> HashMap<u64, PerformanceAggregate> {
    let mut by_sku: HashMap<u64, PerformanceAggregate> = HashMap::new();
    for row in rows {
        let entry = by_sku.entry(row.sku).or_default();
        if !entry.campaigns.contains(&row.campaign_id) {
            entry.campaigns.push(row.campaign_id);
        }
        entry.views += row.views;
        entry.clicks += row.clicks;
        entry.money_spent += row.money_spent;
        entry.bid_sum += row.avg_bid;
        entry.orders += row.orders;
        entry.orders_money += row.orders_money;
        entry.models += row.models;
        entry.models_money += row.models_money;
        entry.rows += 1;
    }
    by_sku
}

fn aggregate_sales(records: Vec<SaleRecord>) -> HashMap<u64, SalesAggregate> {
    let mut by_sku: HashMap<u64, SalesAggregate> = HashMap::new();
    for record in records {
        let entry = by_sku.entry(record.sku).or_default();
        if entry.offer_id.is_none() {
            entry.offer_id = record.offer_id;
        }
        if entry.currency_code.is_none() {
            entry.currency_code = record.currency_code;
        }
        entry.quantity += record.quantity;
        entry.profit += record.profit;
        entry.price = entry.price.max(record.price);
    }
    by_sku
}

/// Outer join on sku: rows present on only one side keep zeros for the
/// other side's measures.
fn merge(
    sales: HashMap<u64, SalesAggregate>,
    mut performance: HashMap<u64, PerformanceAggregate>,
) -> Vec<MergedRow> {
    let mut merged = Vec::with_capacity(sales.len() + performance.len());
    for (sku, sale) in sales {
        let stats = performance.remove(&sku).unwrap_or_default();
        merged.push(merged_row(sku, Some(sale), stats));
    }
    for (sku, stats) in performance {
        debug!(
            target = "ozon.report",
            sku,
            campaigns = ?stats.campaigns,
            views = stats.views,
            clicks = stats.clicks,
            "advertised without recorded sales"
        );
        merged.push(merged_row(sku, None, stats));
    }
    merged
}

fn merged_row(sku: u64, sale: Option<SalesAggregate>, stats: PerformanceAggregate) -> MergedRow {
    let avg_bid = if stats.rows > 0 {
        stats.bid_sum / f64::from(stats.rows)
    } else {
        0.0
    };
    let sale = sale.unwrap_or_default();
    MergedRow {
        sku,
        offer_id: sale.offer_id,
        quantity: sale.quantity,
        price: sale.price,
        profit: sale.profit,
        currency_code: sale.currency_code,
        money_spent: stats.money_spent,
        avg_bid,
        orders: stats.orders,
        orders_money: stats.orders_money,
        models: stats.models,
        models_money: stats.models_money,
    }
}

/// Derives the spend ratio, orders by offer id and appends the total row.
fn finalize(merged: Vec<MergedRow>) -> Vec<ReconciledRow> {
    let mut rows: Vec<ReconciledRow> = merged
        .into_iter()
        .map(|row| {
            let offer_id = row.offer_id.unwrap_or_else(|| row.sku.to_string());
            let currency_code = row
                .currency_code
                .unwrap_or_else(|| BASE_CURRENCY.to_string());
            ReconciledRow {
                offer_id,
                currency_code,
                quantity: row.quantity,
                price: row.price,
                profit: row.profit,
                money_spent: row.money_spent,
                drr: spend_ratio(row.money_spent, row.profit),
                avg_bid: row.avg_bid,
                orders: row.orders,
                orders_money: row.orders_money,
                models: row.models,
                models_money: row.models_money,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.offer_id.cmp(&b.offer_id));

    let total_quantity: i64 = rows.iter().map(|row| row.quantity).sum();
    let total_profit: f64 = rows.iter().map(|row| row.profit).sum();
    let total_spent: f64 = rows.iter().map(|row| row.money_spent).sum();
    rows.push(ReconciledRow {
        offer_id: TOTAL_LABEL.to_string(),
        currency_code: BASE_CURRENCY.to_string(),
        quantity: total_quantity,
        price: 0.0,
        profit: total_profit,
        money_spent: total_spent,
        drr: spend_ratio(total_spent, total_profit),
        avg_bid: 0.0,
        orders: 0,
        orders_money: 0.0,
        models: 0,
        models_money: 0.0,
    });
    rows
}

fn spend_ratio(spent: f64, profit: f64) -> f64 {
    let ratio = spent / profit;
    if ratio.is_finite() { ratio } else { 1.0 }
}
