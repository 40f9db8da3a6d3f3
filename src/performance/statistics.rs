use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{MAX_CAMPAIGNS, PerformanceClient, PerformanceError, read_json};
use crate::models::{ReportRow, comma_f64, lenient_i64, lenient_u64};

const STATISTICS_PATH: &str = "/api/client/statistics/json";
const STATUS_PATH: &str = "/api/client/statistics";
const REPORT_PATH: &str = "/api/client/statistics/report";
const DAILY_PATH: &str = "/api/client/statistics/daily/json";

/// Stable fragment of the upstream "only one active report job" error
/// message. Matched as a substring rather than the full localized sentence;
/// the API exposes no structured code for this condition.
const RATE_LIMIT_MARKER: &str = "лимит активных запросов";

/// Which bounded-retry loop ran out of attempts. Submission contention and
/// job materialization latency are different failure domains, so their
/// counters are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Submission,
    Poll,
}

impl fmt::Display for RetryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPhase::Submission => f.write_str("submission"),
            RetryPhase::Poll => f.write_str("polling"),
        }
    }
}

#[derive(Serialize)]
struct StatisticsRequest {
    campaigns: Vec<String>,
    from: String,
    to: String,
    #[serde(rename = "groupBy")]
    group_by: &'static str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(rename = "UUID", default)]
    uuid: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct JobStatus {
    state: String,
}

#[derive(Deserialize)]
struct CampaignReport {
    report: ReportRows,
}

#[derive(Deserialize)]
struct ReportRows {
    rows: Vec<StatisticsRow>,
}

/// Raw report line; every numeric field arrives as a string, decimals with a
/// comma separator.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatisticsRow {
    #[serde(deserialize_with = "lenient_u64")]
    sku: u64,
    #[serde(deserialize_with = "lenient_i64")]
    views: i64,
    #[serde(deserialize_with = "lenient_i64")]
    clicks: i64,
    #[serde(deserialize_with = "comma_f64")]
    money_spent: f64,
    #[serde(deserialize_with = "comma_f64")]
    avg_bid: f64,
    #[serde(deserialize_with = "lenient_i64")]
    orders: i64,
    #[serde(deserialize_with = "comma_f64")]
    orders_money: f64,
    #[serde(deserialize_with = "lenient_i64")]
    models: i64,
    #[serde(deserialize_with = "comma_f64")]
    models_money: f64,
    #[serde(deserialize_with = "comma_f64", default)]
    price: f64,
}

impl StatisticsRow {
    fn into_report_row(self, campaign_id: u64) -> ReportRow {
        ReportRow {
            campaign_id,
            sku: self.sku,
            views: self.views,
            clicks: self.clicks,
            money_spent: self.money_spent,
            avg_bid: self.avg_bid,
            orders: self.orders,
            orders_money: self.orders_money,
            models: self.models,
            models_money: self.models_money,
            price: self.price,
        }
    }
}

#[derive(Deserialize)]
struct DailyReport {
    rows: Vec<DailyRow>,
}

#[derive(Deserialize)]
struct DailyRow {
    #[serde(deserialize_with = "lenient_u64")]
    id: u64,
}

impl PerformanceClient {
    /// Drives the submit → poll → fetch protocol for one campaign batch.
    ///
    /// Submission contention ("only one active job") is retried with a fixed
    /// backoff; job materialization is polled with the same interval. Each
    /// phase has its own retry counter bounded by the configured cap, so a
    /// batch never hangs: it either yields rows or fails with a
    /// distinguishable error.
    pub async fn statistics_request(
        &self,
        campaign_ids: &[u64],
        since: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ReportRow>, PerformanceError> {
        if campaign_ids.is_empty() {
            return Err(PerformanceError::Validation(
                "campaign batch is empty".to_string(),
            ));
        }
        if campaign_ids.len() > MAX_CAMPAIGNS {
            return Err(PerformanceError::Validation(format!(
                "batch of {} campaigns exceeds the allowed {MAX_CAMPAIGNS}",
                campaign_ids.len()
            )));
        }
        self.validate_dates(since, to)?;

        let uuid = self.submit(campaign_ids, since, to).await?;
        info!(target = "ozon.performance", uuid, "report job created");

        sleep(self.retry_interval()).await;
        self.poll(&uuid).await?;
        self.fetch_report(&uuid).await
    }

    async fn submit(
        &self,
        campaign_ids: &[u64],
        since: NaiveDate,
        to: NaiveDate,
    ) -> Result<String, PerformanceError> {
        let (from, until) = self.day_bounds(since, to)?;
        let body = StatisticsRequest {
            campaigns: campaign_ids.iter().map(|id| id.to_string()).collect(),
            from,
            to: until,
            group_by: "NO_GROUP_BY",
        };

        let mut attempts = 0u32;
        loop {
            if attempts > self.max_retries() {
                return Err(PerformanceError::MaxRetries {
                    phase: RetryPhase::Submission,
                    retries: self.max_retries(),
                });
            }

            let response = self.transport().post_json(STATISTICS_PATH, &body).await?;
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!(
                    target = "ozon.performance",
                    attempts, "submission rate limited (HTTP 429), backing off"
                );
                attempts += 1;
                sleep(self.retry_interval()).await;
                continue;
            }

            let submit: SubmitResponse = read_json(response).await?;
            match submit.error.as_deref() {
                Some(message) if message.contains(RATE_LIMIT_MARKER) => {
                    warn!(
                        target = "ozon.performance",
                        attempts, "submission rate limited, backing off"
                    );
                    attempts += 1;
                    sleep(self.retry_interval()).await;
                }
                Some(message) => {
                    return Err(PerformanceError::Api(message.to_string()));
                }
                None => {
                    return submit.uuid.ok_or_else(|| {
                        PerformanceError::Parse("submission response missing UUID".to_string())
                    });
                }
            }
        }
    }

    async fn poll(&self, uuid: &str) -> Result<(), PerformanceError> {
        let mut attempts = 0u32;
        loop {
            if attempts > self.max_retries() {
                return Err(PerformanceError::MaxRetries {
                    phase: RetryPhase::Poll,
                    retries: self.max_retries(),
                });
            }

            let response = self
                .transport()
                .get(&format!("{STATUS_PATH}/{uuid}"))
                .await?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|err| PerformanceError::Transport(err.to_string()))?;
            if !status.is_success() {
                return Err(PerformanceError::Api(format!("HTTP {status}: {text}")));
            }
            let job: JobStatus = serde_json::from_str(&text)
                .map_err(|err| PerformanceError::Parse(format!("{err}: {text}")))?;

            debug!(target = "ozon.performance", uuid, state = %job.state, "report job state");
            match job.state.as_str() {
                "NOT_STARTED" | "IN_PROGRESS" => {
                    attempts += 1;
                    sleep(self.retry_interval()).await;
                }
                "OK" => return Ok(()),
                _ => {
                    return Err(PerformanceError::ReportJobFailed {
                        uuid: uuid.to_string(),
                        payload: text,
                    });
                }
            }
        }
    }

    async fn fetch_report(&self, uuid: &str) -> Result<Vec<ReportRow>, PerformanceError> {
        let response = self
            .transport()
            .get(&format!("{REPORT_PATH}?UUID={uuid}"))
            .await?;
        let payload: BTreeMap<String, CampaignReport> = read_json(response).await?;

        let mut rows = Vec::new();
        for (campaign, data) in payload {
            let campaign_id = campaign.parse::<u64>().map_err(|_| {
                PerformanceError::Parse(format!("non-numeric campaign id {campaign:?} in report"))
            })?;
            rows.extend(
                data.report
                    .rows
                    .into_iter()
                    .map(|row| row.into_report_row(campaign_id)),
            );
        }
        info!(
            target = "ozon.performance",
            uuid,
            rows = rows.len(),
            "report fetched"
        );
        Ok(rows)
    }

    /// Campaign ids that were active in the range, from the daily statistics
    /// feed, deduplicated preserving first-seen order.
    pub async fn get_campaigns_for_statistics(
        &self,
        since: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<u64>, PerformanceError> {
        let response = self
            .transport()
            .get(&format!("{DAILY_PATH}?dateFrom={since}&dateTo={to}"))
            .await?;
        let daily: DailyReport = read_json(response).await?;
        Ok(unique_ids(daily.rows.into_iter().map(|row| row.id)))
    }

    /// Full statistics run: partitions the active campaigns into quota-sized
    /// batches and drives the report protocol per batch, sequentially (the
    /// upstream allows a single active job, parallel batches would only
    /// rate-limit each other). The first failing batch aborts the run.
    pub async fn get_statistics_report(
        &self,
        since: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ReportRow>, PerformanceError> {
        self.validate_dates(since, to)?;

        let campaign_ids = self.get_campaigns_for_statistics(since, to).await?;
        info!(
            target = "ozon.performance",
            campaigns = campaign_ids.len(),
            %since,
            %to,
            "statistics run started"
        );

        let mut rows = Vec::new();
        for (index, batch) in campaign_ids.chunks(MAX_CAMPAIGNS).enumerate() {
            info!(
                target = "ozon.performance",
                part = index + 1,
                batch = ?batch,
                "processing campaign batch"
            );
            rows.extend(self.statistics_request(batch, since, to).await?);
        }
        Ok(rows)
    }
}

fn unique_ids(ids: impl Iterator<Item = u64>) -> Vec<u64> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
