use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One line of a fetched performance report, tagged with the campaign the
/// report chunk belonged to. Several campaigns may advertise the same SKU;
/// rows are aggregated by SKU during reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub campaign_id: u64,
    pub sku: u64,
    pub views: i64,
    pub clicks: i64,
    pub money_spent: f64,
    pub avg_bid: f64,
    pub orders: i64,
    pub orders_money: f64,
    pub models: i64,
    pub models_money: f64,
    pub price: f64,
}

/// One sold product line extracted from an FBO posting.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub sku: u64,
    pub offer_id: Option<String>,
    pub quantity: i64,
    pub price: f64,
    pub currency_code: Option<String>,
    pub profit: f64,
}

/// Final reconciled row handed to the reporting collaborator. The last row
/// of a report is always the synthetic total (offer id "TOTAL").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRow {
    pub offer_id: String,
    pub currency_code: String,
    pub quantity: i64,
    pub price: f64,
    pub profit: f64,
    pub money_spent: f64,
    pub drr: f64,
    pub avg_bid: f64,
    pub orders: i64,
    pub orders_money: f64,
    pub models: i64,
    pub models_money: f64,
}

/// ISO8601 start-of-day / end-of-day boundaries for `since..=to`, localized
/// to the account timezone. Both APIs filter on zoned timestamps, not dates.
pub fn local_day_bounds(
    zone: Tz,
    since: NaiveDate,
    to: NaiveDate,
) -> Result<(String, String), String> {
    let end_of_day = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
        .ok_or_else(|| "invalid end-of-day time".to_string())?;
    let start = since
        .and_time(NaiveTime::MIN)
        .and_local_timezone(zone)
        .earliest()
        .ok_or_else(|| format!("{since} has no midnight in {zone}"))?;
    let end = to
        .and_time(end_of_day)
        .and_local_timezone(zone)
        .latest()
        .ok_or_else(|| format!("{to} has no end of day in {zone}"))?;
    Ok((start.to_rfc3339(), end.to_rfc3339()))
}

/// Ozon serializes report numbers as strings with a comma decimal separator
/// ("12,34"); product prices come back as plain strings or numbers.
pub(crate) fn comma_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of f64 range")),
        Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {other}"
        ))),
    }
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("number out of u64 range")),
        Value::String(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {other}"
        ))),
    }
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("number out of i64 range")),
        Value::String(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {other}"
        ))),
    }
}
