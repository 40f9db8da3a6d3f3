//! Client for the Ozon Performance (advertising) API.
//!
//! The API hands out short-lived bearer tokens and generates statistics
//! reports server-side: a submission returns an opaque job handle which is
//! polled until the report materializes. Both quirks live in the submodules;
//! this module owns the client facade, its limits, and the error taxonomy.

mod campaigns;
mod session;
mod statistics;
mod transport;

pub use campaigns::Campaign;
pub use session::{AuthError, CredentialSession};
pub use statistics::RetryPhase;

use chrono::NaiveDate;
use chrono_tz::Tz;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::http::build_client;
use crate::models::local_day_bounds;
use transport::AuthTransport;

/// Upstream caps: a statistics request covers at most this many days and
/// this many campaigns per submission.
pub const MAX_DAYS: i64 = 62;
pub const MAX_CAMPAIGNS: usize = 10;

const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(20);
const DEFAULT_MAX_RETRIES: u32 = 60;

#[derive(Debug, Error)]
pub enum PerformanceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("request not authorized after token refresh (HTTP {0})")]
    Unauthorized(StatusCode),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("performance api error: {0}")]
    Api(String),
    #[error("statistics {phase} exceeded {retries} retries")]
    MaxRetries { phase: RetryPhase, retries: u32 },
    #[error("report job {uuid} failed: {payload}")]
    ReportJobFailed { uuid: String, payload: String },
    #[error("{0}")]
    Validation(String),
    #[error("invalid response: {0}")]
    Parse(String),
}

pub struct PerformanceClient {
    transport: AuthTransport,
    zone: Tz,
    retry_interval: Duration,
    max_retries: u32,
}

impl PerformanceClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        zone: Tz,
        base_url: impl Into<String>,
    ) -> Self {
        let session = CredentialSession::new(client_id, client_secret);
        Self {
            transport: AuthTransport::new(build_client(), base_url, session),
            zone,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Interval slept between submission retries and status polls.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Retry cap applied independently to the submission and poll phases.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub(crate) fn transport(&self) -> &AuthTransport {
        &self.transport
    }

    pub(crate) fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub(crate) fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn validate_dates(&self, since: NaiveDate, to: NaiveDate) -> Result<(), PerformanceError> {
        let span = (to - since).num_days().abs();
        if span > MAX_DAYS {
            return Err(PerformanceError::Validation(format!(
                "date range spans {span} days, which exceeds the allowed {MAX_DAYS}"
            )));
        }
        Ok(())
    }

    /// Zoned ISO8601 boundaries for the statistics request body.
    pub(crate) fn day_bounds(
        &self,
        since: NaiveDate,
        to: NaiveDate,
    ) -> Result<(String, String), PerformanceError> {
        local_day_bounds(self.zone, since, to).map_err(PerformanceError::Validation)
    }
}

/// Reads a response body, turning non-success statuses into [`PerformanceError::Api`]
/// with the payload attached for diagnostics.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
) -> Result<T, PerformanceError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| PerformanceError::Transport(err.to_string()))?;
    if !status.is_success() {
        return Err(PerformanceError::Api(format!("HTTP {status}: {text}")));
    }
    serde_json::from_str(&text).map_err(|err| PerformanceError::Parse(format!("{err}: {text}")))
}
