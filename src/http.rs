use reqwest::Client;
use std::time::Duration;

/// Shared client for both Ozon APIs. Report generation itself is slow, but
/// individual calls are small; the poll loops own the long waits, not the
/// per-request timeout.
pub fn build_client() -> Client {
    let timeout = env_secs("OZON_HTTP_TIMEOUT_SECS", 30);
    let connect = env_secs("OZON_HTTP_CONNECT_TIMEOUT_SECS", 5);
    Client::builder()
        .timeout(timeout)
        .connect_timeout(connect)
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn env_secs(key: &str, default: u64) -> Duration {
    let secs = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
