use once_cell::sync::Lazy;
use std::env;

pub static SELLER_CLIENT_ID: Lazy<String> =
    Lazy::new(|| env::var("OZON_SELLER_CLIENT_ID").unwrap_or_default());

pub static SELLER_API_KEY: Lazy<String> =
    Lazy::new(|| env::var("OZON_SELLER_TOKEN").unwrap_or_default());

pub static PERFORMANCE_CLIENT_ID: Lazy<String> =
    Lazy::new(|| env::var("OZON_PERFORMANCE_CLIENT_ID").unwrap_or_default());

pub static PERFORMANCE_CLIENT_SECRET: Lazy<String> =
    Lazy::new(|| env::var("OZON_PERFORMANCE_TOKEN").unwrap_or_default());

pub static TIMEZONE: Lazy<String> =
    Lazy::new(|| env::var("OZON_TIMEZONE").unwrap_or_else(|_| "Europe/Moscow".to_string()));

pub static PERFORMANCE_BASE_URL: Lazy<String> = Lazy::new(|| {
    env::var("OZON_PERFORMANCE_BASE_URL")
        .unwrap_or_else(|_| "https://api-performance.ozon.ru".to_string())
});

pub static SELLER_BASE_URL: Lazy<String> = Lazy::new(|| {
    env::var("OZON_SELLER_BASE_URL").unwrap_or_else(|_| "https://api-seller.ozon.ru".to_string())
});
