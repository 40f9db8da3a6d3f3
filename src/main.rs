mod config;
mod http;
mod models;
mod pagination;
mod performance;
mod report;
mod seller;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use eyre::{WrapErr, eyre};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use models::ReconciledRow;
use performance::PerformanceClient;
use report::DrrReport;
use seller::SellerClient;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let zone: Tz = config::TIMEZONE
        .parse()
        .map_err(|err| eyre!("invalid OZON_TIMEZONE: {err}"))?;
    let performance = PerformanceClient::new(
        config::PERFORMANCE_CLIENT_ID.clone(),
        config::PERFORMANCE_CLIENT_SECRET.clone(),
        zone,
        config::PERFORMANCE_BASE_URL.clone(),
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("campaigns") {
        return list_campaigns(&performance).await;
    }

    let (since, to) = date_range(args, zone)?;
    info!(target = "ozon.report", %since, %to, %zone, "building advertising spend report");

    let seller = SellerClient::new(
        config::SELLER_CLIENT_ID.clone(),
        config::SELLER_API_KEY.clone(),
        zone,
        config::SELLER_BASE_URL.clone(),
    );

    let rows = DrrReport::new(since, to)
        .process(&seller, &performance)
        .await
        .wrap_err_with(|| format!("report for {since}..={to} failed"))?;
    print_table(&rows);
    Ok(())
}

/// `ozon-drr-rs campaigns`: the SKU campaign catalog with advertised
/// product ids, one campaign per line.
async fn list_campaigns(performance: &PerformanceClient) -> eyre::Result<()> {
    let campaigns = performance
        .get_campaigns()
        .await
        .wrap_err("listing campaigns failed")?;
    println!("id\ttitle\tstate\tfrom\tto\tproducts");
    for campaign in campaigns {
        let products = performance
            .get_campaign_products(campaign.id)
            .await
            .wrap_err_with(|| format!("listing products of campaign {} failed", campaign.id))?;
        let products = products
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            campaign.id,
            campaign.title.as_deref().unwrap_or("-"),
            campaign.state,
            campaign.from_date.as_deref().unwrap_or("-"),
            campaign.to_date.as_deref().unwrap_or("-"),
            products,
        );
    }
    Ok(())
}

/// `ozon-drr-rs [SINCE [TO]]`, dates as YYYY-MM-DD. One date means a
/// single-day report; none means today in the account timezone.
fn date_range(args: Vec<String>, zone: Tz) -> eyre::Result<(NaiveDate, NaiveDate)> {
    let parse = |value: &str| {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .wrap_err_with(|| format!("invalid date {value:?}, expected YYYY-MM-DD"))
    };
    match args.as_slice() {
        [] => {
            let today = Utc::now().with_timezone(&zone).date_naive();
            Ok((today, today))
        }
        [day] => {
            let day = parse(day)?;
            Ok((day, day))
        }
        [since, to] => Ok((parse(since)?, parse(to)?)),
        _ => Err(eyre!("usage: ozon-drr-rs [SINCE [TO]]")),
    }
}

fn print_table(rows: &[ReconciledRow]) {
    println!(
        "{}",
        [
            "offer_id",
            "quantity",
            "price",
            "profit",
            "money_spent",
            "drr",
            "avg_bid",
            "orders",
            "orders_money",
            "models",
            "models_money",
        ]
        .join("\t")
    );
    for row in rows {
        println!(
            "{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.4}\t{:.2}\t{}\t{:.2}\t{}\t{:.2}",
            row.offer_id,
            row.quantity,
            row.price,
            row.profit,
            row.money_spent,
            row.drr,
            row.avg_bid,
            row.orders,
            row.orders_money,
            row.models,
            row.models_money,
        );
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Moscow;

    #[test]
    fn explicit_range_is_parsed() {
        let (since, to) = date_range(
            vec!["2024-09-01".to_string(), "2024-09-30".to_string()],
            Moscow,
        )
        .expect("range");
        assert_eq!(since, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 9, 30).unwrap());
    }

    #[test]
    fn single_date_means_single_day() {
        let (since, to) = date_range(vec!["2024-09-15".to_string()], Moscow).expect("single day");
        assert_eq!(since, to);
    }

    #[test]
    fn malformed_date_is_rejected() {
        assert!(date_range(vec!["15.09.2024".to_string()], Moscow).is_err());
    }

    #[test]
    fn extra_arguments_are_rejected() {
        let args = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(date_range(args, Moscow).is_err());
    }
}
