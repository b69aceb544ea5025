//! One-shot reads against the live sources, printed as JSON
//!
//! Usage:
//!   overview                 composite market overview
//!   overview crypto          live crypto quotes by symbol
//!   overview class CLASS     one class of the overview (crypto, stocks, indices)
//!   overview alerts [LIMIT]  most recent alerts (default 50)
//!   overview snapshot        run a single snapshot cycle

use anyhow::{bail, Context, Result};
use serde::Serialize;

use marketpulse::config::AppConfig;
use marketpulse::types::AssetClass;
use marketpulse::{logging, MarketService};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging);

    let service = MarketService::from_config(&config)?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str).unwrap_or("overview") {
        "overview" => print_json(&service.overview().await?)?,
        "crypto" => print_json(&service.live_crypto().await?)?,
        "class" => {
            let name = args.get(1).map(String::as_str).unwrap_or_default();
            let Some(class) = AssetClass::from_str(name) else {
                bail!("Unknown asset class '{}' (expected crypto, stocks or indices)", name);
            };
            let overview = service.overview().await?;
            print_json(&overview.class(class))?;
        }
        "alerts" => {
            let alerts = match args.get(1) {
                Some(limit) => {
                    let limit: usize = limit
                        .parse()
                        .with_context(|| format!("Invalid alert limit '{}'", limit))?;
                    service.recent_alerts(limit).await?
                }
                None => service.recent_alerts_default().await?,
            };
            print_json(&alerts)?;
        }
        "snapshot" => {
            let report = service.run_snapshot_cycle().await?;
            println!(
                "snapshots={} alerts={} skipped={}",
                report.snapshots, report.alerts, report.skipped
            );
        }
        other => bail!("Unknown command '{}' (expected overview, crypto, class, alerts or snapshot)", other),
    }

    Ok(())
}
