use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use magnate::{
    model::MapId,
    web::{self, WebServerConfig},
    Catalog, GameService, Scenario, ScenarioLoader,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "magnate economy server")]
struct Cli {
    /// Path to a catalog YAML file (built-in catalog when omitted)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Path to a scenario YAML file (built-in demo town when omitted)
    #[arg(long)]
    scenario: Option<PathBuf>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Seconds between recompute passes over each map
    #[arg(long, default_value_t = 30)]
    recompute_interval: u64,

    /// Seconds between income accruals over each map
    #[arg(long, default_value_t = 300)]
    accrual_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_yaml(path)?,
        None => Catalog::standard(),
    };
    let scenario = match &cli.scenario {
        Some(path) => ScenarioLoader::new(".").load(path)?,
        None => Scenario::demo_town(),
    };
    let seeded = scenario.build_store()?;
    let service = Arc::new(GameService::new(seeded.store, catalog));

    tokio::spawn(recompute_loop(
        service.clone(),
        seeded.maps.clone(),
        cli.recompute_interval,
    ));
    tokio::spawn(accrual_loop(
        service.clone(),
        seeded.maps.clone(),
        cli.accrual_interval,
    ));

    web::run(
        WebServerConfig {
            host: cli.host,
            port: cli.port,
        },
        service,
    )
    .await
}

async fn recompute_loop(
    service: Arc<GameService<magnate::store::MemoryStore>>,
    maps: Vec<MapId>,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        for &map in &maps {
            if let Err(err) = service.recompute(map).await {
                warn!(map = map.raw(), %err, "recompute pass failed; will retry");
            }
        }
    }
}

async fn accrual_loop(
    service: Arc<GameService<magnate::store::MemoryStore>>,
    maps: Vec<MapId>,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    // Skip the immediate first tick so companies don't get paid at boot.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        for &map in &maps {
            if let Err(err) = service.accrue_income(map).await {
                warn!(map = map.raw(), %err, "income accrual failed");
            }
        }
    }
}
