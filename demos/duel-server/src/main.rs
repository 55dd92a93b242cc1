use std::time::Duration;

use skyduel::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_FILTER: &str = "info,skyduel=debug";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), SkyduelError> {
    init_tracing();

    let bind = std::env::var("SKYDUEL_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let matches = MemoryMatchStore::new();

    let server = SkyduelServerBuilder::new()
        .bind(&bind)
        .idle_timeout(Duration::from_secs(30))
        .build(matches.clone())
        .await?;
    tracing::info!(addr = ?server.local_addr().ok(), "duel server listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    for record in matches.records() {
        tracing::info!(
            room_code = %record.room_code,
            address = %record.address,
            score = record.score,
            coins = record.coins,
            "match result"
        );
    }
    Ok(())
}
