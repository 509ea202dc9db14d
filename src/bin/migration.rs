use anyhow::Context;
use tracing::info;

use checkout_api::{config, migrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting database migration");

    // DATABASE_URL wins so the runner works before a full config exists
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            config::load_config()
                .context("DATABASE_URL not set and configuration could not be loaded")?
                .database_url
        }
    };

    migrator::run_migration(&database_url).await?;

    info!("Migration completed successfully");
    Ok(())
}
