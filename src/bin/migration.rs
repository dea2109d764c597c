//! Applies or inspects the schema migrations.
//!
//! Usage: `migration [up|down|status|fresh]` (default `up`). The database is
//! taken from the loaded configuration, or `DATABASE_URL` when set.

use anyhow::{bail, Context};
use phonestore_api::{config, db, migrator::Migrator};
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cfg = config::load_config().context("failed to load configuration")?;
    if let Ok(url) = std::env::var("DATABASE_URL") {
        cfg.database_url = url;
    }
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;

    info!(command = %command, "Starting database migration");
    match command.as_str() {
        "up" => Migrator::up(&pool, None).await?,
        "down" => Migrator::down(&pool, Some(1)).await?,
        "status" => Migrator::status(&pool).await?,
        "fresh" => Migrator::fresh(&pool).await?,
        other => bail!("unknown command `{other}`; expected up, down, status or fresh"),
    }

    info!("Migration command completed");
    Ok(())
}
