//! Bulk-loads clients from a CSV file, bypassing the HTTP upload limit.
//!
//! Usage: `import-clients <path/to/clients.csv>`

use std::sync::Arc;

use credit_scoring_api::client_store::PgClientStore;
use credit_scoring_api::config::Config;
use credit_scoring_api::db::Database;
use credit_scoring_api::import::ImportService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: import-clients <file.csv>"))?;

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url, config.db_max_connections).await?;
    db.migrate().await?;

    let data = tokio::fs::read(&path).await?;
    tracing::info!("Importing clients from {} ({} bytes)", path, data.len());

    let service = ImportService::new(Arc::new(PgClientStore::new(db.pool.clone())));
    let stats = service.import_csv(&data).await?;

    tracing::info!(
        "Import finished: {} total, {} succeeded, {} failed",
        stats.total,
        stats.success_count,
        stats.failure_count
    );
    for error in &stats.errors {
        tracing::warn!("{}", error);
    }

    db.pool.close().await;
    Ok(())
}
