//! `upsert-sync mysql`

use crate::config::resolve_config;
use crate::run::{build_engine, upsert_jsonl};
use crate::{RunOpts, TargetOpts};
use anyhow::Context;
use mysql_async::Pool;
use tracing::{info, warn};
use upsert_engine::{RunSummary, UpsertConnection};
use upsert_sync_mysql::{MySqlConnection, MySqlMetadataProvider};

pub async fn run(target: &TargetOpts, opts: &RunOpts) -> anyhow::Result<RunSummary> {
    let config = resolve_config(target, opts)?;
    let join = config.join_external_transaction;

    let pool = Pool::from_url(&target.connection_string)
        .context("Invalid MySQL connection string")?;
    let conn = MySqlConnection::from_pool(&pool)
        .await
        .context("Failed to connect to MySQL")?;
    let provider = MySqlMetadataProvider::new(pool.clone());
    let mut engine = build_engine(conn, provider, &target.table, opts, config).await?;

    let mut result = upsert_jsonl(&mut engine, opts).await;
    if join {
        let conn = engine.connection_mut();
        if result.is_ok() {
            match conn.commit().await {
                Ok(()) => info!("Committed the MySQL transaction"),
                Err(e) => {
                    result = Err(anyhow::Error::new(e)
                        .context("Failed to commit the MySQL transaction"));
                }
            }
        } else if let Err(e) = conn.rollback().await {
            warn!("Failed to roll back the MySQL transaction: {}", e);
        }
    }

    // Return the connection to the pool before shutting it down
    drop(engine);
    if let Err(e) = pool.disconnect().await {
        warn!("Error while disconnecting from MySQL: {}", e);
    }
    result
}
