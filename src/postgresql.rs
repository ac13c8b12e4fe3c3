//! `upsert-sync postgresql`

use crate::config::resolve_config;
use crate::run::{build_engine, upsert_jsonl};
use crate::{RunOpts, TargetOpts};
use anyhow::Context;
use tracing::{info, warn};
use upsert_engine::{RunSummary, UpsertConnection};
use upsert_sync_postgresql::{PgConnection, PgMetadataProvider};

pub async fn run(target: &TargetOpts, opts: &RunOpts) -> anyhow::Result<RunSummary> {
    let config = resolve_config(target, opts)?;
    let join = config.join_external_transaction;

    let conn = PgConnection::connect(&target.connection_string)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let provider = PgMetadataProvider::new(conn.client());
    let mut engine = build_engine(conn, provider, &target.table, opts, config).await?;

    let result = upsert_jsonl(&mut engine, opts).await;
    if join {
        let conn = engine.connection_mut();
        if result.is_ok() {
            conn.commit()
                .await
                .context("Failed to commit the PostgreSQL transaction")?;
            info!("Committed the PostgreSQL transaction");
        } else if let Err(e) = conn.rollback().await {
            warn!("Failed to roll back the PostgreSQL transaction: {}", e);
        }
    }
    result
}
