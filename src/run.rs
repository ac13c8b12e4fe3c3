//! Driver-independent part of a CLI run.

use crate::input::{open_input, JsonlRecords};
use crate::output::{open_output, JsonlOutcomeWriter};
use crate::RunOpts;
use anyhow::Context;
use tracing::{info, warn};
use upsert_engine::{
    ColumnMetadataProvider, RunSummary, StaticMetadata, TableRef, UpsertConfig, UpsertConnection,
    UpsertEngine,
};

/// Load metadata (from `--metadata-file` or the database) and build the engine.
pub async fn build_engine<C, P>(
    conn: C,
    database: P,
    table: &str,
    opts: &RunOpts,
    config: UpsertConfig,
) -> anyhow::Result<UpsertEngine<C>>
where
    C: UpsertConnection,
    P: ColumnMetadataProvider + 'static,
{
    let mut provider: Box<dyn ColumnMetadataProvider> = match &opts.metadata_file {
        Some(path) => {
            info!("Using static metadata from {}", path.display());
            Box::new(StaticMetadata::from_file(path).with_context(|| {
                format!("Failed to load metadata file {}", path.display())
            })?)
        }
        None => Box::new(database),
    };
    let table = TableRef::new(None, table);
    UpsertEngine::connect(conn, provider.as_mut(), table.clone(), config)
        .await
        .with_context(|| format!("Failed to load metadata for table '{table}'"))
}

/// Stream the input file through the engine into the output file.
///
/// Outcomes already produced are flushed even when the run ends with a
/// connector failure.
pub async fn upsert_jsonl<C: UpsertConnection>(
    engine: &mut UpsertEngine<C>,
    opts: &RunOpts,
) -> anyhow::Result<RunSummary> {
    let reader = open_input(&opts.input)?;
    let mut writer = JsonlOutcomeWriter::new(open_output(opts.output.as_deref())?);

    info!("Reading records from {}", opts.input.display());
    let result = engine.run(JsonlRecords::new(reader), &mut writer).await;

    let written = writer.written();
    if let Err(e) = writer.finish() {
        warn!("Failed to write outcomes after {} lines: {}", written, e);
        result?;
        return Err(e).context("Failed to write outcomes");
    }

    let summary = result?;
    info!(
        "Inserted {}, updated {}, upserted {}, failed {} ({} batches, {} rows affected)",
        summary.inserted,
        summary.updated,
        summary.upserted,
        summary.failed,
        summary.batches,
        summary.affected_rows
    );
    Ok(summary)
}
