//! Batch Executor.
//!
//! Drives one invocation over a stream of records:
//!
//! ```text
//! Discovering ──▶ ProfileCommit ─┐
//!             └─▶ RowCommit ─────┴─▶ Draining ──▶ Done
//! ```
//!
//! Discovery tries records in order until one yields a non-empty column set;
//! that shape (and, for the native strategy, its single upsert statement) is
//! reused for every later record. Exactly one Outcome is emitted per record,
//! in input order. In RowCommit mode the Outcomes of an open batch are held
//! until the batch is flushed.

use crate::conflict::ConflictResolver;
use crate::connection::{
    load_table_metadata, BatchError, BoundStatement, ColumnMetadataProvider, UpsertConnection,
};
use crate::marshal::BinderRegistry;
use crate::statement::{Statement, StatementBuilder, StatementKind};
use serde::Serialize;
use serde_json::json;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use upsert_core::{
    BindValue, ColumnSet, ConfigError, DbError, ExecutionMode, InputError, MetadataError, Outcome,
    OutcomeSink, ParamLogging, Record, RecordError, RecordFields, TableMetadata, TableRef,
    UpsertConfig, UpsertStrategy,
};

const BATCH_MESSAGE: &str = "Batch executed successfully";
const REMAINING_BATCH_MESSAGE: &str = "Remaining batch executed successfully";
const PARTIAL_BATCH_MESSAGE: &str = "Batch partially executed";

/// Failures that end an invocation.
#[derive(Error, Debug)]
pub enum UpsertError {
    /// Invalid configuration; no record was processed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Table metadata could not be loaded.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The connection failed; every unprocessed record was reported failed.
    #[error("Connector failure: {0}")]
    Connector(DbError),
}

/// Totals for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Outcomes emitted
    pub records: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub upserted: u64,
    /// Batches submitted (RowCommit only)
    pub batches: u64,
    /// Rows reported affected by the database
    pub affected_rows: u64,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunSummary {
    fn count(&mut self, outcome: &Outcome, kind: Option<StatementKind>) {
        self.records += 1;
        if !outcome.is_success() {
            self.failed += 1;
            return;
        }
        self.succeeded += 1;
        match kind {
            Some(StatementKind::Insert) => self.inserted += 1,
            Some(StatementKind::Update) => self.updated += 1,
            Some(StatementKind::Upsert) => self.upserted += 1,
            Some(StatementKind::Probe) | None => {}
        }
    }
}

/// Sink wrapper that keeps the summary in step with emitted Outcomes.
struct Emitter<'s, S: ?Sized> {
    sink: &'s mut S,
    summary: RunSummary,
}

impl<S: OutcomeSink + ?Sized> Emitter<'_, S> {
    fn emit(&mut self, outcome: Outcome, kind: Option<StatementKind>) {
        self.summary.count(&outcome, kind);
        self.sink.emit(outcome);
    }

    fn fail(&mut self, index: u64, error: &RecordError) {
        self.emit(Outcome::failed(index, error), None);
    }
}

/// Statement shape discovered from the first usable record.
struct Shape {
    columns: ColumnSet,
    insert: Statement,
    native: Option<Statement>,
}

/// The statement decided for one record.
struct Plan {
    kind: StatementKind,
    statement: BoundStatement,
}

/// One record held in the open batch.
enum BatchSlot {
    Pending {
        index: u64,
        kind: StatementKind,
        statement: BoundStatement,
    },
    /// Outcome already decided; emitted when the batch is flushed.
    Settled {
        outcome: Outcome,
        kind: Option<StatementKind>,
    },
}

/// Mutable RowCommit state for one stream.
#[derive(Default)]
struct BatchState {
    ordinal: u64,
    slots: Vec<BatchSlot>,
    pending: usize,
    should_execute: bool,
}

impl BatchState {
    fn add(&mut self, index: u64, kind: StatementKind, statement: BoundStatement) {
        self.slots.push(BatchSlot::Pending {
            index,
            kind,
            statement,
        });
        self.pending += 1;
        self.should_execute = true;
    }

    fn statements(&self) -> Vec<BoundStatement> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                BatchSlot::Pending { statement, .. } => Some(statement.clone()),
                BatchSlot::Settled { .. } => None,
            })
            .collect()
    }

    fn take(&mut self) -> Vec<BatchSlot> {
        self.pending = 0;
        self.should_execute = false;
        std::mem::take(&mut self.slots)
    }
}

/// Conflict-aware upsert engine bound to one connection and one table.
pub struct UpsertEngine<C> {
    conn: C,
    metadata: TableMetadata,
    config: UpsertConfig,
    builder: StatementBuilder,
    binders: BinderRegistry,
}

impl<C: UpsertConnection> UpsertEngine<C> {
    /// Create an engine for already-loaded metadata.
    pub fn new(conn: C, metadata: TableMetadata, config: UpsertConfig) -> Self {
        let dialect = conn.dialect();
        Self {
            builder: StatementBuilder::new(dialect, &metadata),
            binders: BinderRegistry::for_dialect(dialect),
            conn,
            metadata,
            config,
        }
    }

    /// Load metadata through a provider and create an engine.
    ///
    /// The configured `schema_name`, when set, replaces the table's schema.
    pub async fn connect<P>(
        conn: C,
        provider: &mut P,
        table: TableRef,
        config: UpsertConfig,
    ) -> Result<Self, UpsertError>
    where
        P: ColumnMetadataProvider + ?Sized,
    {
        let table = table.with_schema_override(config.schema_name.as_deref());
        let metadata = load_table_metadata(provider, &table).await?;
        debug!(
            "Loaded metadata for {table}: {} columns, primary key {:?}, {} unique keys",
            metadata.columns().len(),
            metadata.primary_key().columns,
            metadata.unique_groups().len()
        );
        Ok(Self::new(conn, metadata, config))
    }

    /// Replace the binder table (dialect-specific overrides).
    pub fn with_binders(mut self, binders: BinderRegistry) -> Self {
        self.binders = binders;
        self
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_connection(self) -> C {
        self.conn
    }

    /// Process every record, emitting one Outcome per record to `sink`.
    ///
    /// Configuration errors are returned before any record is consumed. A
    /// connector failure reports every unprocessed record as failed and is
    /// then returned.
    pub async fn run<I, S>(&mut self, records: I, sink: &mut S) -> Result<RunSummary, UpsertError>
    where
        I: IntoIterator<Item = Record>,
        S: OutcomeSink + ?Sized,
    {
        let mode = self.config.execution_mode()?;
        let dialect = self.builder.dialect();
        if self.config.strategy == UpsertStrategy::Native && !dialect.supports_native_upsert() {
            return Err(ConfigError::NativeUpsertUnsupported(dialect.to_string()).into());
        }
        if let Some(timeout) = self.config.query_timeout() {
            self.conn
                .configure_timeout(timeout)
                .await
                .map_err(UpsertError::Connector)?;
        }

        info!(
            "Upserting into {} ({dialect}, {:?}, {:?} strategy)",
            self.metadata.table(),
            mode,
            self.config.strategy
        );

        let start = Instant::now();
        let mut out = Emitter {
            sink,
            summary: RunSummary::default(),
        };
        let result = match mode {
            ExecutionMode::ProfileCommit => self.run_profile_commit(records, &mut out).await,
            ExecutionMode::RowCommit { batch_size } => {
                self.run_row_commit(records, batch_size, &mut out).await
            }
        };
        out.summary.duration = start.elapsed();

        let summary = out.summary;
        info!(
            "Upsert complete: {} records ({} succeeded, {} failed) in {:?}",
            summary.records, summary.succeeded, summary.failed, summary.duration
        );
        result.map(|()| summary)
    }

    // ========================================================================
    // ProfileCommit
    // ========================================================================

    async fn run_profile_commit<I, S>(
        &mut self,
        records: I,
        out: &mut Emitter<'_, S>,
    ) -> Result<(), UpsertError>
    where
        I: IntoIterator<Item = Record>,
        S: OutcomeSink + ?Sized,
    {
        let mut shape = None;
        let mut records = records.into_iter();
        let mut index = 0u64;

        while let Some(record) = records.next() {
            let current = index;
            index += 1;

            let error = match self.plan(&mut shape, &record).await {
                Ok(Plan { kind, statement }) => {
                    match self.execute_and_commit(&statement).await {
                        Ok(rows) => {
                            out.summary.affected_rows += rows;
                            let payload = json!({
                                "statement": statement.sql,
                                "affected_rows": rows,
                                "message": kind.success_message(),
                            });
                            out.emit(
                                Outcome::success(current, kind.success_message(), payload),
                                Some(kind),
                            );
                            continue;
                        }
                        Err(e) => RecordError::from(e),
                    }
                }
                Err(e) => e,
            };

            out.fail(current, &error);
            if let RecordError::Database(db) = error {
                if db.is_fatal() {
                    return Err(abort(out, Vec::new(), index, records, db));
                }
            }
        }
        Ok(())
    }

    async fn execute_and_commit(&mut self, statement: &BoundStatement) -> Result<u64, DbError> {
        let rows = match self.conn.execute(&statement.sql, &statement.params).await {
            Ok(rows) => rows,
            Err(e) => {
                self.log_failure(&statement.sql, &statement.params, &e);
                return Err(e);
            }
        };
        if !self.config.join_external_transaction {
            self.conn.commit().await?;
        }
        Ok(rows)
    }

    // ========================================================================
    // RowCommit
    // ========================================================================

    async fn run_row_commit<I, S>(
        &mut self,
        records: I,
        batch_size: NonZeroUsize,
        out: &mut Emitter<'_, S>,
    ) -> Result<(), UpsertError>
    where
        I: IntoIterator<Item = Record>,
        S: OutcomeSink + ?Sized,
    {
        let mut shape = None;
        let mut state = BatchState::default();
        let mut records = records.into_iter();
        let mut index = 0u64;

        while let Some(record) = records.next() {
            let current = index;
            index += 1;

            match self.plan(&mut shape, &record).await {
                Ok(Plan { kind, statement }) => {
                    state.add(current, kind, statement);
                    if state.pending >= batch_size.get() {
                        if let Err(e) = self.flush(&mut state, out, BATCH_MESSAGE).await {
                            return Err(abort(out, state.take(), index, records, e));
                        }
                    }
                }
                Err(RecordError::Database(e)) if e.is_fatal() => {
                    let mut held = state.take();
                    held.push(BatchSlot::Settled {
                        outcome: Outcome::failed(current, &RecordError::Database(e.clone())),
                        kind: None,
                    });
                    return Err(abort(out, held, index, records, e));
                }
                Err(e) => settle(&mut state, out, Outcome::failed(current, &e), None),
            }
        }

        // Draining
        if let Err(e) = self.flush(&mut state, out, REMAINING_BATCH_MESSAGE).await {
            return Err(abort(out, state.take(), index, records, e));
        }
        Ok(())
    }

    /// Submit the open batch and emit its Outcomes.
    ///
    /// Returns `Err` only for a connection failure; the batch is then left in
    /// `state` for the caller to report.
    async fn flush<S>(
        &mut self,
        state: &mut BatchState,
        out: &mut Emitter<'_, S>,
        message: &str,
    ) -> Result<(), DbError>
    where
        S: OutcomeSink + ?Sized,
    {
        if !state.should_execute || state.pending == 0 {
            let skipped = RecordError::Database(DbError::statement("Statement not executed"));
            for slot in state.take() {
                emit_slot(out, slot, |index, _| Outcome::failed(index, &skipped));
            }
            return Ok(());
        }

        state.ordinal += 1;
        let ordinal = state.ordinal;
        let statements = state.statements();
        debug!("Executing batch {ordinal} with {} statements", statements.len());

        let result = match self.conn.execute_batch(&statements).await {
            Ok(counts) => match self.commit_batch().await {
                Ok(()) => Ok(counts),
                Err(e) => Err(BatchError::Whole(e)),
            },
            Err(e) => Err(e),
        };
        out.summary.batches += 1;

        match result {
            Ok(counts) => {
                let total: u64 = counts.iter().sum();
                out.summary.affected_rows += total;
                let mut position = 0;
                for slot in state.take() {
                    emit_slot(out, slot, |index, statement| {
                        let rows = counts.get(position).copied().unwrap_or(0);
                        position += 1;
                        let payload = json!({
                            "batch": ordinal,
                            "affected_rows": total,
                            "record_affected_rows": rows,
                            "statement": statement.sql,
                            "message": message,
                        });
                        Outcome::success(index, message, payload)
                    });
                }
                Ok(())
            }
            Err(BatchError::Rows(results)) => {
                if let Some(fatal) = results
                    .iter()
                    .find_map(|r| r.as_ref().err().filter(|e| e.is_fatal()))
                {
                    return Err(fatal.clone());
                }
                for (statement, result) in statements.iter().zip(&results) {
                    if let Err(e) = result {
                        self.log_failure(&statement.sql, &statement.params, e);
                    }
                }
                if let Err(e) = self.commit_batch().await {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!("Commit of partially executed batch {ordinal} failed: {e}");
                }
                let total: u64 = results.iter().filter_map(|r| r.as_ref().ok()).sum();
                out.summary.affected_rows += total;
                let mut position = 0;
                for slot in state.take() {
                    emit_slot(out, slot, |index, statement| {
                        let result = results.get(position).cloned().unwrap_or_else(|| {
                            Err(DbError::statement("Statement not executed: batch aborted"))
                        });
                        position += 1;
                        match result {
                            Ok(rows) => {
                                let payload = json!({
                                    "batch": ordinal,
                                    "affected_rows": total,
                                    "record_affected_rows": rows,
                                    "statement": statement.sql,
                                    "message": PARTIAL_BATCH_MESSAGE,
                                });
                                Outcome::success(index, PARTIAL_BATCH_MESSAGE, payload)
                            }
                            Err(e) => Outcome::failed(index, &RecordError::Database(e)),
                        }
                    });
                }
                Ok(())
            }
            Err(BatchError::Whole(e)) => {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(
                    "Batch {ordinal} failed as a whole ({} statements): {e}",
                    statements.len()
                );
                if let Some(first) = statements.first() {
                    self.log_failure(&first.sql, &first.params, &e);
                }
                let error = RecordError::Database(e);
                for slot in state.take() {
                    emit_slot(out, slot, |index, _| Outcome::failed(index, &error));
                }
                Ok(())
            }
        }
    }

    async fn commit_batch(&mut self) -> Result<(), DbError> {
        if self.config.join_external_transaction {
            return Ok(());
        }
        self.conn.commit().await
    }

    // ========================================================================
    // Per-record planning
    // ========================================================================

    /// Parse one record, discover the shape if needed, and decide its statement.
    async fn plan(&mut self, shape: &mut Option<Shape>, record: &Record) -> Result<Plan, RecordError> {
        let fields = record.parse()?;
        if shape.is_none() {
            *shape = Some(self.discover(&fields)?);
        }
        let Some(shape) = shape.as_ref() else {
            return Err(InputError::NoUsableColumns(self.metadata.table().to_string()).into());
        };

        if let Some(native) = &shape.native {
            return Ok(Plan {
                kind: native.kind,
                statement: self.bind(native, &fields)?,
            });
        }

        let resolver = ConflictResolver::new(&self.metadata, &self.builder, &self.binders);
        let conflict = resolver.resolve_all(&mut self.conn, &fields).await?;
        if conflict.is_none() {
            return Ok(Plan {
                kind: StatementKind::Insert,
                statement: self.bind(&shape.insert, &fields)?,
            });
        }

        match self
            .builder
            .update(&shape.columns, &conflict.key_columns(), &fields)
        {
            Some(update) => Ok(Plan {
                kind: StatementKind::Update,
                statement: self.bind(&update, &fields)?,
            }),
            None => {
                // Key columns only: handled as an insert, a duplicate fails as a statement error
                debug!("Record conflicts on key columns only; inserting");
                Ok(Plan {
                    kind: StatementKind::Insert,
                    statement: self.bind(&shape.insert, &fields)?,
                })
            }
        }
    }

    fn discover(&self, fields: &RecordFields) -> Result<Shape, RecordError> {
        let columns = self
            .metadata
            .column_set_for(fields)
            .ok_or_else(|| InputError::NoUsableColumns(self.metadata.table().to_string()))?;
        let insert = self.builder.insert(&columns);
        let native = match self.config.strategy {
            UpsertStrategy::Probe => None,
            UpsertStrategy::Native => Some(
                self.builder
                    .native_upsert(&columns, &self.metadata)
                    .map_err(|e| DbError::statement(e.to_string()))?,
            ),
        };
        debug!(
            "Statement shape: {} columns {:?}",
            columns.len(),
            columns.columns()
        );
        Ok(Shape {
            columns,
            insert,
            native,
        })
    }

    fn bind(&self, statement: &Statement, fields: &RecordFields) -> Result<BoundStatement, RecordError> {
        let params = self
            .binders
            .bind_statement(statement, fields, &self.metadata)?;
        Ok(BoundStatement {
            sql: statement.sql.clone(),
            params,
        })
    }

    fn log_failure(&self, sql: &str, params: &[BindValue], error: &DbError) {
        match self.config.param_logging {
            ParamLogging::Include => {
                let values: Vec<String> = params.iter().map(ToString::to_string).collect();
                warn!(
                    "Statement failed: {error}; sql: {sql}; params: [{}]",
                    values.join(", ")
                );
            }
            ParamLogging::Redact => {
                let kinds: Vec<&str> = params.iter().map(BindValue::kind).collect();
                warn!(
                    "Statement failed: {error}; sql: {sql}; param kinds: [{}]",
                    kinds.join(", ")
                );
            }
        }
    }
}

/// Emit a decided Outcome now, or hold it behind the open batch.
fn settle<S: OutcomeSink + ?Sized>(
    state: &mut BatchState,
    out: &mut Emitter<'_, S>,
    outcome: Outcome,
    kind: Option<StatementKind>,
) {
    if state.pending == 0 {
        out.emit(outcome, kind);
    } else {
        state.slots.push(BatchSlot::Settled { outcome, kind });
    }
}

/// Emit one batch slot; pending slots are resolved by `decide`.
fn emit_slot<S, F>(out: &mut Emitter<'_, S>, slot: BatchSlot, mut decide: F)
where
    S: OutcomeSink + ?Sized,
    F: FnMut(u64, &BoundStatement) -> Outcome,
{
    match slot {
        BatchSlot::Pending {
            index,
            kind,
            statement,
        } => {
            let outcome = decide(index, &statement);
            let kind = outcome.is_success().then_some(kind);
            out.emit(outcome, kind);
        }
        BatchSlot::Settled { outcome, kind } => out.emit(outcome, kind),
    }
}

/// Report held and unconsumed records after a connection failure.
fn abort<S, I>(
    out: &mut Emitter<'_, S>,
    held: Vec<BatchSlot>,
    mut next_index: u64,
    remaining: I,
    error: DbError,
) -> UpsertError
where
    S: OutcomeSink + ?Sized,
    I: Iterator<Item = Record>,
{
    let record_error = RecordError::Database(error.clone());
    for slot in held {
        emit_slot(out, slot, |index, _| Outcome::failed(index, &record_error));
    }
    let mut dropped = 0u64;
    for _ in remaining {
        out.fail(next_index, &record_error);
        next_index += 1;
        dropped += 1;
    }
    warn!("Connection failed, {dropped} unprocessed records reported failed: {error}");
    UpsertError::Connector(error)
}
