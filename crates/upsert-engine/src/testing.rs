//! In-memory connection for exercising the engine without a database.
//!
//! [`MockConnection`] records every probe, statement, batch, and commit.
//! Probe answers and statement failures are supplied as closures so tests
//! can simulate existing rows, constraint violations, and lost connections.

use crate::connection::{BatchError, BoundStatement, UpsertConnection};
use crate::dialect::Dialect;
use async_trait::async_trait;
use std::time::Duration;
use upsert_core::{BindValue, DbError};

type ProbeFn = Box<dyn FnMut(&str, &[BindValue]) -> bool + Send>;
type FailureFn = Box<dyn FnMut(&str, &[BindValue]) -> Option<DbError> + Send>;

/// Recording connection.
pub struct MockConnection {
    dialect: Dialect,
    /// Every executed statement (single and batched), in order
    pub executed: Vec<BoundStatement>,
    /// Every probe query, in order
    pub probes: Vec<BoundStatement>,
    /// Sizes of submitted batches
    pub batches: Vec<usize>,
    /// Number of commits
    pub commits: usize,
    /// Timeout forwarded by the engine
    pub timeout: Option<Duration>,
    probe_responder: ProbeFn,
    failure: FailureFn,
    affected_rows: u64,
    batch_error: Option<DbError>,
    commit_error: Option<DbError>,
}

impl MockConnection {
    /// A connection where no row exists and every statement affects one row.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            executed: Vec::new(),
            probes: Vec::new(),
            batches: Vec::new(),
            commits: 0,
            timeout: None,
            probe_responder: Box::new(|_, _| false),
            failure: Box::new(|_, _| None),
            affected_rows: 1,
            batch_error: None,
            commit_error: None,
        }
    }

    /// Answer probes with `responder` (`true` = a row exists).
    pub fn with_probe<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&str, &[BindValue]) -> bool + Send + 'static,
    {
        self.probe_responder = Box::new(responder);
        self
    }

    /// Fail statements for which `injector` returns an error.
    ///
    /// Applies to single statements, batched statements, and probes.
    pub fn with_failure<F>(mut self, injector: F) -> Self
    where
        F: FnMut(&str, &[BindValue]) -> Option<DbError> + Send + 'static,
    {
        self.failure = Box::new(injector);
        self
    }

    /// Affected-row count reported per statement.
    pub fn with_affected_rows(mut self, rows: u64) -> Self {
        self.affected_rows = rows;
        self
    }

    /// Fail the next batch as a whole, without row detail.
    pub fn with_batch_error(mut self, error: DbError) -> Self {
        self.batch_error = Some(error);
        self
    }

    /// Fail the next commit.
    pub fn with_commit_error(mut self, error: DbError) -> Self {
        self.commit_error = Some(error);
        self
    }

    /// Executed SQL texts, in order.
    pub fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(|s| s.sql.as_str()).collect()
    }

    fn record(sql: &str, params: &[BindValue]) -> BoundStatement {
        BoundStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        }
    }
}

#[async_trait]
impl UpsertConnection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn configure_timeout(&mut self, timeout: Duration) -> Result<(), DbError> {
        self.timeout = Some(timeout);
        Ok(())
    }

    async fn probe(&mut self, sql: &str, params: &[BindValue]) -> Result<bool, DbError> {
        self.probes.push(Self::record(sql, params));
        if let Some(e) = (self.failure)(sql, params) {
            return Err(e);
        }
        Ok((self.probe_responder)(sql, params))
    }

    async fn execute(&mut self, sql: &str, params: &[BindValue]) -> Result<u64, DbError> {
        self.executed.push(Self::record(sql, params));
        match (self.failure)(sql, params) {
            Some(e) => Err(e),
            None => Ok(self.affected_rows),
        }
    }

    async fn execute_batch(&mut self, batch: &[BoundStatement]) -> Result<Vec<u64>, BatchError> {
        self.batches.push(batch.len());
        self.executed.extend(batch.iter().cloned());
        if let Some(e) = self.batch_error.take() {
            return Err(BatchError::Whole(e));
        }
        let results: Vec<Result<u64, DbError>> = batch
            .iter()
            .map(|s| match (self.failure)(&s.sql, &s.params) {
                Some(e) => Err(e),
                None => Ok(self.affected_rows),
            })
            .collect();
        if results.iter().any(Result::is_err) {
            Err(BatchError::Rows(results))
        } else {
            Ok(results.into_iter().flatten().collect())
        }
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        if let Some(e) = self.commit_error.take() {
            return Err(e);
        }
        self.commits += 1;
        Ok(())
    }
}
