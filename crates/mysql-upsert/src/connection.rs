//! MySQL implementation of [`UpsertConnection`].
//!
//! InnoDB rolls back only the failing statement on most errors, so unlike the
//! PostgreSQL driver no savepoints are needed to keep the transaction usable.

use crate::error::classify;
use crate::value::positional;
use async_trait::async_trait;
use mysql_async::{prelude::*, Conn, Params, Pool, Row};
use std::time::Duration;
use tracing::debug;
use upsert_engine::{BatchError, BindValue, BoundStatement, DbError, Dialect, UpsertConnection};

/// A single connection checked out of a pool.
pub struct MySqlConnection {
    conn: Conn,
    in_transaction: bool,
}

impl MySqlConnection {
    /// Check a connection out of the pool.
    pub async fn from_pool(pool: &Pool) -> Result<Self, DbError> {
        let conn = pool.get_conn().await.map_err(|e| classify(&e))?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: Conn) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Roll back the open transaction, if any.
    pub async fn rollback(&mut self) -> Result<(), DbError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.simple("ROLLBACK").await?;
        }
        Ok(())
    }

    async fn simple(&mut self, sql: &str) -> Result<(), DbError> {
        self.conn.query_drop(sql).await.map_err(|e| classify(&e))
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            self.simple("START TRANSACTION").await?;
            self.in_transaction = true;
            debug!("Transaction started");
        }
        Ok(())
    }

    fn failed(&mut self, error: mysql_async::Error) -> DbError {
        let error = classify(&error);
        if error.is_fatal() {
            self.in_transaction = false;
        }
        error
    }
}

#[async_trait]
impl UpsertConnection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    // Only bounds SELECT statements, i.e. conflict probes.
    async fn configure_timeout(&mut self, timeout: Duration) -> Result<(), DbError> {
        self.simple(&format!(
            "SET SESSION max_execution_time = {}",
            timeout.as_millis()
        ))
        .await
    }

    async fn probe(&mut self, sql: &str, params: &[BindValue]) -> Result<bool, DbError> {
        self.begin().await?;
        match self
            .conn
            .exec_first::<Row, _, _>(sql, Params::Positional(positional(params)))
            .await
        {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(self.failed(e)),
        }
    }

    async fn execute(&mut self, sql: &str, params: &[BindValue]) -> Result<u64, DbError> {
        self.begin().await?;
        match self
            .conn
            .exec_drop(sql, Params::Positional(positional(params)))
            .await
        {
            Ok(()) => Ok(self.conn.affected_rows()),
            Err(e) => Err(self.failed(e)),
        }
    }

    async fn execute_batch(&mut self, batch: &[BoundStatement]) -> Result<Vec<u64>, BatchError> {
        let mut results = Vec::with_capacity(batch.len());
        for statement in batch {
            let result = self.execute(&statement.sql, &statement.params).await;
            let fatal = matches!(&result, Err(e) if e.is_fatal());
            results.push(result);
            if fatal {
                break;
            }
        }
        if results.iter().any(Result::is_err) {
            Err(BatchError::Rows(results))
        } else {
            Ok(results.into_iter().flatten().collect())
        }
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.simple("COMMIT").await?;
        }
        Ok(())
    }
}
