//! PostgreSQL implementation of [`UpsertConnection`].
//!
//! The connection opens a transaction lazily on the first statement and keeps
//! it open until [`commit`](UpsertConnection::commit). Every statement runs
//! under a savepoint so a rejected statement rolls back alone instead of
//! aborting the whole transaction.

use crate::error::classify;
use crate::value::PgParam;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{debug, error, warn};
use upsert_engine::{BatchError, BindValue, BoundStatement, DbError, Dialect, UpsertConnection};

const SAVEPOINT: &str = "upsert_sync_stmt";

/// A single PostgreSQL session.
pub struct PgConnection {
    client: Arc<Client>,
    prepared: HashMap<String, Statement>,
    in_transaction: bool,
}

impl PgConnection {
    /// Connect and spawn the connection task.
    pub async fn connect(connection_string: &str) -> Result<Self, DbError> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| classify(&e, true))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self::from_client(Arc::new(client)))
    }

    /// Wrap an already connected client.
    pub fn from_client(client: Arc<Client>) -> Self {
        Self {
            client,
            prepared: HashMap::new(),
            in_transaction: false,
        }
    }

    /// Shared handle to the client, e.g. for metadata queries.
    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
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

    fn error(&self, e: &tokio_postgres::Error) -> DbError {
        classify(e, self.client.is_closed())
    }

    async fn simple(&self, sql: &str) -> Result<(), DbError> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| self.error(&e))
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            self.simple("BEGIN").await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn prepare(&mut self, sql: &str) -> Result<Statement, DbError> {
        if let Some(statement) = self.prepared.get(sql) {
            return Ok(statement.clone());
        }
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| self.error(&e))?;
        debug!("Prepared: {sql}");
        self.prepared.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }

    /// Run one statement; returns the row count (rows returned for queries,
    /// rows affected otherwise).
    async fn run(&mut self, sql: &str, params: &[BindValue], query: bool) -> Result<u64, DbError> {
        let statement = self.prepare(sql).await?;
        let values: Vec<PgParam<'_>> = params.iter().map(PgParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();
        let result = if query {
            self.client
                .query(&statement, &refs)
                .await
                .map(|rows| rows.len() as u64)
        } else {
            self.client.execute(&statement, &refs).await
        };
        result.map_err(|e| self.error(&e))
    }

    /// Run one statement inside its own savepoint.
    async fn guarded(&mut self, sql: &str, params: &[BindValue], query: bool) -> Result<u64, DbError> {
        self.begin().await?;
        self.simple(&format!("SAVEPOINT {SAVEPOINT}")).await?;
        match self.run(sql, params, query).await {
            Ok(rows) => {
                self.simple(&format!("RELEASE SAVEPOINT {SAVEPOINT}")).await?;
                Ok(rows)
            }
            Err(e) if !e.is_fatal() => {
                let rollback = self
                    .simple(&format!("ROLLBACK TO SAVEPOINT {SAVEPOINT}"))
                    .await;
                let error = statement_error(e, rollback, self.client.is_closed());
                if error.is_fatal() {
                    self.in_transaction = false;
                }
                Err(error)
            }
            Err(e) => {
                self.in_transaction = false;
                Err(e)
            }
        }
    }
}

/// The rejected statement's own error, kept when the savepoint rollback fails
/// too; it becomes a connection error if the session is gone.
fn statement_error(error: DbError, rollback: Result<(), DbError>, client_closed: bool) -> DbError {
    let Err(rollback_error) = rollback else {
        return error;
    };
    warn!("Failed to roll back to savepoint: {}", rollback_error);
    if rollback_error.is_fatal() || client_closed {
        DbError::connection(error.message)
    } else {
        error
    }
}

#[async_trait]
impl UpsertConnection for PgConnection {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    async fn configure_timeout(&mut self, timeout: Duration) -> Result<(), DbError> {
        self.simple(&format!("SET statement_timeout = {}", timeout.as_millis()))
            .await
    }

    async fn probe(&mut self, sql: &str, params: &[BindValue]) -> Result<bool, DbError> {
        self.guarded(sql, params, true).await.map(|rows| rows > 0)
    }

    async fn execute(&mut self, sql: &str, params: &[BindValue]) -> Result<u64, DbError> {
        self.guarded(sql, params, false).await
    }

    async fn execute_batch(&mut self, batch: &[BoundStatement]) -> Result<Vec<u64>, BatchError> {
        let mut results = Vec::with_capacity(batch.len());
        for statement in batch {
            let result = self.guarded(&statement.sql, &statement.params, false).await;
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
