//! Core types for the upsert-sync engine.
//!
//! This crate provides the data model shared by the engine and the
//! database-specific driver crates:
//!
//! - [`SqlType`] - Declared column types the Value Marshaller can bind
//! - [`ExactDecimal`] - Arbitrary-precision decimals for INTEGER/NUMERIC columns
//! - [`BindValue`] - Typed statement parameters
//! - [`Record`] / [`RecordFields`] - Input documents
//! - [`TableMetadata`] / [`KeyGroup`] / [`ColumnSet`] - Table shape
//! - [`UpsertConfig`] - Engine options
//! - [`Outcome`] - Per-record results
//!
//! # Architecture
//!
//! ```text
//! upsert-core (this crate)
//!    │
//!    ├─── upsert-engine           (conflict resolution, SQL, batching)
//!    │
//!    ├─── upsert-sync-postgresql  (tokio-postgres connection + metadata)
//!    └─── upsert-sync-mysql       (mysql_async connection + metadata)
//! ```

pub mod config;
pub mod decimal;
pub mod error;
pub mod outcome;
pub mod record;
pub mod schema;
pub mod types;
pub mod values;

pub use config::{CommitMode, ExecutionMode, ParamLogging, UpsertConfig, UpsertStrategy};
pub use decimal::{DecimalParseError, ExactDecimal};
pub use error::{
    ConfigError, DbError, DbErrorKind, ErrorClass, InputError, MetadataError, RecordError,
    ValueError,
};
pub use outcome::{Outcome, OutcomeSink, OutcomeStatus};
pub use record::{Record, RecordFields};
pub use schema::{ColumnDefinition, ColumnSet, KeyGroup, TableMetadata, TableRef};
pub use types::SqlType;
pub use values::BindValue;
