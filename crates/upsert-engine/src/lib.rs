//! Conflict-aware batched upsert engine.
//!
//! Turns a stream of JSON records into INSERT, UPDATE, or native upsert
//! statements against one relational table:
//!
//! ```text
//! UpsertEngine ──▶ ConflictResolver ──▶ StatementBuilder ──▶ BinderRegistry
//!      │                                                          │
//!      └──────────────── UpsertConnection (driver crate) ◀────────┘
//! ```
//!
//! Drivers live in separate crates and implement [`UpsertConnection`] and
//! [`ColumnMetadataProvider`]. [`testing::MockConnection`] implements the
//! connection in memory.

pub mod conflict;
pub mod connection;
pub mod dialect;
pub mod executor;
pub mod marshal;
pub mod metadata;
pub mod statement;
pub mod testing;

pub use conflict::{Conflict, ConflictResolver};
pub use connection::{
    load_table_metadata, BatchError, BoundStatement, ColumnMetadataProvider, UpsertConnection,
};
pub use dialect::Dialect;
pub use executor::{RunSummary, UpsertEngine, UpsertError};
pub use marshal::{Binder, BinderRegistry};
pub use metadata::StaticMetadata;
pub use statement::{Statement, StatementBuilder, StatementKind};

pub use upsert_core::*;
