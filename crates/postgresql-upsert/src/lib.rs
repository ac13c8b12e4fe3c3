//! PostgreSQL driver for the upsert engine.
//!
//! - [`PgConnection`] - tokio-postgres session with per-statement savepoints
//! - [`PgMetadataProvider`] - column types and key groups from the catalog
//! - [`PgParam`] - `ToSql` adapter choosing the wire format per column type

pub mod connection;
pub mod error;
pub mod metadata;
pub mod value;

pub use connection::PgConnection;
pub use metadata::PgMetadataProvider;
pub use value::{encode_numeric, ParamError, PgParam};
