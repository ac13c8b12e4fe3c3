//! MySQL driver for the upsert engine.
//!
//! - [`MySqlConnection`] - one pooled `mysql_async` connection in a transaction
//! - [`MySqlMetadataProvider`] - column types and key groups from `INFORMATION_SCHEMA`
//! - [`MySqlValue`] - `BindValue` to `mysql_async::Value` conversion

pub mod connection;
pub mod error;
pub mod metadata;
pub mod value;

pub use connection::MySqlConnection;
pub use metadata::MySqlMetadataProvider;
pub use value::MySqlValue;
