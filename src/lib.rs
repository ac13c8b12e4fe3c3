//! upsert-sync library
//!
//! Command-line wiring around [`upsert_engine`]: reads JSON records from a
//! JSONL file, upserts them into one PostgreSQL or MySQL table, and writes one
//! JSONL Outcome per record.
//!
//! # CLI Usage
//!
//! ```bash
//! # Per-record commits against PostgreSQL
//! upsert-sync postgresql --connection-string postgresql://... --table users \
//!   --input users.jsonl --output outcomes.jsonl
//!
//! # Batches of 500 against MySQL, settings from a file
//! upsert-sync mysql --connection-string mysql://... --table users \
//!   --input users.jsonl --config upsert.toml --batch-size 500
//! ```

use clap::Parser;
use std::path::PathBuf;
use upsert_engine::{CommitMode, UpsertStrategy};

pub mod config;
pub mod input;
pub mod mysql;
pub mod output;
pub mod postgresql;
pub mod run;

pub use upsert_engine as engine;

#[derive(Parser, Clone, Debug)]
pub struct TargetOpts {
    /// Database connection string
    #[arg(long, env = "UPSERT_CONNECTION_STRING")]
    pub connection_string: String,

    /// Target table
    #[arg(long)]
    pub table: String,

    /// Schema (PostgreSQL) or database (MySQL) of the target table
    #[arg(long)]
    pub schema: Option<String>,
}

#[derive(Parser, Clone, Debug, Default)]
pub struct RunOpts {
    /// JSONL file with one record per line ("-" for stdin)
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Where to write Outcomes as JSONL (default: stdout)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Engine settings file (.toml, .yaml or .yml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Records per batch; 0 commits every record
    #[arg(long, allow_negative_numbers = true)]
    pub batch_size: Option<i64>,

    /// Commit policy: row-count or profile
    #[arg(long)]
    pub commit_mode: Option<CommitMode>,

    /// Insert/update strategy: probe or native
    #[arg(long)]
    pub strategy: Option<UpsertStrategy>,

    /// Run every record in one transaction, committed when the input is exhausted
    #[arg(long)]
    pub join_external_transaction: bool,

    /// Statement timeout (e.g. "500ms", "30s", "2m")
    #[arg(long)]
    pub query_timeout: Option<String>,

    /// Static table metadata (.toml or .yaml) instead of catalog introspection
    #[arg(long, value_name = "PATH")]
    pub metadata_file: Option<PathBuf>,

    /// Include bound parameter values in failure logs
    #[arg(long)]
    pub log_params: bool,
}
