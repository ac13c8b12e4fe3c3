//! Engine configuration for the command line.
//!
//! Settings come from an optional `.toml` or `.yaml`/`.yml` file; command-line
//! flags override file values.

mod duration;

pub use duration::parse_duration_to_millis;

use crate::{RunOpts, TargetOpts};
use anyhow::Context;
use std::path::Path;
use upsert_engine::{CommitMode, ParamLogging, UpsertConfig};

/// Load an [`UpsertConfig`] from a TOML or YAML file.
pub fn load_config_file(path: &Path) -> anyhow::Result<UpsertConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
        other => anyhow::bail!(
            "Unsupported config file extension {other:?} for {} (expected .toml, .yaml or .yml)",
            path.display()
        ),
    };
    Ok(config)
}

/// Build the effective configuration: file values (or defaults), then flags.
pub fn resolve_config(target: &TargetOpts, opts: &RunOpts) -> anyhow::Result<UpsertConfig> {
    let mut config = match &opts.config {
        Some(path) => load_config_file(path)?,
        None => UpsertConfig::default(),
    };

    if let Some(batch_size) = opts.batch_size {
        config.batch_size = batch_size;
        // A batch size on the command line implies batching unless a mode is given
        if opts.commit_mode.is_none() && batch_size > 0 {
            config.commit_mode = CommitMode::RowCount;
        }
    }
    if let Some(mode) = opts.commit_mode {
        config.commit_mode = mode;
    }
    if let Some(strategy) = opts.strategy {
        config.strategy = strategy;
    }
    if target.schema.is_some() {
        config.schema_name = target.schema.clone();
    }
    if opts.join_external_transaction {
        config.join_external_transaction = true;
    }
    if let Some(timeout) = &opts.query_timeout {
        config.query_timeout_ms = Some(parse_duration_to_millis(timeout)?);
    }
    if opts.log_params {
        config.param_logging = ParamLogging::Include;
    }

    // Validate early so a bad batch size fails before connecting
    config.execution_mode()?;
    Ok(config)
}
