//! Engine configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

/// When records become durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitMode {
    /// Commit after every `batch_size` records
    RowCount,
    /// Commit after every record
    #[default]
    Profile,
}

/// How the engine decides between insert and update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsertStrategy {
    /// Probe each key group, then INSERT or UPDATE
    #[default]
    Probe,
    /// Single dialect-native insert-or-update statement
    Native,
}

/// Whether bound parameter values may appear in failure logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamLogging {
    /// Log only parameter kinds
    #[default]
    Redact,
    /// Log parameter values
    Include,
}

macro_rules! kebab_from_str {
    ($ty:ty, $($text:literal => $variant:expr),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(format!(
                        "invalid value '{other}', expected one of: {}",
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

kebab_from_str!(CommitMode, "row-count" => CommitMode::RowCount, "profile" => CommitMode::Profile);
kebab_from_str!(UpsertStrategy, "probe" => UpsertStrategy::Probe, "native" => UpsertStrategy::Native);
kebab_from_str!(ParamLogging, "redact" => ParamLogging::Redact, "include" => ParamLogging::Include);

/// Options recognized by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsertConfig {
    /// Records per batch; 0 selects per-record commits, negative is rejected
    pub batch_size: i64,

    /// Commit policy (ignored when `batch_size` is 0)
    pub commit_mode: CommitMode,

    /// Overrides the schema of the target table
    pub schema_name: Option<String>,

    /// Leave commits to the caller's transaction
    pub join_external_transaction: bool,

    /// Statement timeout forwarded to the connection
    pub query_timeout_ms: Option<u64>,

    /// Insert/update decision strategy
    pub strategy: UpsertStrategy,

    /// Failure log redaction policy
    pub param_logging: ParamLogging,
}

impl Default for UpsertConfig {
    fn default() -> Self {
        Self {
            batch_size: 0,
            commit_mode: CommitMode::Profile,
            schema_name: None,
            join_external_transaction: false,
            query_timeout_ms: None,
            strategy: UpsertStrategy::Probe,
            param_logging: ParamLogging::Redact,
        }
    }
}

/// Resolved execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One statement and one commit per record
    ProfileCommit,
    /// Size-bounded batches, one commit per batch
    RowCommit {
        /// Statements per batch
        batch_size: NonZeroUsize,
    },
}

impl UpsertConfig {
    /// Validate the configuration and pick the execution mode.
    pub fn execution_mode(&self) -> Result<ExecutionMode, ConfigError> {
        if self.batch_size < 0 {
            return Err(ConfigError::NegativeBatchSize(self.batch_size));
        }
        let size = usize::try_from(self.batch_size)
            .map_err(|_| ConfigError::BatchSizeTooLarge(self.batch_size))?;
        match (self.commit_mode, NonZeroUsize::new(size)) {
            (CommitMode::RowCount, Some(batch_size)) => Ok(ExecutionMode::RowCommit { batch_size }),
            _ => Ok(ExecutionMode::ProfileCommit),
        }
    }

    /// Statement timeout, if configured.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_profile_commit() {
        let config = UpsertConfig::default();
        assert_eq!(config.execution_mode(), Ok(ExecutionMode::ProfileCommit));
    }

    #[test]
    fn test_negative_batch_size_rejected() {
        let config = UpsertConfig {
            batch_size: -1,
            commit_mode: CommitMode::RowCount,
            ..Default::default()
        };
        assert_eq!(
            config.execution_mode(),
            Err(ConfigError::NegativeBatchSize(-1))
        );
    }

    #[test]
    fn test_zero_batch_size_forces_profile_commit() {
        let config = UpsertConfig {
            batch_size: 0,
            commit_mode: CommitMode::RowCount,
            ..Default::default()
        };
        assert_eq!(config.execution_mode(), Ok(ExecutionMode::ProfileCommit));
    }

    #[test]
    fn test_row_count_mode() {
        let config = UpsertConfig {
            batch_size: 50,
            commit_mode: CommitMode::RowCount,
            ..Default::default()
        };
        assert_eq!(
            config.execution_mode(),
            Ok(ExecutionMode::RowCommit {
                batch_size: NonZeroUsize::new(50).unwrap()
            })
        );
    }

    #[test]
    fn test_profile_mode_ignores_batch_size() {
        let config = UpsertConfig {
            batch_size: 50,
            commit_mode: CommitMode::Profile,
            ..Default::default()
        };
        assert_eq!(config.execution_mode(), Ok(ExecutionMode::ProfileCommit));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("row-count".parse::<CommitMode>(), Ok(CommitMode::RowCount));
        assert_eq!("NATIVE".parse::<UpsertStrategy>(), Ok(UpsertStrategy::Native));
        assert!("sometimes".parse::<ParamLogging>().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: UpsertConfig =
            serde_json::from_str(r#"{"batch_size": 10, "commit_mode": "row-count"}"#).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.commit_mode, CommitMode::RowCount);
        assert_eq!(config.strategy, UpsertStrategy::Probe);
        assert_eq!(config.param_logging, ParamLogging::Redact);
    }
}
