//! Per-record results.

use crate::error::{ErrorClass, RecordError};
use serde::Serialize;
use serde_json::Value;

/// Status of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The record was written
    Success,
    /// The record was rejected; the caller can fix it and resubmit
    ApplicationError,
    /// The record could not be processed because the connector failed
    Failure,
}

/// Result emitted for exactly one input record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Zero-based position of the record in the input stream
    pub index: u64,
    /// Overall status
    pub status: OutcomeStatus,
    /// Numeric status code (200, 400, 422, 500, 503)
    pub status_code: u16,
    /// Human-readable message; failures carry the original error text
    pub message: String,
    /// Error class for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    /// Response body
    pub payload: Value,
}

impl Outcome {
    /// A successful write.
    pub fn success(index: u64, message: impl Into<String>, payload: Value) -> Self {
        Self {
            index,
            status: OutcomeStatus::Success,
            status_code: 200,
            message: message.into(),
            error_class: None,
            payload,
        }
    }

    /// A failed record.
    pub fn failed(index: u64, error: &RecordError) -> Self {
        let class = error.class();
        let (status, status_code) = match class {
            ErrorClass::Input => (OutcomeStatus::ApplicationError, 400),
            ErrorClass::InvalidArgument => (OutcomeStatus::ApplicationError, 422),
            ErrorClass::Statement => (OutcomeStatus::ApplicationError, 500),
            ErrorClass::Connector => (OutcomeStatus::Failure, 503),
        };
        Self {
            index,
            status,
            status_code,
            message: error.to_string(),
            error_class: Some(class),
            payload: Value::Null,
        }
    }

    /// Whether the record was written.
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Affected-row count from the payload, when present.
    pub fn affected_rows(&self) -> Option<u64> {
        self.payload.get("affected_rows").and_then(Value::as_u64)
    }
}

/// Receiver of Outcomes, in input order.
pub trait OutcomeSink {
    /// Accept the next Outcome.
    fn emit(&mut self, outcome: Outcome);
}

impl OutcomeSink for Vec<Outcome> {
    fn emit(&mut self, outcome: Outcome) {
        self.push(outcome);
    }
}

impl<F> OutcomeSink for F
where
    F: FnMut(Outcome),
{
    fn emit(&mut self, outcome: Outcome) {
        self(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DbError, InputError};
    use serde_json::json;

    #[test]
    fn test_success_outcome() {
        let outcome = Outcome::success(3, "Record inserted", json!({"affected_rows": 1}));
        assert!(outcome.is_success());
        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.affected_rows(), Some(1));
    }

    #[test]
    fn test_failed_outcome_carries_error_text() {
        let err: RecordError = DbError::statement("duplicate key value").into();
        let outcome = Outcome::failed(0, &err);
        assert_eq!(outcome.status, OutcomeStatus::ApplicationError);
        assert_eq!(outcome.status_code, 500);
        assert_eq!(outcome.message, "duplicate key value");
        assert_eq!(outcome.error_class, Some(ErrorClass::Statement));
    }

    #[test]
    fn test_connector_failure_status() {
        let err: RecordError = DbError::connection("connection reset").into();
        let outcome = Outcome::failed(9, &err);
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert_eq!(outcome.status_code, 503);
    }

    #[test]
    fn test_serialized_shape() {
        let err: RecordError = InputError::NotAnObject("string").into();
        let value = serde_json::to_value(Outcome::failed(1, &err)).unwrap();
        assert_eq!(value["status"], "application_error");
        assert_eq!(value["error_class"], "input");
        assert_eq!(value["status_code"], 400);
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |o: Outcome| seen.push(o.index);
            sink.emit(Outcome::success(0, "ok", Value::Null));
            sink.emit(Outcome::success(1, "ok", Value::Null));
        }
        assert_eq!(seen, vec![0, 1]);
    }
}
