//! Stage results: a success payload or the shared error envelope

use super::stage::StageId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes the pipeline itself produces. Stage runners may return any
/// other code; the orchestrator treats all of them alike.
pub mod codes {
    pub const PRECONDITION_FAILED: &str = "PRECONDITION_FAILED";
    pub const FORMAT_FAIL: &str = "FORMAT_FAIL";
    pub const LOW_QUALITY: &str = "LOW_QUALITY";
    pub const NO_LIMBUS: &str = "NO_LIMBUS";
    pub const LLM_ERROR: &str = "LLM_ERROR";
    pub const INVALID_GEO: &str = "INVALID_GEO";
    pub const PROMPT_MISSING: &str = "PROMPT_MISSING";
}

/// The error envelope every stage reports failure with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{stage} failed with {code}: {message}")]
pub struct StepError {
    pub stage: StageId,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub can_retry: bool,
}

impl StepError {
    pub fn new(stage: StageId, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            code: code.into(),
            message: message.into(),
            can_retry: false,
        }
    }

    pub fn precondition(stage: StageId, reason: impl Into<String>) -> Self {
        Self::new(stage, codes::PRECONDITION_FAILED, reason)
    }

    pub fn with_retry(mut self, can_retry: bool) -> Self {
        self.can_retry = can_retry;
        self
    }

    pub fn is_precondition(&self) -> bool {
        self.code == codes::PRECONDITION_FAILED
    }

    /// Wire form, `{"error": {...}}`.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: StepError,
}

/// Result of one stage. Exactly one of the two shapes, never both.
///
/// Serializes as the bare payload on success and as `{"error": {...}}` on
/// failure, matching what stage runners exchange on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageOutcome<T> {
    Failure { error: StepError },
    Success(T),
}

impl<T> StageOutcome<T> {
    pub fn success(payload: T) -> Self {
        StageOutcome::Success(payload)
    }

    pub fn failure(error: StepError) -> Self {
        StageOutcome::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn as_success(&self) -> Option<&T> {
        match self {
            StageOutcome::Success(payload) => Some(payload),
            StageOutcome::Failure { .. } => None,
        }
    }

    pub fn as_failure(&self) -> Option<&StepError> {
        match self {
            StageOutcome::Failure { error } => Some(error),
            StageOutcome::Success(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            StageOutcome::Success(payload) => StageOutcome::Success(f(payload)),
            StageOutcome::Failure { error } => StageOutcome::Failure { error },
        }
    }

    /// Like `map`, but the closure may turn a success into a failure.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> StageOutcome<U>) -> StageOutcome<U> {
        match self {
            StageOutcome::Success(payload) => f(payload),
            StageOutcome::Failure { error } => StageOutcome::Failure { error },
        }
    }

    pub fn into_result(self) -> Result<T, StepError> {
        match self {
            StageOutcome::Success(payload) => Ok(payload),
            StageOutcome::Failure { error } => Err(error),
        }
    }
}

impl<T> From<Result<T, StepError>> for StageOutcome<T> {
    fn from(result: Result<T, StepError>) -> Self {
        match result {
            Ok(payload) => StageOutcome::Success(payload),
            Err(error) => StageOutcome::Failure { error },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn test_error_envelope_wire_shape() {
        let error = StepError::new(StageId::Step1, codes::NO_LIMBUS, "limbus not visible")
            .with_retry(true);
        let outcome: StageOutcome<Payload> = StageOutcome::failure(error);

        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "error": {
                    "stage": "STEP1",
                    "code": "NO_LIMBUS",
                    "message": "limbus not visible",
                    "canRetry": true
                }
            })
        );
    }

    #[test]
    fn test_deserialize_picks_variant() {
        let ok: StageOutcome<Payload> = serde_json::from_value(json!({"value": 3})).unwrap();
        assert_eq!(ok, StageOutcome::success(Payload { value: 3 }));

        let err: StageOutcome<Payload> = serde_json::from_value(json!({
            "error": {"stage": "STEP3", "code": "FORMAT_FAIL", "message": "bad json"}
        }))
        .unwrap();
        let error = err.as_failure().unwrap();
        assert_eq!(error.stage, StageId::Step3);
        assert!(!error.can_retry);
    }

    #[test]
    fn test_combinators() {
        let outcome = StageOutcome::success(Payload { value: 2 }).map(|p| p.value * 10);
        assert_eq!(outcome.as_success(), Some(&20));

        let failed: StageOutcome<u32> = StageOutcome::success(1)
            .and_then(|_| StageOutcome::failure(StepError::precondition(StageId::Step2C, "nope")));
        assert!(failed.is_failure());
        assert!(failed.as_failure().unwrap().is_precondition());

        let result: Result<u32, StepError> = failed.into_result();
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        let error = StepError::new(StageId::Step2B, codes::FORMAT_FAIL, "truncated");
        assert_eq!(error.to_string(), "STEP2B failed with FORMAT_FAIL: truncated");
    }
}
