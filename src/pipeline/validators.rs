//! Prerequisite gate run before every stage
//!
//! A stage is admitted only if the slots it depends on hold success
//! payloads. When a dependency failed, its error is forwarded unchanged so the
//! root cause stays visible at every later stage.

use super::context::PipelineContext;
use super::outcome::{StageOutcome, StepError};
use super::payload::Step1Payload;
use super::stage::StageId;
use serde::{Deserialize, Serialize};

/// The upstream error a stage was blocked by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingError {
    pub stage: StageId,
    pub code: String,
    pub message: String,
}

impl From<&StepError> for BlockingError {
    fn from(error: &StepError) -> Self {
        Self {
            stage: error.stage,
            code: error.code.clone(),
            message: error.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteCheck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_error: Option<BlockingError>,
}

impl PrerequisiteCheck {
    pub fn passed() -> Self {
        Self {
            ok: true,
            reason: None,
            blocking_error: None,
        }
    }

    pub fn missing(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            blocking_error: None,
        }
    }

    pub fn blocked(reason: impl Into<String>, error: &StepError) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            blocking_error: Some(BlockingError::from(error)),
        }
    }

    /// The envelope to store at `stage` when this check failed: the blocking
    /// error's code and message if there is one, `PRECONDITION_FAILED` with
    /// the reason otherwise.
    pub fn to_step_error(&self, stage: StageId) -> StepError {
        match &self.blocking_error {
            Some(blocking) => StepError::new(stage, &blocking.code, &blocking.message),
            None => StepError::precondition(
                stage,
                self.reason
                    .as_deref()
                    .unwrap_or("Prerequisites not satisfied"),
            ),
        }
    }
}

type Gate = Result<(), PrerequisiteCheck>;

fn require<'a, T>(
    slot: Option<&'a StageOutcome<T>>,
    what: &str,
) -> Result<&'a T, PrerequisiteCheck> {
    match slot {
        None => Err(PrerequisiteCheck::missing(format!("Missing {}", what))),
        Some(StageOutcome::Failure { error }) => Err(PrerequisiteCheck::blocked(
            format!("{} failed at {}", what, error.stage),
            error,
        )),
        Some(StageOutcome::Success(payload)) => Ok(payload),
    }
}

fn geo_gate(ctx: &PipelineContext) -> Gate {
    let geo: &Step1Payload = require(ctx.geo(), "geo data")?;
    if !geo.ok {
        let reason = if geo.reject_reasons.is_empty() {
            "Image rejected by geo calibration".to_string()
        } else {
            format!(
                "Image rejected by geo calibration: {}",
                geo.reject_reasons.join(", ")
            )
        };
        return Err(PrerequisiteCheck::missing(reason));
    }
    Ok(())
}

fn check(stage: StageId, ctx: &PipelineContext) -> Gate {
    match stage {
        StageId::Step1 => Ok(()),
        StageId::Step2A | StageId::Step2B => geo_gate(ctx),
        StageId::Step2C => {
            geo_gate(ctx)?;
            require(ctx.structural(), "structural findings")?;
            require(ctx.pigment(), "pigment findings")?;
            Ok(())
        }
        StageId::Step3 => {
            geo_gate(ctx)?;
            require(ctx.cleaned(), "cleaned findings")?;
            Ok(())
        }
        StageId::Step4 => require(ctx.mapping(), "zone mapping").map(|_| ()),
        StageId::Step5 => require(ctx.profile(), "profile").map(|_| ()),
    }
}

/// Decides whether `stage` may run against `ctx`.
pub fn validate_prerequisites(stage: StageId, ctx: &PipelineContext) -> PrerequisiteCheck {
    match check(stage, ctx) {
        Ok(()) => PrerequisiteCheck::passed(),
        Err(failed) => failed,
    }
}

/// Same as [`validate_prerequisites`] for a stage given by name. Unknown
/// names fail the check.
pub fn validate_prerequisites_named(stage: &str, ctx: &PipelineContext) -> PrerequisiteCheck {
    match stage.parse::<StageId>() {
        Ok(stage) => validate_prerequisites(stage, ctx),
        Err(unknown) => PrerequisiteCheck::missing(unknown.to_string()),
    }
}
