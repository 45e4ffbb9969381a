//! Per-run accumulator of stage results
//!
//! Every transition consumes the context and hands back the updated one, so
//! a stage can only observe what earlier stages stored. Slots are write-once:
//! a second write to a filled slot is dropped with a warning.

use super::outcome::{StageOutcome, StepError};
use super::payload::{
    Step1Payload, Step2aPayload, Step2bPayload, Step2cPayload, Step3Payload, Step4Payload,
    Step5Payload,
};
use super::stage::StageId;
use crate::geometry::RangeNormalizer;
use crate::prompts::PromptProvenance;
use serde::Serialize;
use tracing::warn;

/// Binds a payload type to the stage that produces it and to its slot.
pub trait StagePayload: Sized + Send + 'static {
    const STAGE: StageId;

    fn slot(ctx: &PipelineContext) -> Option<&StageOutcome<Self>>;

    fn slot_mut(ctx: &mut PipelineContext) -> &mut Option<StageOutcome<Self>>;
}

macro_rules! stage_payload {
    ($payload:ty, $stage:expr, $field:ident) => {
        impl StagePayload for $payload {
            const STAGE: StageId = $stage;

            fn slot(ctx: &PipelineContext) -> Option<&StageOutcome<Self>> {
                ctx.$field.as_ref()
            }

            fn slot_mut(ctx: &mut PipelineContext) -> &mut Option<StageOutcome<Self>> {
                &mut ctx.$field
            }
        }
    };
}

stage_payload!(Step1Payload, StageId::Step1, geo);
stage_payload!(Step2aPayload, StageId::Step2A, structural);
stage_payload!(Step2bPayload, StageId::Step2B, pigment);
stage_payload!(Step2cPayload, StageId::Step2C, cleaned);
stage_payload!(Step3Payload, StageId::Step3, mapping);
stage_payload!(Step4Payload, StageId::Step4, profile);
stage_payload!(Step5Payload, StageId::Step5, report);

/// What a slot currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Empty,
    Success,
    Failed,
}

impl SlotState {
    fn of<T>(slot: Option<&StageOutcome<T>>) -> Self {
        match slot {
            None => SlotState::Empty,
            Some(StageOutcome::Success(_)) => SlotState::Success,
            Some(StageOutcome::Failure { .. }) => SlotState::Failed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    geo: Option<StageOutcome<Step1Payload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    structural: Option<StageOutcome<Step2aPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pigment: Option<StageOutcome<Step2bPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cleaned: Option<StageOutcome<Step2cPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mapping: Option<StageOutcome<Step3Payload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<StageOutcome<Step4Payload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<StageOutcome<Step5Payload>>,
    #[serde(skip)]
    normalizer: Option<RangeNormalizer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_at: Option<StageId>,
    prompts: Vec<PromptProvenance>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geo(&self) -> Option<&StageOutcome<Step1Payload>> {
        self.geo.as_ref()
    }

    pub fn structural(&self) -> Option<&StageOutcome<Step2aPayload>> {
        self.structural.as_ref()
    }

    pub fn pigment(&self) -> Option<&StageOutcome<Step2bPayload>> {
        self.pigment.as_ref()
    }

    pub fn cleaned(&self) -> Option<&StageOutcome<Step2cPayload>> {
        self.cleaned.as_ref()
    }

    pub fn mapping(&self) -> Option<&StageOutcome<Step3Payload>> {
        self.mapping.as_ref()
    }

    pub fn profile(&self) -> Option<&StageOutcome<Step4Payload>> {
        self.profile.as_ref()
    }

    pub fn report(&self) -> Option<&StageOutcome<Step5Payload>> {
        self.report.as_ref()
    }

    pub fn normalizer(&self) -> Option<&RangeNormalizer> {
        self.normalizer.as_ref()
    }

    pub fn failed_at(&self) -> Option<StageId> {
        self.failed_at
    }

    pub fn prompts(&self) -> &[PromptProvenance] {
        &self.prompts
    }

    pub fn outcome<P: StagePayload>(&self) -> Option<&StageOutcome<P>> {
        P::slot(self)
    }

    /// Stores a stage result unless the slot is already filled.
    pub fn with_outcome<P: StagePayload>(mut self, outcome: StageOutcome<P>) -> Self {
        let slot = P::slot_mut(&mut self);
        if slot.is_some() {
            warn!(stage = %P::STAGE, "Stage slot already filled, keeping first result");
        } else {
            *slot = Some(outcome);
        }
        self
    }

    pub fn with_geo(self, outcome: StageOutcome<Step1Payload>) -> Self {
        self.with_outcome(outcome)
    }

    pub fn with_structural(self, outcome: StageOutcome<Step2aPayload>) -> Self {
        self.with_outcome(outcome)
    }

    pub fn with_pigment(self, outcome: StageOutcome<Step2bPayload>) -> Self {
        self.with_outcome(outcome)
    }

    pub fn with_cleaned(self, outcome: StageOutcome<Step2cPayload>) -> Self {
        self.with_outcome(outcome)
    }

    pub fn with_mapping(self, outcome: StageOutcome<Step3Payload>) -> Self {
        self.with_outcome(outcome)
    }

    pub fn with_profile(self, outcome: StageOutcome<Step4Payload>) -> Self {
        self.with_outcome(outcome)
    }

    pub fn with_report(self, outcome: StageOutcome<Step5Payload>) -> Self {
        self.with_outcome(outcome)
    }

    /// Stores an error envelope at `stage`'s slot.
    pub fn with_failure(self, stage: StageId, error: StepError) -> Self {
        match stage {
            StageId::Step1 => self.with_outcome::<Step1Payload>(StageOutcome::failure(error)),
            StageId::Step2A => self.with_outcome::<Step2aPayload>(StageOutcome::failure(error)),
            StageId::Step2B => self.with_outcome::<Step2bPayload>(StageOutcome::failure(error)),
            StageId::Step2C => self.with_outcome::<Step2cPayload>(StageOutcome::failure(error)),
            StageId::Step3 => self.with_outcome::<Step3Payload>(StageOutcome::failure(error)),
            StageId::Step4 => self.with_outcome::<Step4Payload>(StageOutcome::failure(error)),
            StageId::Step5 => self.with_outcome::<Step5Payload>(StageOutcome::failure(error)),
        }
    }

    /// Freezes the run's normalizer. Only the first call has any effect.
    pub fn with_normalizer(mut self, normalizer: RangeNormalizer) -> Self {
        match self.normalizer {
            Some(existing) if existing != normalizer => {
                warn!("Normalizer already frozen for this run, ignoring replacement");
            }
            Some(_) => {}
            None => self.normalizer = Some(normalizer),
        }
        self
    }

    /// Marks the first failing stage. Never cleared, never moved.
    pub fn fail_at(mut self, stage: StageId) -> Self {
        if self.failed_at.is_none() {
            self.failed_at = Some(stage);
        }
        self
    }

    pub fn with_prompt(mut self, provenance: PromptProvenance) -> Self {
        self.prompts.push(provenance);
        self
    }

    pub fn slot_state(&self, stage: StageId) -> SlotState {
        match stage {
            StageId::Step1 => SlotState::of(self.geo.as_ref()),
            StageId::Step2A => SlotState::of(self.structural.as_ref()),
            StageId::Step2B => SlotState::of(self.pigment.as_ref()),
            StageId::Step2C => SlotState::of(self.cleaned.as_ref()),
            StageId::Step3 => SlotState::of(self.mapping.as_ref()),
            StageId::Step4 => SlotState::of(self.profile.as_ref()),
            StageId::Step5 => SlotState::of(self.report.as_ref()),
        }
    }

    /// The error envelope stored at `stage`, if that stage failed.
    pub fn slot_error(&self, stage: StageId) -> Option<&StepError> {
        match stage {
            StageId::Step1 => self.geo.as_ref().and_then(StageOutcome::as_failure),
            StageId::Step2A => self.structural.as_ref().and_then(StageOutcome::as_failure),
            StageId::Step2B => self.pigment.as_ref().and_then(StageOutcome::as_failure),
            StageId::Step2C => self.cleaned.as_ref().and_then(StageOutcome::as_failure),
            StageId::Step3 => self.mapping.as_ref().and_then(StageOutcome::as_failure),
            StageId::Step4 => self.profile.as_ref().and_then(StageOutcome::as_failure),
            StageId::Step5 => self.report.as_ref().and_then(StageOutcome::as_failure),
        }
    }

    /// True when every stage stored a success payload.
    pub fn is_complete(&self) -> bool {
        StageId::ALL
            .iter()
            .all(|stage| self.slot_state(*stage) == SlotState::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoReference;
    use crate::pipeline::input::Side;
    use crate::pipeline::outcome::codes;
    use crate::prompts::PromptRef;

    fn structural(img_id: &str) -> Step2aPayload {
        Step2aPayload {
            img_id: img_id.to_string(),
            side: Side::Left,
            findings: Vec::new(),
            excluded: Vec::new(),
        }
    }

    #[test]
    fn test_empty_context() {
        let ctx = PipelineContext::new();
        assert!(ctx.geo().is_none());
        assert!(ctx.failed_at().is_none());
        assert!(!ctx.is_complete());
        for stage in StageId::ALL {
            assert_eq!(ctx.slot_state(stage), SlotState::Empty);
        }
    }

    #[test]
    fn test_slot_is_write_once() {
        let ctx = PipelineContext::new()
            .with_structural(StageOutcome::success(structural("first")))
            .with_structural(StageOutcome::success(structural("second")));

        let stored = ctx.structural().and_then(StageOutcome::as_success).unwrap();
        assert_eq!(stored.img_id, "first");
    }

    #[test]
    fn test_failure_lands_in_stage_slot() {
        let error = StepError::new(StageId::Step2B, codes::FORMAT_FAIL, "bad json");
        let ctx = PipelineContext::new()
            .with_failure(StageId::Step2B, error.clone())
            .fail_at(StageId::Step2B);

        assert_eq!(ctx.slot_state(StageId::Step2B), SlotState::Failed);
        assert_eq!(ctx.slot_error(StageId::Step2B), Some(&error));
        assert_eq!(ctx.failed_at(), Some(StageId::Step2B));
    }

    #[test]
    fn test_failed_at_is_sticky() {
        let ctx = PipelineContext::new()
            .fail_at(StageId::Step2A)
            .fail_at(StageId::Step3);
        assert_eq!(ctx.failed_at(), Some(StageId::Step2A));
    }

    #[test]
    fn test_normalizer_frozen_once() {
        let standard = RangeNormalizer::new(&GeoReference::standard()).unwrap();
        let mut other_geo = GeoReference::standard();
        other_geo.mins = 120;
        let other = RangeNormalizer::new(&other_geo).unwrap();

        let ctx = PipelineContext::new()
            .with_normalizer(standard)
            .with_normalizer(other);
        assert_eq!(ctx.normalizer(), Some(&standard));
    }

    #[test]
    fn test_serializes_only_filled_slots() {
        let ctx = PipelineContext::new()
            .with_failure(
                StageId::Step1,
                StepError::new(StageId::Step1, codes::NO_LIMBUS, "no limbus"),
            )
            .fail_at(StageId::Step1)
            .with_prompt(PromptProvenance::new(
                StageId::Step1,
                PromptRef {
                    source: "builtin:step1@v3".into(),
                    checksum: "abc".into(),
                },
            ));

        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["geo"]["error"]["code"], "NO_LIMBUS");
        assert_eq!(value["failedAt"], "STEP1");
        assert_eq!(value["prompts"][0]["source"], "builtin:step1@v3");
        assert!(value.get("structural").is_none());
        assert!(value.get("normalizer").is_none());
    }
}
