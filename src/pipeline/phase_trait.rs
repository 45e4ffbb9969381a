use super::input::{DetectionInput, GeoInput, MappingInput, MergeInput, ProfileInput, ReportInput};
use super::outcome::StageOutcome;
use super::payload::{
    Step1Payload, Step2aPayload, Step2bPayload, Step2cPayload, Step3Payload, Step4Payload,
    Step5Payload,
};
use async_trait::async_trait;

/// The seven stage runners the orchestrator sequences.
///
/// Each method sees only its own narrow input and reports failure through the
/// error envelope rather than a Rust error, so retries, timeouts and response
/// repair stay inside the implementation.
#[async_trait]
pub trait IrisStages: Send + Sync {
    async fn geo_calibration(&self, input: GeoInput) -> StageOutcome<Step1Payload>;

    async fn structural_detection(&self, input: DetectionInput) -> StageOutcome<Step2aPayload>;

    async fn pigment_detection(&self, input: DetectionInput) -> StageOutcome<Step2bPayload>;

    async fn consistency_merge(&self, input: MergeInput) -> StageOutcome<Step2cPayload>;

    async fn zone_mapping(&self, input: MappingInput) -> StageOutcome<Step3Payload>;

    async fn build_profile(&self, input: ProfileInput) -> StageOutcome<Step4Payload>;

    async fn generate_report(&self, input: ReportInput) -> StageOutcome<Step5Payload>;
}
