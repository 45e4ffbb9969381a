// LLM-backed stage runners
//
// One file per stage, numbered in execution order. Each renders its catalog
// prompt from the stage input and parses the model's answer into the stage
// payload or an error envelope.

pub mod llm_helper;

#[path = "01_geo.rs"]
pub mod geo;
#[path = "02a_structural.rs"]
pub mod structural;
#[path = "02b_pigment.rs"]
pub mod pigment;
#[path = "02c_merge.rs"]
pub mod merge;
#[path = "03_zones.rs"]
pub mod zones;
#[path = "04_profile.rs"]
pub mod profile;
#[path = "05_report.rs"]
pub mod report;

use super::config::PipelineConfig;
use super::input::{DetectionInput, GeoInput, MappingInput, MergeInput, ProfileInput, ReportInput};
use super::outcome::StageOutcome;
use super::payload::{
    Step1Payload, Step2aPayload, Step2bPayload, Step2cPayload, Step3Payload, Step4Payload,
    Step5Payload,
};
use super::phase_trait::IrisStages;
use crate::llm::LLMClient;
use crate::prompts::PromptCatalog;
use async_trait::async_trait;
use llm_helper::StageQuery;
use std::sync::Arc;

/// [`IrisStages`] backed by an inference client and a prompt catalog.
pub struct LlmStages {
    client: Arc<dyn LLMClient>,
    catalog: Arc<dyn PromptCatalog>,
    config: PipelineConfig,
}

impl LlmStages {
    pub fn new(client: Arc<dyn LLMClient>, catalog: Arc<dyn PromptCatalog>) -> Self {
        Self {
            client,
            catalog,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    fn query(&self) -> StageQuery<'_> {
        StageQuery {
            client: self.client.as_ref(),
            catalog: self.catalog.as_ref(),
            config: &self.config,
        }
    }
}

#[async_trait]
impl IrisStages for LlmStages {
    async fn geo_calibration(&self, input: GeoInput) -> StageOutcome<Step1Payload> {
        geo::execute(&self.query(), input).await
    }

    async fn structural_detection(&self, input: DetectionInput) -> StageOutcome<Step2aPayload> {
        structural::execute(&self.query(), input).await
    }

    async fn pigment_detection(&self, input: DetectionInput) -> StageOutcome<Step2bPayload> {
        pigment::execute(&self.query(), input).await
    }

    async fn consistency_merge(&self, input: MergeInput) -> StageOutcome<Step2cPayload> {
        merge::execute(&self.query(), input).await
    }

    async fn zone_mapping(&self, input: MappingInput) -> StageOutcome<Step3Payload> {
        zones::execute(&self.query(), input).await
    }

    async fn build_profile(&self, input: ProfileInput) -> StageOutcome<Step4Payload> {
        profile::execute(&self.query(), input).await
    }

    async fn generate_report(&self, input: ReportInput) -> StageOutcome<Step5Payload> {
        report::execute(&self.query(), input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoReference;
    use crate::llm::{BackendError, MockLLMClient, MockResponse};
    use crate::pipeline::input::{IrisImage, PatientMeta, Side};
    use crate::pipeline::outcome::codes;
    use crate::pipeline::stage::StageId;
    use crate::prompts::BuiltinPromptCatalog;
    use serde_json::json;

    fn stages(client: Arc<MockLLMClient>) -> LlmStages {
        LlmStages::new(client, Arc::new(BuiltinPromptCatalog::new()))
            .with_config(PipelineConfig::new().with_max_tokens(512))
    }

    fn geo_input() -> GeoInput {
        GeoInput {
            img_id: "img-3".into(),
            side: Side::Left,
            image: IrisImage::from_url("https://example.org/left.jpg"),
            patient: PatientMeta::default(),
        }
    }

    #[tokio::test]
    async fn test_geo_calibration_sends_image_and_rendered_prompt() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text(format!(
            "```json\n{}\n```",
            json!({"ok": true, "geo": GeoReference::standard()})
        )));

        let outcome = stages(client.clone()).geo_calibration(geo_input()).await;
        let payload = outcome.as_success().unwrap();
        assert_eq!(payload.img_id, "img-3");
        assert_eq!(payload.side, Side::Left);
        assert!(payload.ok);

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, Some(512));
        let user = &requests[0].messages[1];
        assert_eq!(user.image_url.as_deref(), Some("https://example.org/left.jpg"));
        assert!(user.content.contains("Image id: img-3"));
        assert!(!user.content.contains("{{"));
    }

    #[tokio::test]
    async fn test_transport_error_becomes_llm_error() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::error(BackendError::TimeoutError { seconds: 120 }));

        let outcome = stages(client).geo_calibration(geo_input()).await;
        let error = outcome.as_failure().unwrap();
        assert_eq!(error.stage, StageId::Step1);
        assert_eq!(error.code, codes::LLM_ERROR);
        assert!(error.can_retry);
    }

    #[tokio::test]
    async fn test_model_refusal_becomes_envelope() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::json(&json!({
            "error": {"stage": "STEP1", "code": "LOW_QUALITY", "message": "motion blur", "canRetry": false}
        })));

        let outcome = stages(client).geo_calibration(geo_input()).await;
        assert_eq!(outcome.as_failure().unwrap().code, codes::LOW_QUALITY);
    }
}
