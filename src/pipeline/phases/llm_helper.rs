use crate::llm::{ChatMessage, LLMClient, LLMRequest};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::input::{IrisImage, Side};
use crate::pipeline::outcome::{codes, StageOutcome, StepError};
use crate::pipeline::stage::StageId;
use crate::prompts::PromptCatalog;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are an iridology image analysis assistant. \
    Follow the requested output format exactly and respond with valid JSON only.";

/// Longest slice of raw model output quoted in a FORMAT_FAIL message.
const EXCERPT_CHARS: usize = 200;

pub(crate) fn extract_json_from_markdown(content: &str) -> &str {
    let trimmed = content.trim();

    if let Some(start_idx) = trimmed.find("```json") {
        let after_fence = &trimmed[start_idx + 7..];
        if let Some(end_idx) = after_fence.find("```") {
            return after_fence[..end_idx].trim();
        }
    }

    if let Some(start_idx) = trimmed.find("```") {
        let after_fence = &trimmed[start_idx + 3..];
        if let Some(end_idx) = after_fence.find("```") {
            return after_fence[..end_idx].trim();
        }
    }

    // prose around a bare object
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

fn format_fail(stage: StageId, message: String) -> StepError {
    StepError::new(stage, codes::FORMAT_FAIL, message).with_retry(true)
}

/// Reads a model-reported error object. Missing fields are tolerated and the
/// stage is always the one that was asked.
fn error_from_model(stage: StageId, error: &Value) -> StepError {
    let field = |name: &str| error.get(name).and_then(Value::as_str).map(str::to_string);

    StepError::new(
        stage,
        field("code").unwrap_or_else(|| codes::FORMAT_FAIL.to_string()),
        field("message").unwrap_or_else(|| "Model reported an unspecified error".to_string()),
    )
    .with_retry(
        error
            .get("canRetry")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    )
}

/// Turns raw model text into a stage outcome.
///
/// A top-level `"error"` key is the model refusing the task. When `identity`
/// is given, missing `imgId`/`side` keys are filled in before deserializing.
pub(crate) fn parse_stage_response<T: DeserializeOwned>(
    stage: StageId,
    content: &str,
    identity: Option<(&str, Side)>,
) -> StageOutcome<T> {
    let json = extract_json_from_markdown(content);

    let mut value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            return StageOutcome::failure(format_fail(
                stage,
                format!("Response is not valid JSON ({}): {}", e, excerpt(json)),
            ))
        }
    };

    if let Some(error) = value.get("error").filter(|e| e.is_object()) {
        return StageOutcome::failure(error_from_model(stage, error));
    }

    if let (Some(object), Some((img_id, side))) = (value.as_object_mut(), identity) {
        fill_identity(object, img_id, side);
    }

    match serde_json::from_value(value) {
        Ok(payload) => StageOutcome::success(payload),
        Err(e) => StageOutcome::failure(format_fail(
            stage,
            format!("Response does not match the {} schema: {}", stage, e),
        )),
    }
}

fn fill_identity(object: &mut Map<String, Value>, img_id: &str, side: Side) {
    object
        .entry("imgId")
        .or_insert_with(|| Value::String(img_id.to_string()));
    object
        .entry("side")
        .or_insert_with(|| Value::String(side.as_str().to_string()));
}

/// Compact JSON for prompt placeholders.
pub(crate) fn to_prompt_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Everything a stage needs to ask the model one question.
pub struct StageQuery<'a> {
    pub client: &'a dyn LLMClient,
    pub catalog: &'a dyn PromptCatalog,
    pub config: &'a PipelineConfig,
}

impl StageQuery<'_> {
    pub async fn ask<T: DeserializeOwned>(
        &self,
        stage: StageId,
        vars: &[(&str, String)],
        image: Option<&IrisImage>,
        identity: Option<(&str, Side)>,
    ) -> StageOutcome<T> {
        let Some(template) = self.catalog.template(stage) else {
            return StageOutcome::failure(StepError::new(
                stage,
                codes::PROMPT_MISSING,
                format!("No prompt configured for {}", stage),
            ));
        };

        let vars: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let prompt = template.render(&vars);

        let user = match image {
            Some(image) => ChatMessage::user_with_image(prompt, image.url.clone()),
            None => ChatMessage::user(prompt),
        };
        let request = LLMRequest::new(vec![ChatMessage::system(SYSTEM_PROMPT), user])
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let response = match self.client.chat(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(stage = %stage, error = %e, "LLM call failed");
                return StageOutcome::failure(
                    StepError::new(stage, codes::LLM_ERROR, e.to_string())
                        .with_retry(e.is_transient()),
                );
            }
        };

        debug!(
            stage = %stage,
            response_ms = response.response_time.as_millis(),
            chars = response.content.len(),
            "LLM response received"
        );

        parse_stage_response(stage, &response.content, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        img_id: String,
        side: Side,
        value: u32,
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json_from_markdown("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json_from_markdown("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(
            extract_json_from_markdown("Here you go: {\"a\":1} hope it helps"),
            "{\"a\":1}"
        );
        assert_eq!(extract_json_from_markdown("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fills_identity() {
        let outcome: StageOutcome<Probe> =
            parse_stage_response(StageId::Step2A, r#"{"value": 4}"#, Some(("img-9", Side::Right)));
        assert_eq!(
            outcome.as_success(),
            Some(&Probe {
                img_id: "img-9".into(),
                side: Side::Right,
                value: 4
            })
        );
    }

    #[test]
    fn test_parse_model_error_is_coerced_to_stage() {
        let outcome: StageOutcome<Probe> = parse_stage_response(
            StageId::Step1,
            r#"{"error": {"stage": "STEP9", "code": "NO_LIMBUS", "message": "limbus hidden"}}"#,
            None,
        );
        let error = outcome.as_failure().unwrap();
        assert_eq!(error.stage, StageId::Step1);
        assert_eq!(error.code, codes::NO_LIMBUS);
        assert_eq!(error.message, "limbus hidden");
        assert!(!error.can_retry);
    }

    #[test]
    fn test_parse_garbage_is_format_fail() {
        let outcome: StageOutcome<Probe> =
            parse_stage_response(StageId::Step3, "I cannot see an iris here.", None);
        let error = outcome.as_failure().unwrap();
        assert_eq!(error.code, codes::FORMAT_FAIL);
        assert!(error.can_retry);
    }

    #[test]
    fn test_parse_schema_mismatch_is_format_fail() {
        let outcome: StageOutcome<Probe> = parse_stage_response(
            StageId::Step3,
            r#"{"imgId": "a", "side": "left", "value": "many"}"#,
            None,
        );
        let error = outcome.as_failure().unwrap();
        assert_eq!(error.code, codes::FORMAT_FAIL);
        assert!(error.message.contains("STEP3"));
    }
}
