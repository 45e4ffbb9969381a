use super::llm_helper::{to_prompt_json, StageQuery};
use crate::pipeline::input::MergeInput;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::payload::Step2cPayload;
use crate::pipeline::stage::StageId;

/// Text-only: both detections are already normalized, so the model works on
/// canonical ranges and never sees the image again.
pub async fn execute(query: &StageQuery<'_>, input: MergeInput) -> StageOutcome<Step2cPayload> {
    let img_id = input.structural.img_id.clone();
    let side = input.structural.side;
    let vars = [
        ("img_id", img_id.clone()),
        ("side", side.to_string()),
        ("structural", to_prompt_json(&input.structural)),
        ("pigment", to_prompt_json(&input.pigment)),
    ];

    query
        .ask(StageId::Step2C, &vars, None, Some((&img_id, side)))
        .await
}
