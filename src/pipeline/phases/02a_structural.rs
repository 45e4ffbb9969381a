use super::llm_helper::{to_prompt_json, StageQuery};
use crate::pipeline::input::DetectionInput;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::payload::Step2aPayload;
use crate::pipeline::stage::StageId;

pub async fn execute(query: &StageQuery<'_>, input: DetectionInput) -> StageOutcome<Step2aPayload> {
    let vars = [
        ("img_id", input.img_id.clone()),
        ("side", input.side.to_string()),
        ("geo", to_prompt_json(&input.geo)),
    ];

    query
        .ask(
            StageId::Step2A,
            &vars,
            Some(&input.image),
            Some((&input.img_id, input.side)),
        )
        .await
}
