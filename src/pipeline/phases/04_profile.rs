use super::llm_helper::{to_prompt_json, StageQuery};
use crate::pipeline::input::ProfileInput;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::payload::Step4Payload;
use crate::pipeline::stage::StageId;

pub async fn execute(query: &StageQuery<'_>, input: ProfileInput) -> StageOutcome<Step4Payload> {
    let img_id = input.mapping.img_id.clone();
    let side = input.mapping.side;
    let vars = [
        ("img_id", img_id.clone()),
        ("side", side.to_string()),
        ("patient", to_prompt_json(&input.patient)),
        ("mapping", to_prompt_json(&input.mapping)),
    ];

    query
        .ask(StageId::Step4, &vars, None, Some((&img_id, side)))
        .await
}
