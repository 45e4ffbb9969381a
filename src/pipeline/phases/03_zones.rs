use super::llm_helper::{to_prompt_json, StageQuery};
use crate::pipeline::input::MappingInput;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::payload::Step3Payload;
use crate::pipeline::stage::StageId;

pub async fn execute(query: &StageQuery<'_>, input: MappingInput) -> StageOutcome<Step3Payload> {
    let img_id = input.cleaned.img_id.clone();
    let side = input.cleaned.side;
    let vars = [
        ("img_id", img_id.clone()),
        ("side", side.to_string()),
        ("geo", to_prompt_json(&input.geo)),
        ("cleaned", to_prompt_json(&input.cleaned)),
    ];

    query
        .ask(StageId::Step3, &vars, None, Some((&img_id, side)))
        .await
}
