use super::llm_helper::{to_prompt_json, StageQuery};
use crate::pipeline::input::GeoInput;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::payload::Step1Payload;
use crate::pipeline::stage::StageId;

pub async fn execute(query: &StageQuery<'_>, input: GeoInput) -> StageOutcome<Step1Payload> {
    let vars = [
        ("img_id", input.img_id.clone()),
        ("side", input.side.to_string()),
        ("patient", to_prompt_json(&input.patient)),
    ];

    query
        .ask(
            StageId::Step1,
            &vars,
            Some(&input.image),
            Some((&input.img_id, input.side)),
        )
        .await
}
