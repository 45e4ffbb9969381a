use super::llm_helper::{to_prompt_json, StageQuery};
use crate::pipeline::input::ReportInput;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::payload::Step5Payload;
use crate::pipeline::stage::StageId;

pub async fn execute(query: &StageQuery<'_>, input: ReportInput) -> StageOutcome<Step5Payload> {
    let vars = [
        ("img_id", input.profile.img_id.clone()),
        ("side", input.profile.side.to_string()),
        ("patient", to_prompt_json(&input.patient)),
        ("profile", to_prompt_json(&input.profile)),
    ];

    query.ask(StageId::Step5, &vars, None, None).await
}
