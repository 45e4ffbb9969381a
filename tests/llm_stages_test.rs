//! End-to-end runs of the model-backed stages against a scripted client

use irisflow::geometry::GeoReference;
use irisflow::llm::{MockLLMClient, MockResponse};
use irisflow::pipeline::{
    codes, IrisImage, LlmStages, PipelineOrchestrator, PipelineRequest, Side, SlotState, StageId,
};
use irisflow::prompts::BuiltinPromptCatalog;
use serde_json::{json, Value};
use std::sync::Arc;

fn fenced(value: Value) -> MockResponse {
    MockResponse::text(format!("Here is the result:\n```json\n{}\n```", value))
}

fn geo_response() -> MockResponse {
    fenced(json!({
        "imgId": "img-7",
        "side": "left",
        "ok": true,
        "rejectReasons": [],
        "quality": {"sharpness": 0.8, "limbusVisible": true},
        "geo": GeoReference::standard(),
        "refRay15Usable": true,
        "usableUpperIris": true,
        "invalidRegions": []
    }))
}

fn detection_responses() -> Vec<MockResponse> {
    vec![
        // identity omitted on purpose, filled from the request
        fenced(json!({
            "findings": [{"type": "lacuna", "minuteRange": [58, 2], "ringRange": [7, 5]}],
            "excluded": []
        })),
        fenced(json!({
            "imgId": "img-7",
            "side": "left",
            "global": {"constitution": "lymphatic"},
            "collarette": {"ANW_status": "regular", "minuteRange": [0, 59], "ringRange": [3, 3], "confidence": 0.6},
            "findings": [],
            "excluded": []
        })),
    ]
}

fn downstream_responses() -> Vec<MockResponse> {
    vec![
        fenced(json!({
            "findings_struct_clean": [
                {"type": "lacuna", "minuteRange": [58, 59], "ringRange": [5, 7]},
                {"type": "lacuna", "minuteRange": [0, 2], "ringRange": [5, 7]}
            ],
            "findings_pigment_clean": [],
            "collarette_clean": {"ANW_status": "regular", "minuteRange": [0, 59], "ringRange": [3, 3]},
            "global_clean": {"constitution": "lymphatic"},
            "dropped": [],
            "warnings": []
        })),
        fenced(json!({
            "mappedFindings": [
                {"type": "lacuna", "minuteRange": [0, 2], "ringRange": [5, 7], "zoneId": "L-BRAIN", "zoneName": "Brain", "subBand": "ORG"}
            ],
            "zoneSummary": [{"zoneId": "L-BRAIN", "zoneName": "Brain", "findingCount": 1}],
            "unmapped": [],
            "warnings": []
        })),
        fenced(json!({
            "base": {"constitution": "lymphatic"},
            "axesScore": {"stress": 0.6, "digestive": 0.3, "immune": 0.4},
            "elimChannels": [{"channel": "skin", "status": "reduced"}],
            "hypotheses": [{"title": "Stress load", "confidence": 0.5}],
            "verificationQuestions": ["Sleep quality?"]
        })),
        fenced(json!({
            "analysis": {"zones": [], "artifacts": [], "overallHealth": 68, "systemScores": [{"system": "nervous", "score": 55}]},
            "advice": {"priorities": ["rest"], "nutrition": {}, "lifestyle": {}, "followUp": []}
        })),
    ]
}

fn request() -> PipelineRequest {
    PipelineRequest::new(
        "img-7",
        Side::Left,
        IrisImage::from_url("https://example.org/left.jpg"),
    )
}

fn orchestrator(client: Arc<MockLLMClient>) -> PipelineOrchestrator {
    let catalog = Arc::new(BuiltinPromptCatalog::new());
    PipelineOrchestrator::new(Arc::new(LlmStages::new(client, catalog.clone())))
        .with_catalog(catalog)
}

#[tokio::test]
async fn test_full_run_with_fenced_answers() {
    let client = Arc::new(MockLLMClient::new());
    client.add_response(geo_response());
    client.add_responses(detection_responses());
    client.add_responses(downstream_responses());

    let outcome = orchestrator(client.clone()).run(request()).await;

    assert!(outcome.ok, "failed at {:?}: {:?}", outcome.failed_at(), outcome.error());
    assert_eq!(client.remaining_responses(), 0);
    assert_eq!(outcome.report().map(|r| r.analysis.overall_health), Some(68.0));

    let structural = outcome.ctx.structural().and_then(|o| o.as_success()).unwrap();
    assert_eq!(structural.img_id, "img-7");
    assert_eq!(structural.findings.len(), 2);

    let requests = client.requests();
    assert_eq!(requests.len(), 7);

    // only the image-reading stages carry the photo
    let with_image: Vec<bool> = requests.iter().map(|r| r.messages[1].has_image()).collect();
    assert_eq!(with_image, vec![true, true, true, false, false, false, false]);

    // the merge prompt sees the normalized, split ranges
    let merge_prompt = &requests[3].messages[1].content;
    assert!(merge_prompt.contains("[58,59]"));
    assert!(merge_prompt.contains("[0,2]"));
    assert!(merge_prompt.contains("[5,7]"));
}

#[tokio::test]
async fn test_unparseable_answer_is_format_fail() {
    let client = Arc::new(MockLLMClient::new());
    client.add_response(geo_response());
    client.add_responses(detection_responses());
    client.add_response(MockResponse::text("The iris looks healthy overall."));
    client.add_responses(downstream_responses().into_iter().skip(1));

    let outcome = orchestrator(client.clone()).run(request()).await;

    assert!(!outcome.ok);
    assert_eq!(outcome.failed_at(), Some(StageId::Step2C));
    let error = outcome.error().unwrap();
    assert_eq!(error.code, codes::FORMAT_FAIL);
    assert!(error.can_retry);

    assert_eq!(client.requests().len(), 4);
    assert_eq!(client.remaining_responses(), 3);
    assert_eq!(outcome.ctx.slot_state(StageId::Step3), SlotState::Empty);
}

#[tokio::test]
async fn test_model_refusal_at_geo_stops_run() {
    let client = Arc::new(MockLLMClient::new());
    client.add_response(MockResponse::json(&json!({
        "error": {"stage": "STEP1", "code": "NO_LIMBUS", "message": "limbus outside frame", "canRetry": false}
    })));

    let outcome = orchestrator(client.clone()).run(request()).await;

    assert_eq!(outcome.failed_at(), Some(StageId::Step1));
    assert_eq!(outcome.error().map(|e| e.code.as_str()), Some(codes::NO_LIMBUS));
    assert_eq!(client.requests().len(), 1);
}
