//! Compiled-in stage prompts
//!
//! Placeholders use `{{name}}` and are filled by [`PromptTemplate::render`].
//! Every stage receives `img_id` and `side`; the remaining placeholders are
//! JSON documents serialized from the stage input.
//!
//! [`PromptTemplate::render`]: super::PromptTemplate::render

use crate::pipeline::StageId;

/// Bumped whenever any builtin body below changes.
pub const BUILTIN_VERSION: &str = "v3";

const ERROR_CONTRACT: &str = r#"If the task cannot be completed, respond ONLY with:
{"error": {"stage": "{{stage}}", "code": "<CODE>", "message": "<short reason>", "canRetry": false}}"#;

const STEP1_GEO: &str = r#"You are calibrating an iris photograph for iridology chart mapping.

Image id: {{img_id}}
Eye side: {{side}}
Patient: {{patient}}

Locate the pupil edge and the limbus. Use a 60-minute clock face (minute 0 at 12 o'clock,
clockwise as seen by the viewer) and 12 concentric rings (ring 0 at the pupil edge, ring 11
at the limbus). Report whether the reference ray at minute 15 is usable and whether the upper
iris is visible above the eyelid. List regions hidden by glare, lashes or eyelids.

Respond with JSON only:
{
  "imgId": "{{img_id}}",
  "side": "{{side}}",
  "ok": true,
  "rejectReasons": [],
  "quality": {"sharpness": 0.0, "glare": 0.0, "eyelidOcclusion": 0.0, "pupilVisible": true, "limbusVisible": true},
  "geo": {"mins": 60, "rings": 12, "degPerMin": 6, "refMinute": 15,
          "ringGroups": {"IPB": [0, 0], "STOM": [1, 2], "ANW": [3, 3], "ORG": [4, 8], "LYM": [9, 10], "SCU": [11, 11]}},
  "refRay15Usable": true,
  "usableUpperIris": true,
  "invalidRegions": [{"minuteRange": [55, 5], "ringRange": [6, 11], "reason": "eyelid"}]
}

Set "ok" to false with reasons when the image cannot be analysed at all.
Use code LOW_QUALITY for an unusable photograph and NO_LIMBUS when the limbus cannot be found.
"#;

const STEP2A_STRUCTURAL: &str = r#"You are detecting structural iris signs on a calibrated photograph.

Image id: {{img_id}}
Eye side: {{side}}
Calibration: {{geo}}

Detect lacunae, crypts, radial furrows, contraction rings and other fiber defects.
Each finding has a "type", a "minuteRange" [start, end] on the 60-minute clock and a
"ringRange" [inner, outer] over rings 0-11. Ranges crossing 12 o'clock may be written as
[58, 2]. Do not report anything inside invalid regions; list skipped areas in "excluded".

Respond with JSON only:
{
  "imgId": "{{img_id}}",
  "side": "{{side}}",
  "findings": [
    {"type": "lacuna", "minuteRange": [14, 16], "ringRange": [5, 7], "severity": "mild", "size": "small", "note": "", "confidence": 0.7}
  ],
  "excluded": []
}
"#;

const STEP2B_PIGMENT: &str = r#"You are detecting pigment and ring signs on a calibrated photograph.

Image id: {{img_id}}
Eye side: {{side}}
Calibration: {{geo}}

Assess the overall constitution, disposition and diathesis. Trace the collarette (autonomic
nerve wreath) and report its status, minute range and ring range. Detect pigment spots,
stress rings, scurf rim and lymphatic rosary signs with the same range conventions as the
structural pass.

Respond with JSON only:
{
  "imgId": "{{img_id}}",
  "side": "{{side}}",
  "global": {"constitution": "", "disposition": "", "diathesis": []},
  "collarette": {"ANW_status": "regular", "minuteRange": [0, 59], "ringRange": [3, 3], "confidence": 0.8},
  "findings": [
    {"type": "pigment_spot", "minuteRange": [40, 41], "ringRange": [6, 6], "severity": "moderate", "note": "", "confidence": 0.6}
  ],
  "excluded": []
}
"#;

const STEP2C_MERGE: &str = r#"You are reconciling two independent detection passes over the same iris.

Image id: {{img_id}}
Eye side: {{side}}
Structural findings: {{structural}}
Pigment findings: {{pigment}}

All ranges are already canonical. Remove duplicates and contradictions, keep the more
confident of two overlapping findings, and explain every removal in "dropped".

Respond with JSON only:
{
  "imgId": "{{img_id}}",
  "side": "{{side}}",
  "findings_struct_clean": [],
  "findings_pigment_clean": [],
  "collarette_clean": {"ANW_status": "regular", "minuteRange": [0, 59], "ringRange": [3, 3], "confidence": 0.8},
  "global_clean": {"constitution": "", "disposition": "", "diathesis": []},
  "dropped": [{"finding": {}, "reason": ""}],
  "warnings": []
}
"#;

const STEP3_ZONES: &str = r#"You are mapping cleaned iris findings onto iridology chart zones.

Image id: {{img_id}}
Eye side: {{side}}
Calibration: {{geo}}
Cleaned findings: {{cleaned}}

Use the chart for the given eye side. Sub-bands by ring: IPB, STOM, ANW, ORG, LYM, SCU as given
in the calibration. Findings that fall in no zone go to "unmapped".

Respond with JSON only:
{
  "imgId": "{{img_id}}",
  "side": "{{side}}",
  "mappedFindings": [
    {"type": "lacuna", "minuteRange": [14, 16], "ringRange": [5, 7], "zoneId": "R-LIVER", "zoneName": "Liver", "subBand": "ORG"}
  ],
  "zoneSummary": [{"zoneId": "R-LIVER", "zoneName": "Liver", "findingCount": 1, "maxSeverity": "mild"}],
  "unmapped": [],
  "warnings": []
}
"#;

const STEP4_PROFILE: &str = r#"You are building a constitutional profile from mapped iris findings.

Image id: {{img_id}}
Eye side: {{side}}
Patient: {{patient}}
Zone mapping: {{mapping}}

Score the stress, digestive and immune axes from 0 to 10. Assess elimination channels,
formulate hypotheses with a rationale and confidence, and propose questions that would
confirm or reject them.

Respond with JSON only:
{
  "imgId": "{{img_id}}",
  "side": "{{side}}",
  "base": {"constitution": "", "disposition": ""},
  "axesScore": {"stress": 0, "digestive": 0, "immune": 0},
  "elimChannels": [{"channel": "skin", "status": "normal", "note": ""}],
  "hypotheses": [{"title": "", "rationale": "", "confidence": 0.5}],
  "verificationQuestions": []
}
"#;

const STEP5_REPORT: &str = r#"You are writing the final wellness report for an iris analysis.

Patient: {{patient}}
Profile: {{profile}}

Summarize findings per zone, list imaging artifacts that limit the analysis, give an overall
health score from 0 to 100 and per-system scores. Advice is general wellness guidance, not a
diagnosis.

Respond with JSON only:
{
  "analysis": {"zones": [{"zone": "", "findings": [], "interpretation": ""}], "artifacts": [], "overallHealth": 0,
               "systemScores": [{"system": "", "score": 0, "description": ""}]},
  "advice": {"priorities": [], "nutrition": {}, "lifestyle": {}, "followUp": []}
}
"#;

/// Builtin prompt body for a stage, including the shared error contract.
pub fn builtin_body(stage: StageId) -> String {
    let body = match stage {
        StageId::Step1 => STEP1_GEO,
        StageId::Step2A => STEP2A_STRUCTURAL,
        StageId::Step2B => STEP2B_PIGMENT,
        StageId::Step2C => STEP2C_MERGE,
        StageId::Step3 => STEP3_ZONES,
        StageId::Step4 => STEP4_PROFILE,
        StageId::Step5 => STEP5_REPORT,
    };
    format!("{}\n{}\n", body.trim_end(), ERROR_CONTRACT)
}
