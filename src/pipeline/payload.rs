//! Success payloads of the seven stages
//!
//! Field names follow the JSON the stages exchange (camelCase, except where
//! STEP2B/STEP2C use snake_case keys). Sub-objects the orchestrator never
//! looks into are kept as raw JSON.

use crate::geometry::{Finding, GeoReference, MinuteRange, RangeNormalizer, RingRange, SubBand};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::input::Side;

// STEP1

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step1Payload {
    pub img_id: String,
    pub side: Side,
    /// Whether the image is usable at all. A `false` here blocks every
    /// downstream stage.
    pub ok: bool,
    #[serde(default)]
    pub reject_reasons: Vec<String>,
    #[serde(default)]
    pub quality: ImageQuality,
    pub geo: GeoReference,
    #[serde(rename = "refRay15Usable", default)]
    pub ref_ray_15_usable: bool,
    #[serde(default)]
    pub usable_upper_iris: bool,
    #[serde(default)]
    pub invalid_regions: Vec<InvalidRegion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageQuality {
    pub sharpness: Option<f64>,
    pub glare: Option<f64>,
    pub eyelid_occlusion: Option<f64>,
    pub pupil_visible: Option<bool>,
    pub limbus_visible: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRegion {
    pub minute_range: MinuteRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_range: Option<RingRange>,
    #[serde(default)]
    pub reason: String,
}

// STEP2A

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step2aPayload {
    pub img_id: String,
    pub side: Side,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub excluded: Vec<Value>,
}

impl Step2aPayload {
    pub fn normalized(mut self, normalizer: &RangeNormalizer) -> Self {
        self.findings = normalizer.normalize_findings(&self.findings);
        self
    }
}

// STEP2B

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step2bPayload {
    pub img_id: String,
    pub side: Side,
    #[serde(default)]
    pub global: GlobalTraits,
    pub collarette: Collarette,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub excluded: Vec<Value>,
}

impl Step2bPayload {
    pub fn normalized(mut self, normalizer: &RangeNormalizer) -> Self {
        self.findings = normalizer.normalize_findings(&self.findings);
        self.collarette = self.collarette.normalized(normalizer);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalTraits {
    pub constitution: String,
    pub disposition: String,
    pub diathesis: Vec<String>,
}

/// The autonomic nerve wreath as seen by pigment/ring detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collarette {
    #[serde(rename = "ANW_status", default)]
    pub anw_status: String,
    pub minute_range: MinuteRange,
    pub ring_range: RingRange,
    #[serde(default)]
    pub confidence: f64,
    /// Canonical pieces of `minute_range` when it crosses 12 o'clock.
    /// Empty when `minute_range` is already a single canonical range.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub minute_segments: Vec<MinuteRange>,
}

impl Collarette {
    pub fn normalized(mut self, normalizer: &RangeNormalizer) -> Self {
        self.ring_range = normalizer.normalize_ring_range(self.ring_range);

        let source = match self.minute_segments.as_slice() {
            [] => Some(self.minute_range),
            [only] => Some(*only),
            [a, b] => rejoin_split_arc(*a, *b, normalizer.mins()),
            _ => None,
        };

        match source {
            Some(arc) => {
                let segments = normalizer.normalize_minute_range(arc);
                self.minute_range = segments[0];
                self.minute_segments = if segments.len() > 1 { segments } else { Vec::new() };
            }
            None => {
                // separate arcs, each kept as its own canonical piece
                self.minute_segments = self
                    .minute_segments
                    .iter()
                    .flat_map(|segment| normalizer.normalize_minute_range(*segment))
                    .collect();
                self.minute_range = normalizer.normalize_minute_range(self.minute_range)[0];
            }
        }
        self
    }
}

/// Rebuilds the arc behind a `[s, mins-1]` + `[0, e]` split, in either order.
/// Anything else is not a single arc crossing 12 o'clock.
fn rejoin_split_arc(a: MinuteRange, b: MinuteRange, mins: i32) -> Option<MinuteRange> {
    let is_split = |tail: MinuteRange, head: MinuteRange| {
        tail.end() == mins - 1 && head.start() == 0 && tail.start() > head.end()
    };

    if is_split(a, b) {
        Some(MinuteRange(a.start(), b.end()))
    } else if is_split(b, a) {
        Some(MinuteRange(b.start(), a.end()))
    } else {
        None
    }
}

// STEP2C

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step2cPayload {
    #[serde(rename = "imgId")]
    pub img_id: String,
    pub side: Side,
    #[serde(default)]
    pub findings_struct_clean: Vec<Finding>,
    #[serde(default)]
    pub findings_pigment_clean: Vec<Finding>,
    pub collarette_clean: Collarette,
    #[serde(default)]
    pub global_clean: GlobalTraits,
    #[serde(default)]
    pub dropped: Vec<Value>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Step2cPayload {
    pub fn normalized(mut self, normalizer: &RangeNormalizer) -> Self {
        self.findings_struct_clean = normalizer.normalize_findings(&self.findings_struct_clean);
        self.findings_pigment_clean = normalizer.normalize_findings(&self.findings_pigment_clean);
        self.collarette_clean = self.collarette_clean.normalized(normalizer);
        self
    }

    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings_struct_clean
            .iter()
            .chain(self.findings_pigment_clean.iter())
    }
}

// STEP3

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step3Payload {
    pub img_id: String,
    pub side: Side,
    #[serde(default)]
    pub mapped_findings: Vec<MappedFinding>,
    #[serde(default)]
    pub zone_summary: Vec<ZoneSummary>,
    #[serde(default)]
    pub unmapped: Vec<Finding>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedFinding {
    #[serde(flatten)]
    pub finding: Finding,
    pub zone_id: String,
    #[serde(default)]
    pub zone_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_band: Option<SubBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    pub zone_id: String,
    #[serde(default)]
    pub zone_name: String,
    #[serde(default)]
    pub finding_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_severity: Option<String>,
}

// STEP4

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step4Payload {
    pub img_id: String,
    pub side: Side,
    #[serde(default)]
    pub base: Value,
    pub axes_score: AxesScore,
    #[serde(default)]
    pub elim_channels: Vec<EliminationChannel>,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default)]
    pub verification_questions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxesScore {
    pub stress: f64,
    pub digestive: f64,
    pub immune: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EliminationChannel {
    pub channel: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub title: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub confidence: f64,
}

// STEP5

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step5Payload {
    pub analysis: ReportAnalysis,
    pub advice: Advice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportAnalysis {
    pub zones: Vec<ZoneReport>,
    pub artifacts: Vec<String>,
    pub overall_health: f64,
    pub system_scores: Vec<SystemScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneReport {
    pub zone: String,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemScore {
    pub system: String,
    pub score: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Advice {
    pub priorities: Vec<String>,
    pub nutrition: Value,
    pub lifestyle: Value,
    pub follow_up: Vec<String>,
}
