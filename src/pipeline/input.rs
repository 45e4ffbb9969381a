//! Run request and the narrow per-stage inputs handed to stage runners

use crate::geometry::{GeoReference, RangeNormalizer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::payload::{Step2aPayload, Step2bPayload, Step2cPayload, Step3Payload, Step4Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" | "l" | "os" => Ok(Side::Left),
            "right" | "r" | "od" => Ok(Side::Right),
            _ => Err(format!("Invalid side: {}. Valid options: left, right", s)),
        }
    }
}

/// Patient metadata forwarded to the stages that need it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientMeta {
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub complaints: Vec<String>,
    pub medications: Vec<String>,
    pub notes: Option<String>,
}

/// Reference to the iris photo, as an `http(s)://` or `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrisImage {
    pub url: String,
}

impl IrisImage {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Wraps an already base64-encoded image body.
    pub fn from_base64(mime: &str, encoded: &str) -> Self {
        Self {
            url: format!("data:{};base64,{}", mime, encoded),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.url.starts_with("data:")
    }
}

/// Everything one pipeline run starts from: one image of one eye.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub img_id: String,
    pub side: Side,
    pub image: IrisImage,
    pub patient: PatientMeta,
}

impl PipelineRequest {
    pub fn new(img_id: impl Into<String>, side: Side, image: IrisImage) -> Self {
        Self {
            img_id: img_id.into(),
            side,
            image,
            patient: PatientMeta::default(),
        }
    }

    pub fn with_patient(mut self, patient: PatientMeta) -> Self {
        self.patient = patient;
        self
    }
}

/// STEP1 input.
#[derive(Debug, Clone)]
pub struct GeoInput {
    pub img_id: String,
    pub side: Side,
    pub image: IrisImage,
    pub patient: PatientMeta,
}

impl From<&PipelineRequest> for GeoInput {
    fn from(request: &PipelineRequest) -> Self {
        Self {
            img_id: request.img_id.clone(),
            side: request.side,
            image: request.image.clone(),
            patient: request.patient.clone(),
        }
    }
}

/// STEP2A and STEP2B input.
#[derive(Debug, Clone)]
pub struct DetectionInput {
    pub img_id: String,
    pub side: Side,
    pub image: IrisImage,
    pub geo: GeoReference,
}

/// STEP2C input. Both detections arrive already normalized.
#[derive(Debug, Clone)]
pub struct MergeInput {
    pub structural: Step2aPayload,
    pub pigment: Step2bPayload,
    pub normalizer: RangeNormalizer,
}

/// STEP3 input.
#[derive(Debug, Clone)]
pub struct MappingInput {
    pub geo: GeoReference,
    pub cleaned: Step2cPayload,
}

/// STEP4 input.
#[derive(Debug, Clone)]
pub struct ProfileInput {
    pub mapping: Step3Payload,
    pub patient: PatientMeta,
}

/// STEP5 input.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub profile: Step4Payload,
    pub patient: PatientMeta,
}
