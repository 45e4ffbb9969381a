use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The seven analysis stages, in their only valid execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageId {
    #[serde(rename = "STEP1")]
    Step1,
    #[serde(rename = "STEP2A")]
    Step2A,
    #[serde(rename = "STEP2B")]
    Step2B,
    #[serde(rename = "STEP2C")]
    Step2C,
    #[serde(rename = "STEP3")]
    Step3,
    #[serde(rename = "STEP4")]
    Step4,
    #[serde(rename = "STEP5")]
    Step5,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl StageId {
    pub const ALL: [StageId; 7] = [
        StageId::Step1,
        StageId::Step2A,
        StageId::Step2B,
        StageId::Step2C,
        StageId::Step3,
        StageId::Step4,
        StageId::Step5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Step1 => "STEP1",
            StageId::Step2A => "STEP2A",
            StageId::Step2B => "STEP2B",
            StageId::Step2C => "STEP2C",
            StageId::Step3 => "STEP3",
            StageId::Step4 => "STEP4",
            StageId::Step5 => "STEP5",
        }
    }

    /// Position in the execution order, starting at 0.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or_default()
    }

    pub fn next(&self) -> Option<StageId> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn description(&self) -> &'static str {
        match self {
            StageId::Step1 => "geo calibration",
            StageId::Step2A => "structural detection",
            StageId::Step2B => "pigment and ring detection",
            StageId::Step2C => "consistency merge",
            StageId::Step3 => "zone mapping",
            StageId::Step4 => "profile building",
            StageId::Step5 => "report generation",
        }
    }

    /// Lower-case name used for prompt override files, e.g. `step2a`.
    pub fn file_stem(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}
