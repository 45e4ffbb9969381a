use super::range::{MinuteRange, RingRange};
use serde::{Deserialize, Serialize};

/// A located iris sign, either structural (lacuna, crypt, radial furrow, ...)
/// or pigment (pigment spot, ring, ...). Both variants share one shape and
/// differ only in their `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: String,
    pub minute_range: MinuteRange,
    pub ring_range: RingRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub confidence: f64,
}

impl Finding {
    pub fn new(kind: impl Into<String>, minute_range: MinuteRange, ring_range: RingRange) -> Self {
        Self {
            kind: kind.into(),
            minute_range,
            ring_range,
            severity: None,
            size: None,
            note: String::new(),
            confidence: 0.0,
        }
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_model_output() {
        let json = r#"{
            "type": "lacuna",
            "minuteRange": [58, 2],
            "ringRange": [4, 6],
            "severity": "moderate",
            "note": "closed lacuna near the organ band",
            "confidence": 0.72
        }"#;

        let finding: Finding = serde_json::from_str(json).unwrap();
        assert_eq!(finding.kind, "lacuna");
        assert_eq!(finding.minute_range, MinuteRange(58, 2));
        assert_eq!(finding.severity.as_deref(), Some("moderate"));
        assert!(finding.size.is_none());
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{"type": "pigment_spot", "minuteRange": [5, 6], "ringRange": [7, 7]}"#;
        let finding: Finding = serde_json::from_str(json).unwrap();
        assert!(finding.note.is_empty());
        assert_eq!(finding.confidence, 0.0);

        let out = serde_json::to_value(&finding).unwrap();
        assert!(out.get("severity").is_none());
        assert_eq!(out["type"], "pigment_spot");
    }
}
