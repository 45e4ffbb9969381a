//! Output formatting for pipeline outcomes, prompt listings and health checks
//!
//! JSON output is the serialized value as-is. Human output is a short
//! summary meant for a terminal.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::IrisflowConfig;
use crate::pipeline::{PipelineOutcome, SlotState, StageId};
use crate::prompts::PromptProvenance;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Machine-readable
    Json,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

/// Result of probing the inference endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub available: bool,
    pub message: String,
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn available(message: String) -> Self {
        Self {
            available: true,
            message,
            details: None,
        }
    }

    pub fn unavailable(message: String) -> Self {
        Self {
            available: false,
            message,
            details: None,
        }
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_outcome(&self, outcome: &PipelineOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome)
                .context("Failed to serialize pipeline outcome to JSON"),
            OutputFormat::Human => Ok(self.format_outcome_human(outcome)),
        }
    }

    pub fn format_prompts(&self, prompts: &[PromptProvenance]) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(prompts)
                .context("Failed to serialize prompt listing to JSON"),
            OutputFormat::Human => Ok(self.format_prompts_human(prompts)),
        }
    }

    pub fn format_health(&self, config: &IrisflowConfig, status: &HealthStatus) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "health_status": status,
                    "configuration": config.to_display_map(),
                });
                serde_json::to_string_pretty(&output)
                    .context("Failed to serialize health status to JSON")
            }
            OutputFormat::Human => Ok(self.format_health_human(config, status)),
        }
    }

    fn format_outcome_human(&self, outcome: &PipelineOutcome) -> String {
        let mut output = String::new();

        match outcome.failed_at() {
            None => output.push_str("\u{2713} Iris Analysis Complete\n"),
            Some(stage) => output.push_str(&format!("\u{2717} Iris Analysis Stopped at {}\n", stage)),
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Run:      {}\n", outcome.run_id));
        if let Some(geo) = outcome.ctx.geo().and_then(|g| g.as_success()) {
            output.push_str(&format!("Image:    {} ({})\n", geo.img_id, geo.side));
        }
        output.push_str(&format!("Duration: {}ms\n\n", outcome.duration.as_millis()));

        output.push_str("Stages:\n");
        for (i, stage) in StageId::ALL.iter().enumerate() {
            let connector = if i == StageId::ALL.len() - 1 {
                "\u{2514}\u{2500}"
            } else {
                "\u{251C}\u{2500}"
            };
            let state = match outcome.ctx.slot_state(*stage) {
                SlotState::Success => "ok".to_string(),
                SlotState::Empty => "not run".to_string(),
                SlotState::Failed => match outcome.ctx.slot_error(*stage) {
                    Some(error) => format!("failed ({})", error.code),
                    None => "failed".to_string(),
                },
            };
            output.push_str(&format!(
                "{} {:<7} {:<26} {}\n",
                connector,
                stage.as_str(),
                stage.description(),
                state
            ));
        }

        if let Some(error) = outcome.error() {
            output.push_str(&format!(
                "\nError: {} - {}{}\n",
                error.code,
                error.message,
                if error.can_retry { " (retryable)" } else { "" }
            ));
        }

        if let Some(report) = outcome.report() {
            output.push_str(&format!(
                "\nOverall Health: {:.0}%\n",
                report.analysis.overall_health
            ));

            if !report.analysis.system_scores.is_empty() {
                output.push_str("\nSystems:\n");
                for score in &report.analysis.system_scores {
                    output.push_str(&format!("  - {}: {:.0}\n", score.system, score.score));
                }
            }

            if !report.advice.priorities.is_empty() {
                output.push_str("\nPriorities:\n");
                for priority in &report.advice.priorities {
                    output.push_str(&format!("  - {}\n", priority));
                }
            }

            if !report.analysis.artifacts.is_empty() {
                output.push_str("\n\u{26A0} Artifacts:\n");
                for artifact in &report.analysis.artifacts {
                    output.push_str(&format!("  - {}\n", artifact));
                }
            }
        }

        output
    }

    fn format_prompts_human(&self, prompts: &[PromptProvenance]) -> String {
        let mut output = String::new();

        output.push_str("Stage Prompts\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        for prompt in prompts {
            output.push_str(&format!("{}\n", prompt.stage));
            output.push_str(&format!("  Source:   {}\n", prompt.source));
            output.push_str(&format!("  Checksum: {}\n\n", prompt.checksum));
        }

        output
    }

    fn format_health_human(&self, config: &IrisflowConfig, status: &HealthStatus) -> String {
        let mut output = String::new();

        output.push_str("Endpoint Health Status\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        let symbol = if status.available {
            "\u{2713}"
        } else {
            "\u{2717}"
        };
        output.push_str(&format!("{} {}\n", symbol, config.api_base_url));
        output.push_str(&format!(
            "  Status: {}\n",
            if status.available {
                "Available"
            } else {
                "Unavailable"
            }
        ));
        output.push_str(&format!("  Message: {}\n", status.message));
        if let Some(ref details) = status.details {
            output.push_str(&format!("  Details: {}\n", details));
        }

        output.push('\n');
        output.push_str(&config.to_string());
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineContext, StepError};
    use std::time::Duration;

    fn failed_outcome() -> PipelineOutcome {
        let ctx = PipelineContext::new().with_failure(
            StageId::Step1,
            StepError::new(StageId::Step1, "NO_LIMBUS", "limbus not visible"),
        )
        .fail_at(StageId::Step1);
        PipelineOutcome {
            run_id: "run-1".to_string(),
            ok: false,
            ctx,
            duration: Duration::from_millis(42),
        }
    }

    #[test]
    fn test_human_outcome_shows_failure() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_outcome(&failed_outcome())
            .unwrap();

        assert!(output.contains("Stopped at STEP1"));
        assert!(output.contains("failed (NO_LIMBUS)"));
        assert!(output.contains("not run"));
        assert!(output.contains("limbus not visible"));
        assert!(output.contains("42ms"));
    }

    #[test]
    fn test_json_outcome_is_parseable() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_outcome(&failed_outcome())
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["runId"], "run-1");
        assert_eq!(value["durationMs"], 42);
        assert_eq!(value["ctx"]["failedAt"], "STEP1");
    }

    #[test]
    fn test_prompt_listing() {
        let prompts = vec![PromptProvenance {
            stage: StageId::Step2A,
            source: "builtin:step2a@v3".to_string(),
            checksum: "abc123".to_string(),
        }];

        let human = OutputFormatter::new(OutputFormat::Human)
            .format_prompts(&prompts)
            .unwrap();
        assert!(human.contains("STEP2A"));
        assert!(human.contains("abc123"));

        let json = OutputFormatter::new(OutputFormat::Json)
            .format_prompts(&prompts)
            .unwrap();
        assert!(json.contains("builtin:step2a@v3"));
    }

    #[test]
    fn test_health_status_builders() {
        let status = HealthStatus::unavailable("Connection refused".to_string())
            .with_details("Model: qwen2.5vl:7b".to_string());
        assert!(!status.available);
        assert_eq!(status.details.as_deref(), Some("Model: qwen2.5vl:7b"));
    }
}
