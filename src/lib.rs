//! irisflow - staged vision-model analysis of iris photographs
//!
//! A run takes one iris image through seven stages, each answered by a vision
//! model behind an OpenAI-compatible endpoint:
//!
//! 1. `STEP1` geometric calibration (pupil, iris, clock orientation)
//! 2. `STEP2A` structural and `STEP2B` pigment/ring detection
//! 3. `STEP2C` consistency merge of both detection passes
//! 4. `STEP3` zone mapping, `STEP4` profile building, `STEP5` report
//!
//! Every stage result is a [`StageOutcome`]: a success payload or an error
//! envelope. The [`PipelineOrchestrator`] gates each stage on its
//! prerequisites, normalizes angular ranges against the STEP1 geometry, and
//! stops at the first failure while keeping everything produced so far.
//!
//! ```ignore
//! use irisflow::{IrisImage, LlmStages, PipelineOrchestrator, PipelineRequest, Side};
//! use irisflow::llm::OpenAICompatibleClient;
//! use irisflow::prompts::BuiltinPromptCatalog;
//! use std::sync::Arc;
//!
//! let client = Arc::new(OpenAICompatibleClient::new("http://localhost:11434", "qwen2.5vl:7b")?);
//! let catalog = Arc::new(BuiltinPromptCatalog::new());
//! let orchestrator = PipelineOrchestrator::new(Arc::new(LlmStages::new(client, catalog.clone())))
//!     .with_catalog(catalog);
//!
//! let request = PipelineRequest::new("img-1", Side::Left, IrisImage::from_url("https://host/left.jpg"));
//! let outcome = orchestrator.run(request).await;
//! println!("ok={} failed_at={:?}", outcome.ok, outcome.failed_at());
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod geometry;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod util;

pub use audit::{AuditEntry, AuditLog};
pub use config::{ConfigError, IrisflowConfig};
pub use geometry::{RangeNormalizer, RingRange};
pub use llm::{BackendError, LLMClient};
pub use pipeline::{
    IrisImage, IrisStages, LlmStages, PatientMeta, PipelineConfig, PipelineContext,
    PipelineOrchestrator, PipelineOutcome, PipelineRequest, Side, StageId, StageOutcome,
    StepError,
};
pub use prompts::{BuiltinPromptCatalog, DirectoryPromptCatalog, PromptCatalog};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_irisflow() {
        assert_eq!(NAME, "irisflow");
    }
}
