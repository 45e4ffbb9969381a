pub mod config;
pub mod context;
pub mod input;
pub mod orchestrator;
pub mod outcome;
pub mod payload;
pub mod phase_trait;
pub mod phases;
pub mod runner;
pub mod stage;
pub mod validators;

pub use config::PipelineConfig;
pub use context::{PipelineContext, SlotState, StagePayload};
pub use input::{
    DetectionInput, GeoInput, IrisImage, MappingInput, MergeInput, PatientMeta, PipelineRequest,
    ProfileInput, ReportInput, Side,
};
pub use orchestrator::{PipelineOrchestrator, PipelineOutcome};
pub use outcome::{codes, ErrorEnvelope, StageOutcome, StepError};
pub use payload::{
    Step1Payload, Step2aPayload, Step2bPayload, Step2cPayload, Step3Payload, Step4Payload,
    Step5Payload,
};
pub use phase_trait::IrisStages;
pub use phases::LlmStages;
pub use runner::{Admission, StageFlow, StageRunner};
pub use stage::{StageId, UnknownStage};
pub use validators::{
    validate_prerequisites, validate_prerequisites_named, BlockingError, PrerequisiteCheck,
};
