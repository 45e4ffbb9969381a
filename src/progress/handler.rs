//! Progress handler trait and events

use crate::pipeline::StageId;
use std::fmt;
use std::time::Duration;

/// What an event is about: the run as a whole, or one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogScope {
    Init,
    Stage(StageId),
}

impl fmt::Display for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogScope::Init => f.write_str("INIT"),
            LogScope::Stage(stage) => write!(f, "{}", stage),
        }
    }
}

/// Events emitted while a pipeline run progresses
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    Started {
        run_id: String,
        img_id: String,
        side: String,
    },

    /// Stage admitted; prompt provenance present when a catalog is configured
    StageStarted {
        stage: StageId,
        prompt_source: Option<String>,
        prompt_checksum: Option<String>,
    },

    /// Stage refused by the prerequisite gate
    StageBlocked {
        stage: StageId,
        code: String,
        reason: String,
    },

    /// Stage returned a success payload
    StageComplete { stage: StageId, duration: Duration },

    /// Stage returned an error envelope
    StageFailed {
        stage: StageId,
        code: String,
        message: String,
        can_retry: bool,
        duration: Duration,
    },

    /// Stage ran concurrently with a sibling that failed; its result was dropped
    StageDiscarded { stage: StageId, duration: Duration },

    /// All stages succeeded
    Completed { total_time: Duration },

    /// Run stopped at `failed_at`
    Failed {
        failed_at: StageId,
        total_time: Duration,
    },
}

impl ProgressEvent {
    pub fn scope(&self) -> LogScope {
        match self {
            ProgressEvent::Started { .. }
            | ProgressEvent::Completed { .. }
            | ProgressEvent::Failed { .. } => LogScope::Init,
            ProgressEvent::StageStarted { stage, .. }
            | ProgressEvent::StageBlocked { stage, .. }
            | ProgressEvent::StageComplete { stage, .. }
            | ProgressEvent::StageFailed { stage, .. }
            | ProgressEvent::StageDiscarded { stage, .. } => LogScope::Stage(*stage),
        }
    }
}

/// Receives pipeline progress. Fire-and-forget: implementations must not block.
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {
        // Intentionally empty
    }
}
