//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        let scope = event.scope();
        match event {
            ProgressEvent::Started {
                run_id,
                img_id,
                side,
            } => {
                info!(%scope, run_id = %run_id, img_id = %img_id, side = %side, "Starting iris analysis");
            }
            ProgressEvent::StageStarted {
                stage,
                prompt_source,
                prompt_checksum,
            } => match (prompt_source, prompt_checksum) {
                (Some(source), Some(checksum)) => {
                    info!(
                        %scope,
                        prompt = %source,
                        checksum = %checksum,
                        "Starting {}",
                        stage.description()
                    );
                }
                _ => {
                    info!(%scope, "Starting {}", stage.description());
                }
            },
            ProgressEvent::StageBlocked { code, reason, .. } => {
                warn!(%scope, code = %code, reason = %reason, "Stage blocked");
            }
            ProgressEvent::StageComplete { duration, .. } => {
                debug!(
                    %scope,
                    duration_ms = duration.as_millis(),
                    "Stage complete"
                );
            }
            ProgressEvent::StageFailed {
                code,
                message,
                can_retry,
                duration,
                ..
            } => {
                warn!(
                    %scope,
                    code = %code,
                    can_retry,
                    duration_ms = duration.as_millis(),
                    "Stage failed: {}",
                    message
                );
            }
            ProgressEvent::StageDiscarded { duration, .. } => {
                debug!(
                    %scope,
                    duration_ms = duration.as_millis(),
                    "Stage result discarded"
                );
            }
            ProgressEvent::Completed { total_time } => {
                info!(
                    %scope,
                    total_time_ms = total_time.as_millis(),
                    "Analysis complete"
                );
            }
            ProgressEvent::Failed {
                failed_at,
                total_time,
            } => {
                warn!(
                    %scope,
                    failed_at = %failed_at,
                    total_time_ms = total_time.as_millis(),
                    "Analysis failed"
                );
            }
        }
    }
}
