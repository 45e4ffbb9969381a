//! Generic executor for a single stage
//!
//! Every stage goes through the same sequence: announce, gate, invoke, store
//! together with its prompt provenance. The runner returns [`ControlFlow::Break`] with
//! the final context as soon as a stage is blocked or fails, so the
//! orchestrator can chain stages with `?`.

use super::context::{PipelineContext, StagePayload};
use super::outcome::{StageOutcome, StepError};
use super::stage::StageId;
use super::validators::validate_prerequisites;
use crate::audit::{AuditEntry, AuditLog};
use crate::prompts::{PromptCatalog, PromptProvenance, PromptRef};
use crate::progress::{ProgressEvent, ProgressHandler};
use chrono::Utc;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Instant;
use tracing::debug;

/// Flow of a run between stages: `Continue` with the context so far, or
/// `Break` with the context the run ended on.
pub type StageFlow = ControlFlow<PipelineContext, PipelineContext>;

/// A stage that passed its gate and may be invoked.
#[derive(Debug)]
pub struct Admission {
    stage: StageId,
    prompt: Option<PromptRef>,
    started: Instant,
}

impl Admission {
    pub fn stage(&self) -> StageId {
        self.stage
    }
}

pub struct StageRunner<'a> {
    run_id: &'a str,
    catalog: Option<&'a dyn PromptCatalog>,
    progress: Option<&'a dyn ProgressHandler>,
    audit: &'a AuditLog,
}

impl<'a> StageRunner<'a> {
    pub fn new(
        run_id: &'a str,
        catalog: Option<&'a dyn PromptCatalog>,
        progress: Option<&'a dyn ProgressHandler>,
        audit: &'a AuditLog,
    ) -> Self {
        Self {
            run_id,
            catalog,
            progress,
            audit,
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = self.progress {
            handler.on_progress(&event);
        }
    }

    fn audit(&self, stage: StageId, prompt: Option<&PromptRef>, outcome: &str, started: Instant) {
        self.audit.record(&AuditEntry {
            run_id: self.run_id.to_string(),
            stage,
            source: prompt.map(|p| p.source.clone()),
            checksum: prompt.map(|p| p.checksum.clone()),
            outcome: outcome.to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    /// Announces `stage` and runs its prerequisite gate. A blocked stage gets
    /// an error envelope in its slot and ends the run.
    pub fn admit(
        &self,
        stage: StageId,
        ctx: PipelineContext,
    ) -> ControlFlow<PipelineContext, (PipelineContext, Admission)> {
        let started = Instant::now();
        let prompt = self.catalog.and_then(|c| c.prompt_for_stage(stage));

        self.emit(ProgressEvent::StageStarted {
            stage,
            prompt_source: prompt.as_ref().map(|p| p.source.clone()),
            prompt_checksum: prompt.as_ref().map(|p| p.checksum.clone()),
        });

        let check = validate_prerequisites(stage, &ctx);
        if !check.ok {
            let error = check.to_step_error(stage);
            self.emit(ProgressEvent::StageBlocked {
                stage,
                code: error.code.clone(),
                reason: check
                    .reason
                    .clone()
                    .unwrap_or_else(|| error.message.clone()),
            });
            self.audit(stage, prompt.as_ref(), &error.code, started);
            return ControlFlow::Break(ctx.with_failure(stage, error).fail_at(stage));
        }

        ControlFlow::Continue((
            ctx,
            Admission {
                stage,
                prompt,
                started,
            },
        ))
    }

    /// Stores a stage's outcome. Failures mark `failedAt` and end the run.
    pub fn settle<P: StagePayload>(
        &self,
        admission: Admission,
        ctx: PipelineContext,
        outcome: StageOutcome<P>,
    ) -> StageFlow {
        let stage = admission.stage;
        debug_assert_eq!(stage, P::STAGE);
        let duration = admission.started.elapsed();

        let ctx = match &admission.prompt {
            Some(prompt) => ctx.with_prompt(PromptProvenance::new(stage, prompt.clone())),
            None => ctx,
        };

        match outcome.as_failure().cloned() {
            Some(error) => {
                self.emit(ProgressEvent::StageFailed {
                    stage,
                    code: error.code.clone(),
                    message: error.message.clone(),
                    can_retry: error.can_retry,
                    duration,
                });
                self.audit(stage, admission.prompt.as_ref(), &error.code, admission.started);
                ControlFlow::Break(ctx.with_outcome(outcome).fail_at(stage))
            }
            None => {
                self.emit(ProgressEvent::StageComplete { stage, duration });
                self.audit(stage, admission.prompt.as_ref(), "ok", admission.started);
                ControlFlow::Continue(ctx.with_outcome(outcome))
            }
        }
    }

    /// Closes an admitted stage whose result will not be stored. Nothing is
    /// written to the context or the audit log.
    pub fn discard(&self, admission: Admission) {
        self.emit(ProgressEvent::StageDiscarded {
            stage: admission.stage,
            duration: admission.started.elapsed(),
        });
    }

    /// Runs one stage end to end.
    ///
    /// `prepare` extracts the stage's narrow input from the context; it runs
    /// only after the gate passed. `invoke` is the stage function itself.
    pub async fn run<P, I, Prep, F, Fut>(
        &self,
        ctx: PipelineContext,
        prepare: Prep,
        invoke: F,
    ) -> StageFlow
    where
        P: StagePayload,
        Prep: FnOnce(&PipelineContext) -> Result<I, StepError>,
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = StageOutcome<P>>,
    {
        let (ctx, admission) = self.admit(P::STAGE, ctx)?;

        let outcome = match prepare(&ctx) {
            Ok(input) => invoke(input).await,
            Err(error) => {
                debug!(stage = %P::STAGE, "Stage input unavailable after gate passed");
                StageOutcome::failure(error)
            }
        };

        self.settle(admission, ctx, outcome)
    }
}
