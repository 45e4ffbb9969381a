use super::config::PipelineConfig;
use super::context::{PipelineContext, StagePayload};
use super::input::{
    DetectionInput, GeoInput, MappingInput, MergeInput, PipelineRequest, ProfileInput, ReportInput,
};
use super::outcome::{codes, StageOutcome, StepError};
use super::payload::{
    Step1Payload, Step2aPayload, Step2bPayload, Step2cPayload, Step3Payload, Step4Payload,
    Step5Payload,
};
use super::phase_trait::IrisStages;
use super::runner::{StageFlow, StageRunner};
use super::stage::StageId;
use crate::audit::AuditLog;
use crate::geometry::RangeNormalizer;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::prompts::PromptCatalog;
use serde::{Serialize, Serializer};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Result of one run: `ok` only if all seven stages succeeded. The context
/// always holds whatever was produced before the run stopped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub run_id: String,
    pub ok: bool,
    pub ctx: PipelineContext,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl PipelineOutcome {
    pub fn failed_at(&self) -> Option<StageId> {
        self.ctx.failed_at()
    }

    /// The envelope stored at the failing stage.
    pub fn error(&self) -> Option<&StepError> {
        self.failed_at().and_then(|stage| self.ctx.slot_error(stage))
    }

    pub fn report(&self) -> Option<&Step5Payload> {
        if !self.ok {
            return None;
        }
        self.ctx.report().and_then(StageOutcome::as_success)
    }
}

pub struct PipelineOrchestrator {
    stages: Arc<dyn IrisStages>,
    catalog: Option<Arc<dyn PromptCatalog>>,
    progress_handler: Option<Arc<dyn ProgressHandler>>,
    audit: AuditLog,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(stages: Arc<dyn IrisStages>) -> Self {
        Self {
            stages,
            catalog: None,
            progress_handler: None,
            audit: AuditLog::disabled(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn PromptCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress_handler = Some(handler);
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = &self.progress_handler {
            handler.on_progress(&event);
        }
    }

    /// Runs all seven stages for one image with a fresh context.
    pub async fn run(&self, request: PipelineRequest) -> PipelineOutcome {
        let run_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        info!(
            run_id = %run_id,
            img_id = %request.img_id,
            side = %request.side,
            parallel_detection = self.config.parallel_detection,
            "Starting pipeline"
        );

        self.emit(ProgressEvent::Started {
            run_id: run_id.clone(),
            img_id: request.img_id.clone(),
            side: request.side.to_string(),
        });

        let runner = StageRunner::new(
            &run_id,
            self.catalog.as_deref(),
            self.progress_handler.as_deref(),
            &self.audit,
        );

        let ctx = match self.drive(&runner, &request, PipelineContext::new()).await {
            ControlFlow::Continue(ctx) | ControlFlow::Break(ctx) => ctx,
        };

        let ok = ctx.failed_at().is_none() && ctx.is_complete();
        let duration = start.elapsed();

        match ctx.failed_at() {
            Some(failed_at) => {
                info!(run_id = %run_id, failed_at = %failed_at, "Pipeline stopped");
                self.emit(ProgressEvent::Failed {
                    failed_at,
                    total_time: duration,
                });
            }
            None => {
                info!(run_id = %run_id, duration_ms = duration.as_millis(), "Pipeline complete");
                self.emit(ProgressEvent::Completed {
                    total_time: duration,
                });
            }
        }

        PipelineOutcome {
            run_id,
            ok,
            ctx,
            duration,
        }
    }

    /// Runs both eyes concurrently, each with its own context.
    pub async fn run_pair(
        &self,
        left: PipelineRequest,
        right: PipelineRequest,
    ) -> (PipelineOutcome, PipelineOutcome) {
        tokio::join!(self.run(left), self.run(right))
    }

    async fn drive(
        &self,
        runner: &StageRunner<'_>,
        request: &PipelineRequest,
        ctx: PipelineContext,
    ) -> StageFlow {
        let stages = self.stages.as_ref();

        let ctx = runner
            .run(
                ctx,
                |_| Ok(GeoInput::from(request)),
                |input| async move { stages.geo_calibration(input).await.and_then(check_geo) },
            )
            .await?;
        let ctx = freeze_normalizer(ctx);

        let ctx = if self.config.parallel_detection {
            self.detect_parallel(runner, request, ctx).await?
        } else {
            let ctx = runner
                .run(
                    ctx,
                    |ctx| detection_input(request, ctx, StageId::Step2A),
                    |prepared| detect_structural(stages, Ok(prepared)),
                )
                .await?;
            runner
                .run(
                    ctx,
                    |ctx| detection_input(request, ctx, StageId::Step2B),
                    |prepared| detect_pigment(stages, Ok(prepared)),
                )
                .await?
        };

        let ctx = runner
            .run(ctx, merge_input, |input| async move {
                let normalizer = input.normalizer;
                stages
                    .consistency_merge(input)
                    .await
                    .map(|cleaned| cleaned.normalized(&normalizer))
            })
            .await?;

        let ctx = runner
            .run(ctx, mapping_input, |input| stages.zone_mapping(input))
            .await?;

        let ctx = runner
            .run(
                ctx,
                |ctx| profile_input(request, ctx),
                |input| stages.build_profile(input),
            )
            .await?;

        runner
            .run(
                ctx,
                |ctx| report_input(request, ctx),
                |input| stages.generate_report(input),
            )
            .await
    }

    /// STEP2A and STEP2B side by side. Both gates run first and results are
    /// settled in stage order; a STEP2B result is dropped if STEP2A failed.
    async fn detect_parallel(
        &self,
        runner: &StageRunner<'_>,
        request: &PipelineRequest,
        ctx: PipelineContext,
    ) -> StageFlow {
        let stages = self.stages.as_ref();

        let (ctx, structural) = runner.admit(StageId::Step2A, ctx)?;
        let (ctx, pigment) = runner.admit(StageId::Step2B, ctx)?;

        let (structural_outcome, pigment_outcome) = tokio::join!(
            detect_structural(stages, detection_input(request, &ctx, StageId::Step2A)),
            detect_pigment(stages, detection_input(request, &ctx, StageId::Step2B)),
        );

        match runner.settle(structural, ctx, structural_outcome) {
            ControlFlow::Continue(ctx) => runner.settle(pigment, ctx, pigment_outcome),
            ControlFlow::Break(ctx) => {
                debug!(
                    discarded_ok = pigment_outcome.is_success(),
                    "Discarding pigment detection result after structural failure"
                );
                runner.discard(pigment);
                ControlFlow::Break(ctx)
            }
        }
    }
}

/// Rejects a STEP1 payload whose geo cannot seed a normalizer.
fn check_geo(payload: Step1Payload) -> StageOutcome<Step1Payload> {
    match RangeNormalizer::new(&payload.geo) {
        Ok(_) => StageOutcome::success(payload),
        Err(e) => StageOutcome::failure(StepError::new(
            StageId::Step1,
            codes::INVALID_GEO,
            e.to_string(),
        )),
    }
}

fn freeze_normalizer(ctx: PipelineContext) -> PipelineContext {
    let normalizer = ctx
        .geo()
        .and_then(StageOutcome::as_success)
        .and_then(|payload| RangeNormalizer::new(&payload.geo).ok());

    match normalizer {
        Some(normalizer) => {
            debug!(
                mins = normalizer.mins(),
                rings = normalizer.rings(),
                "Normalizer frozen"
            );
            ctx.with_normalizer(normalizer)
        }
        None => ctx,
    }
}

/// Success payload of `P`'s stage, as needed by `stage`.
fn upstream<P: StagePayload>(ctx: &PipelineContext, stage: StageId) -> Result<&P, StepError> {
    ctx.outcome::<P>()
        .and_then(StageOutcome::as_success)
        .ok_or_else(|| StepError::precondition(stage, format!("{} result unavailable", P::STAGE)))
}

fn normalizer(ctx: &PipelineContext, stage: StageId) -> Result<RangeNormalizer, StepError> {
    ctx.normalizer()
        .copied()
        .ok_or_else(|| StepError::precondition(stage, "Normalizer not initialized"))
}

fn detection_input(
    request: &PipelineRequest,
    ctx: &PipelineContext,
    stage: StageId,
) -> Result<(DetectionInput, RangeNormalizer), StepError> {
    let geo = upstream::<Step1Payload>(ctx, stage)?;
    let input = DetectionInput {
        img_id: request.img_id.clone(),
        side: request.side,
        image: request.image.clone(),
        geo: geo.geo.clone(),
    };
    Ok((input, normalizer(ctx, stage)?))
}

async fn detect_structural(
    stages: &dyn IrisStages,
    prepared: Result<(DetectionInput, RangeNormalizer), StepError>,
) -> StageOutcome<Step2aPayload> {
    match prepared {
        Ok((input, normalizer)) => stages
            .structural_detection(input)
            .await
            .map(|payload| payload.normalized(&normalizer)),
        Err(error) => StageOutcome::failure(error),
    }
}

async fn detect_pigment(
    stages: &dyn IrisStages,
    prepared: Result<(DetectionInput, RangeNormalizer), StepError>,
) -> StageOutcome<Step2bPayload> {
    match prepared {
        Ok((input, normalizer)) => stages
            .pigment_detection(input)
            .await
            .map(|payload| payload.normalized(&normalizer)),
        Err(error) => StageOutcome::failure(error),
    }
}

fn merge_input(ctx: &PipelineContext) -> Result<MergeInput, StepError> {
    let stage = StageId::Step2C;
    Ok(MergeInput {
        structural: upstream::<Step2aPayload>(ctx, stage)?.clone(),
        pigment: upstream::<Step2bPayload>(ctx, stage)?.clone(),
        normalizer: normalizer(ctx, stage)?,
    })
}

fn mapping_input(ctx: &PipelineContext) -> Result<MappingInput, StepError> {
    let stage = StageId::Step3;
    Ok(MappingInput {
        geo: upstream::<Step1Payload>(ctx, stage)?.geo.clone(),
        cleaned: upstream::<Step2cPayload>(ctx, stage)?.clone(),
    })
}

fn profile_input(request: &PipelineRequest, ctx: &PipelineContext) -> Result<ProfileInput, StepError> {
    Ok(ProfileInput {
        mapping: upstream::<Step3Payload>(ctx, StageId::Step4)?.clone(),
        patient: request.patient.clone(),
    })
}

fn report_input(request: &PipelineRequest, ctx: &PipelineContext) -> Result<ReportInput, StepError> {
    Ok(ReportInput {
        profile: upstream::<Step4Payload>(ctx, StageId::Step5)?.clone(),
        patient: request.patient.clone(),
    })
}
