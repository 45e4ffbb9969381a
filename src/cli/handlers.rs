//! Command handlers. Each returns the process exit code.

use super::commands::{AnalyzeArgs, HealthArgs, PromptsArgs};
use super::output::{HealthStatus, OutputFormat, OutputFormatter};
use crate::config::IrisflowConfig;
use crate::llm::LLMClient;
use crate::pipeline::{
    IrisImage, LlmStages, PatientMeta, PipelineOrchestrator, PipelineRequest, StageId,
};
use crate::progress::LoggingHandler;
use crate::prompts::PromptProvenance;

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const EXIT_OK: i32 = 0;
pub const EXIT_PIPELINE_FAILED: i32 = 1;
pub const EXIT_SETUP_ERROR: i32 = 2;

fn resolve_config(
    model: Option<String>,
    prompts_dir: Option<PathBuf>,
    parallel: bool,
) -> IrisflowConfig {
    let default_config = IrisflowConfig::default();
    IrisflowConfig {
        model: model.unwrap_or(default_config.model),
        prompts_dir: prompts_dir.or(default_config.prompts_dir),
        parallel_detection: parallel || default_config.parallel_detection,
        ..default_config
    }
}

fn load_patient(path: &Path) -> Result<PatientMeta> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read patient file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Patient file {} is not valid patient JSON", path.display()))
}

pub(crate) fn build_request(args: &AnalyzeArgs) -> Result<PipelineRequest> {
    let url = args.image_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:")) {
        bail!("Image URL must be an http(s):// or data: URL, got {}", url);
    }

    let img_id = args
        .img_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let patient = match &args.patient {
        Some(path) => load_patient(path)?,
        None => PatientMeta::default(),
    };

    Ok(PipelineRequest::new(img_id, args.side, IrisImage::from_url(url)).with_patient(patient))
}

fn write_output(output: &str, destination: Option<&Path>, quiet: bool) -> Result<()> {
    match destination {
        Some(path) => {
            fs::write(path, output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Output written to: {}", path.display());
            if !quiet {
                println!("Output written to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }
    Ok(())
}

pub async fn handle_analyze(args: &AnalyzeArgs, quiet: bool) -> i32 {
    info!("Starting iris analysis");

    let config = resolve_config(args.model.clone(), args.prompts_dir.clone(), args.parallel);
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your environment variables and command-line arguments.");
        return EXIT_SETUP_ERROR;
    }
    debug!("{}", config);

    let request = match build_request(args) {
        Ok(request) => request,
        Err(e) => {
            error!("{:#}", e);
            return EXIT_SETUP_ERROR;
        }
    };

    let client = match config.create_client() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create inference client: {}", e);
            return EXIT_SETUP_ERROR;
        }
    };
    let catalog = match config.create_catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Failed to load prompts: {}", e);
            return EXIT_SETUP_ERROR;
        }
    };

    info!("Using model {} at {}", client.model(), client.endpoint());

    let pipeline_config = config.pipeline_config();
    let stages = LlmStages::new(client, catalog.clone()).with_config(pipeline_config.clone());
    let orchestrator = PipelineOrchestrator::new(Arc::new(stages))
        .with_catalog(catalog)
        .with_progress(Arc::new(LoggingHandler))
        .with_audit(config.create_audit_log())
        .with_config(pipeline_config);

    let outcome = orchestrator.run(request).await;

    let formatter = OutputFormatter::new(args.format.into());
    let output = match formatter.format_outcome(&outcome) {
        Ok(out) => out,
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            return EXIT_SETUP_ERROR;
        }
    };

    if let Err(e) = write_output(&output, args.output.as_deref(), quiet) {
        error!("{:#}", e);
        return EXIT_SETUP_ERROR;
    }

    if outcome.ok {
        EXIT_OK
    } else {
        EXIT_PIPELINE_FAILED
    }
}

pub async fn handle_prompts(args: &PromptsArgs) -> i32 {
    let config = resolve_config(None, args.prompts_dir.clone(), false);

    let catalog = match config.create_catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Failed to load prompts: {}", e);
            return EXIT_SETUP_ERROR;
        }
    };

    let mut prompts = Vec::new();
    for stage in StageId::ALL {
        match catalog.prompt_for_stage(stage) {
            Some(prompt) => prompts.push(PromptProvenance::new(stage, prompt)),
            None => warn!(stage = %stage, "No prompt configured"),
        }
    }

    let formatter = OutputFormatter::new(args.format.into());
    match formatter.format_prompts(&prompts) {
        Ok(output) => {
            println!("{}", output);
            EXIT_OK
        }
        Err(e) => {
            error!("Failed to format prompt listing: {:#}", e);
            EXIT_SETUP_ERROR
        }
    }
}

pub async fn handle_health(args: &HealthArgs) -> i32 {
    info!("Checking endpoint health");

    let config = IrisflowConfig::default();
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return EXIT_SETUP_ERROR;
    }

    let client = match config.create_client() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create inference client: {}", e);
            return EXIT_SETUP_ERROR;
        }
    };

    let status = match client.health_check().await {
        Ok(true) => HealthStatus::available(format!("Connected to {}", client.endpoint()))
            .with_details(format!("Model: {}", client.model())),
        Ok(false) => HealthStatus::unavailable(format!("Cannot reach {}", client.endpoint()))
            .with_details("Check IRISFLOW_API_BASE_URL and that the server is running".to_string()),
        Err(e) => HealthStatus::unavailable(format!("Health check failed: {}", e)),
    };
    debug!(backend = client.name(), available = status.available, "Health check done");

    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    let output = match formatter.format_health(&config, &status) {
        Ok(out) => out,
        Err(e) => {
            error!("Failed to format health output: {:#}", e);
            return EXIT_SETUP_ERROR;
        }
    };
    println!("{}", output);

    if status.available {
        EXIT_OK
    } else {
        EXIT_PIPELINE_FAILED
    }
}
