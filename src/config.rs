//! Configuration management for irisflow
//!
//! Settings are loaded from environment variables with sensible defaults.
//!
//! # Environment Variables
//!
//! - `IRISFLOW_API_BASE_URL`: OpenAI-compatible endpoint - default: "http://localhost:11434"
//! - `IRISFLOW_MODEL`: vision model name - default: "qwen2.5vl:7b"
//! - `IRISFLOW_API_KEY`: bearer token, if the endpoint needs one
//! - `IRISFLOW_REQUEST_TIMEOUT`: timeout in seconds - default: "120"
//! - `IRISFLOW_PROMPTS_DIR`: directory with `<stage>.md` prompt overrides
//! - `IRISFLOW_AUDIT_LOG`: JSON-lines file receiving one entry per settled stage
//! - `IRISFLOW_PARALLEL_DETECTION`: run STEP2A and STEP2B concurrently - default: "false"
//! - `IRISFLOW_LOG_LEVEL`: logging level - default: "info"

use crate::audit::AuditLog;
use crate::llm::{BackendError, OpenAICompatibleClient};
use crate::pipeline::PipelineConfig;
use crate::prompts::{BuiltinPromptCatalog, DirectoryPromptCatalog, PromptCatalog, PromptError};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen2.5vl:7b";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Backend initialization failed: {0}")]
    BackendInitError(#[from] BackendError),

    #[error("Prompt catalog initialization failed: {0}")]
    PromptInitError(#[from] PromptError),
}

#[derive(Debug, Clone)]
pub struct IrisflowConfig {
    /// OpenAI-compatible endpoint, without the `/v1` suffix
    pub api_base_url: String,

    /// Vision model used for every stage
    pub model: String,

    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Prompt override directory
    pub prompts_dir: Option<PathBuf>,

    /// Audit log file
    pub audit_log: Option<PathBuf>,

    pub parallel_detection: bool,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Default for IrisflowConfig {
    /// Loads from `IRISFLOW_*` environment variables, falling back to defaults
    fn default() -> Self {
        let api_base_url = non_empty_var("IRISFLOW_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let model = non_empty_var("IRISFLOW_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let request_timeout_secs = env::var("IRISFLOW_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let parallel_detection = env::var("IRISFLOW_PARALLEL_DETECTION")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let log_level = env::var("IRISFLOW_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            api_base_url,
            model,
            api_key: non_empty_var("IRISFLOW_API_KEY"),
            request_timeout_secs,
            prompts_dir: non_empty_var("IRISFLOW_PROMPTS_DIR").map(PathBuf::from),
            audit_log: non_empty_var("IRISFLOW_AUDIT_LOG").map(PathBuf::from),
            parallel_detection,
            log_level,
        }
    }
}

impl IrisflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ConfigError::ValidationFailed(format!(
                "API base URL must start with http:// or https://, got {}",
                self.api_base_url
            )));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Model name must not be empty".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn create_client(&self) -> Result<Arc<OpenAICompatibleClient>, ConfigError> {
        let client = OpenAICompatibleClient::with_timeout(
            self.api_base_url.clone(),
            self.model.clone(),
            self.request_timeout(),
        )?
        .with_api_key(self.api_key.clone());

        Ok(Arc::new(client))
    }

    /// The override directory if one is configured, the builtin prompts otherwise.
    pub fn create_catalog(&self) -> Result<Arc<dyn PromptCatalog>, ConfigError> {
        let catalog: Arc<dyn PromptCatalog> = match &self.prompts_dir {
            Some(dir) => Arc::new(DirectoryPromptCatalog::load(dir)?),
            None => Arc::new(BuiltinPromptCatalog::new()),
        };
        Ok(catalog)
    }

    pub fn create_audit_log(&self) -> AuditLog {
        AuditLog::new(self.audit_log.clone())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new().with_parallel_detection(self.parallel_detection)
    }

    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("api_base_url".to_string(), self.api_base_url.clone());
        map.insert("model".to_string(), self.model.clone());
        map.insert(
            "api_key".to_string(),
            if self.api_key.is_some() { "set" } else { "unset" }.to_string(),
        );
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        if let Some(ref dir) = self.prompts_dir {
            map.insert("prompts_dir".to_string(), dir.display().to_string());
        }
        if let Some(ref path) = self.audit_log {
            map.insert("audit_log".to_string(), path.display().to_string());
        }
        map.insert(
            "parallel_detection".to_string(),
            self.parallel_detection.to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for IrisflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Irisflow Configuration:")?;
        writeln!(f, "  API Base URL: {}", self.api_base_url)?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(
            f,
            "  API Key: {}",
            if self.api_key.is_some() { "set" } else { "unset" }
        )?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        if let Some(ref dir) = self.prompts_dir {
            writeln!(f, "  Prompts Dir: {}", dir.display())?;
        }
        if let Some(ref path) = self.audit_log {
            writeln!(f, "  Audit Log: {}", path.display())?;
        }
        writeln!(f, "  Parallel Detection: {}", self.parallel_detection)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn config() -> IrisflowConfig {
        IrisflowConfig {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            request_timeout_secs: 60,
            prompts_dir: None,
            audit_log: None,
            parallel_detection: false,
            log_level: "info".to_string(),
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = [
            EnvGuard::unset("IRISFLOW_API_BASE_URL"),
            EnvGuard::unset("IRISFLOW_MODEL"),
            EnvGuard::unset("IRISFLOW_API_KEY"),
            EnvGuard::unset("IRISFLOW_REQUEST_TIMEOUT"),
            EnvGuard::unset("IRISFLOW_PROMPTS_DIR"),
            EnvGuard::unset("IRISFLOW_AUDIT_LOG"),
            EnvGuard::unset("IRISFLOW_PARALLEL_DETECTION"),
            EnvGuard::unset("IRISFLOW_LOG_LEVEL"),
        ];

        let config = IrisflowConfig::default();

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.api_key.is_none());
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.prompts_dir.is_none());
        assert!(!config.parallel_detection);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = [
            EnvGuard::set("IRISFLOW_API_BASE_URL", "https://inference.example.org"),
            EnvGuard::set("IRISFLOW_MODEL", "llava:13b"),
            EnvGuard::set("IRISFLOW_API_KEY", "sk-test"),
            EnvGuard::set("IRISFLOW_REQUEST_TIMEOUT", "45"),
            EnvGuard::set("IRISFLOW_AUDIT_LOG", "/tmp/audit.jsonl"),
            EnvGuard::set("IRISFLOW_PARALLEL_DETECTION", "true"),
            EnvGuard::set("IRISFLOW_LOG_LEVEL", "DEBUG"),
        ];

        let config = IrisflowConfig::default();

        assert_eq!(config.api_base_url, "https://inference.example.org");
        assert_eq!(config.model, "llava:13b");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.request_timeout_secs, 45);
        assert_eq!(config.audit_log, Some(PathBuf::from("/tmp/audit.jsonl")));
        assert!(config.parallel_detection);
        assert!(config.pipeline_config().parallel_detection);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut bad = config();
        bad.request_timeout_secs = 0;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.request_timeout_secs = 601;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.log_level = "loud".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.api_base_url = "localhost:11434".to_string();
        assert!(bad.validate().is_err());

        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_catalog_selection() {
        let catalog = config().create_catalog().unwrap();
        let prompt = catalog
            .prompt_for_stage(crate::pipeline::StageId::Step1)
            .unwrap();
        assert!(prompt.source.starts_with("builtin:"));

        let mut missing = config();
        missing.prompts_dir = Some(PathBuf::from("/nonexistent/irisflow/prompts"));
        assert!(matches!(
            missing.create_catalog(),
            Err(ConfigError::PromptInitError(_))
        ));
    }

    #[test]
    fn test_display_map_hides_key() {
        let mut with_key = config();
        with_key.api_key = Some("sk-secret".to_string());

        let map = with_key.to_display_map();
        assert_eq!(map.get("api_key").map(String::as_str), Some("set"));
        assert!(!format!("{}", with_key).contains("sk-secret"));
        assert!(format!("{}", with_key).contains("Irisflow Configuration:"));
    }
}
