use super::templates::{builtin_body, BUILTIN_VERSION};
use crate::pipeline::StageId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read prompt file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Prompt file {0} is empty")]
    Empty(PathBuf),
}

/// Lowercase hex SHA-256 of a prompt body.
pub fn checksum(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Where a prompt came from and what it hashed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRef {
    pub source: String,
    pub checksum: String,
}

/// A [`PromptRef`] bound to the stage it was used for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptProvenance {
    pub stage: StageId,
    pub source: String,
    pub checksum: String,
}

impl PromptProvenance {
    pub fn new(stage: StageId, prompt: PromptRef) -> Self {
        Self {
            stage,
            source: prompt.source,
            checksum: prompt.checksum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    stage: StageId,
    source: String,
    body: String,
    checksum: String,
}

impl PromptTemplate {
    pub fn new(stage: StageId, source: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let checksum = checksum(&body);
        Self {
            stage,
            source: source.into(),
            body,
            checksum,
        }
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn reference(&self) -> PromptRef {
        PromptRef {
            source: self.source.clone(),
            checksum: self.checksum.clone(),
        }
    }

    /// Substitutes `{{key}}` placeholders. `{{stage}}` is always available;
    /// placeholders without a value are left untouched.
    /// Substituted values are copied verbatim and never scanned again.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let lookup = |key: &str| {
            if key == "stage" {
                Some(self.stage.as_str())
            } else {
                vars.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
            }
        };

        let mut rendered = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();
        while let Some(open) = rest.find("{{") {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let value = after
                .find("}}")
                .and_then(|close| lookup(&after[..close]).map(|value| (value, close)));
            match value {
                Some((value, close)) => {
                    rendered.push_str(value);
                    rest = &after[close + 2..];
                }
                None => {
                    rendered.push_str("{{");
                    rest = after;
                }
            }
        }
        rendered.push_str(rest);
        rendered
    }
}

/// Source of versioned stage prompts.
///
/// The orchestrator only asks for [`PromptRef`]s to record provenance;
/// stage runners that build requests use [`PromptCatalog::template`].
pub trait PromptCatalog: Send + Sync {
    fn template(&self, stage: StageId) -> Option<&PromptTemplate>;

    fn prompt_for_stage(&self, stage: StageId) -> Option<PromptRef> {
        self.template(stage).map(PromptTemplate::reference)
    }
}

/// The prompts compiled into the binary.
#[derive(Debug, Clone)]
pub struct BuiltinPromptCatalog {
    templates: Vec<PromptTemplate>,
}

impl BuiltinPromptCatalog {
    pub fn new() -> Self {
        let templates = StageId::ALL
            .iter()
            .map(|stage| {
                PromptTemplate::new(
                    *stage,
                    format!("builtin:{}@{}", stage.file_stem(), BUILTIN_VERSION),
                    builtin_body(*stage),
                )
            })
            .collect();
        Self { templates }
    }
}

impl Default for BuiltinPromptCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptCatalog for BuiltinPromptCatalog {
    fn template(&self, stage: StageId) -> Option<&PromptTemplate> {
        self.templates.get(stage.index())
    }
}

/// Prompts read from `<dir>/<stage>.md`, e.g. `step2a.md`. Stages without a
/// file use the builtin prompt.
#[derive(Debug, Clone)]
pub struct DirectoryPromptCatalog {
    dir: PathBuf,
    templates: Vec<PromptTemplate>,
    overridden: Vec<StageId>,
}

impl DirectoryPromptCatalog {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, PromptError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(PromptError::DirectoryNotFound(dir));
        }

        let builtin = BuiltinPromptCatalog::new();
        let mut templates = Vec::with_capacity(StageId::ALL.len());
        let mut overridden = Vec::new();

        for stage in StageId::ALL {
            let path = dir.join(format!("{}.md", stage.file_stem()));
            if path.is_file() {
                let body = std::fs::read_to_string(&path).map_err(|source| PromptError::Read {
                    path: path.clone(),
                    source,
                })?;
                if body.trim().is_empty() {
                    return Err(PromptError::Empty(path));
                }
                debug!(stage = %stage, path = %path.display(), "Loaded prompt override");
                templates.push(PromptTemplate::new(stage, path.display().to_string(), body));
                overridden.push(stage);
            } else if let Some(template) = builtin.template(stage) {
                templates.push(template.clone());
            }
        }

        info!(
            dir = %dir.display(),
            overrides = overridden.len(),
            "Prompt catalog loaded"
        );

        Ok(Self {
            dir,
            templates,
            overridden,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn overridden(&self) -> &[StageId] {
        &self.overridden
    }
}

impl PromptCatalog for DirectoryPromptCatalog {
    fn template(&self, stage: StageId) -> Option<&PromptTemplate> {
        self.templates.iter().find(|t| t.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_is_stable_and_distinct() {
        assert_eq!(checksum("abc"), checksum("abc"));
        assert_ne!(checksum("abc"), checksum("abd"));
        assert_eq!(
            checksum("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_builtin_catalog_covers_all_stages() {
        let catalog = BuiltinPromptCatalog::new();
        for stage in StageId::ALL {
            let prompt = catalog.prompt_for_stage(stage).unwrap();
            assert_eq!(
                prompt.source,
                format!("builtin:{}@{}", stage.file_stem(), BUILTIN_VERSION)
            );
            assert_eq!(prompt.checksum.len(), 64);
        }
    }

    #[test]
    fn test_render_substitutes_known_keys() {
        let template = PromptTemplate::new(StageId::Step3, "test", "{{stage}} {{img_id}} {{other}}");
        assert_eq!(
            template.render(&[("img_id", "img-1")]),
            "STEP3 img-1 {{other}}"
        );
    }

    #[test]
    fn test_render_does_not_expand_placeholders_inside_values() {
        let template = PromptTemplate::new(StageId::Step2C, "test", "S={{structural}} P={{pigment}}");
        assert_eq!(
            template.render(&[("structural", "note {{pigment}}"), ("pigment", "PIG")]),
            "S=note {{pigment}} P=PIG"
        );
    }

    #[test]
    fn test_render_handles_stray_braces() {
        let template = PromptTemplate::new(StageId::Step4, "test", "{ {{ {{img_id}} {{unclosed");
        assert_eq!(
            template.render(&[("img_id", "img-1")]),
            "{ {{ img-1 {{unclosed"
        );
    }

    #[test]
    fn test_directory_catalog_overrides_and_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("step2a.md"), "custom structural prompt").unwrap();

        let catalog = DirectoryPromptCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.overridden(), &[StageId::Step2A]);

        let custom = catalog.prompt_for_stage(StageId::Step2A).unwrap();
        assert!(custom.source.ends_with("step2a.md"));
        assert_eq!(custom.checksum, checksum("custom structural prompt"));

        let builtin = BuiltinPromptCatalog::new();
        assert_eq!(
            catalog.prompt_for_stage(StageId::Step4),
            builtin.prompt_for_stage(StageId::Step4)
        );
    }

    #[test]
    fn test_directory_catalog_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("step1.md"), "  \n").unwrap();

        assert!(matches!(
            DirectoryPromptCatalog::load(dir.path()),
            Err(PromptError::Empty(_))
        ));
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            DirectoryPromptCatalog::load(&missing),
            Err(PromptError::DirectoryNotFound(_))
        ));
    }
}
