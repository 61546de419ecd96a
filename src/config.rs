//! Pipeline configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. API keys are never read from here; see [`LlmConfig::api_key_env`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::MalformedRowPolicy;
use crate::error::PipelineError;
use crate::evaluation::ReferenceDistribution;
use crate::generator::{
    DEFAULT_MAX_CANDIDATE_CHARS, DEFAULT_RADIUS_KM, DEFAULT_SYSTEM_INSTRUCTION, GeneratorOptions, PromptTemplate,
};
use crate::llm::LlmConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub generation: GenerationConfig,
    pub llm: LlmConfig,
    pub evaluation: EvaluationConfig,
}

/// Input datasets and persisted artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub poi_csv: PathBuf,
    pub residents_csv: PathBuf,
    /// One `traj_<id>.json` per resident.
    pub cache_dir: PathBuf,
    /// Aggregate `[{id, trajectory}]` document.
    pub batch_output: PathBuf,
    pub malformed_rows: MalformedRowPolicy,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            poi_csv: PathBuf::from("beijing_pois.csv"),
            residents_csv: PathBuf::from("residents.csv"),
            cache_dir: PathBuf::from("cache"),
            batch_output: PathBuf::from("trajectories.json"),
            malformed_rows: MalformedRowPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub radius_km: f64,
    pub max_candidate_chars: usize,
    pub system_instruction: String,
    /// Prompt template file; the built-in template is used when unset.
    pub template_path: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_RADIUS_KM,
            max_candidate_chars: DEFAULT_MAX_CANDIDATE_CHARS,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            template_path: None,
        }
    }
}

impl GenerationConfig {
    pub fn options(&self) -> GeneratorOptions {
        GeneratorOptions {
            radius_km: self.radius_km,
            max_candidate_chars: self.max_candidate_chars,
            system_instruction: self.system_instruction.clone(),
        }
    }

    pub fn template(&self) -> Result<PromptTemplate, PipelineError> {
        match &self.template_path {
            Some(path) => Ok(PromptTemplate::from_path(path)?),
            None => Ok(PromptTemplate::default()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub reference: ReferenceDistribution,
}

impl PipelineConfig {
    /// Checks ranges that deserialization alone cannot enforce.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let generation = &self.generation;
        if !(generation.radius_km > 0.0) || !generation.radius_km.is_finite() {
            return Err(PipelineError::Config(format!(
                "radius_km must be positive, got {}",
                generation.radius_km
            )));
        }
        if generation.max_candidate_chars == 0 {
            return Err(PipelineError::Config("max_candidate_chars must be > 0".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(PipelineError::Config("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PipelineError::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.llm.temperature
            )));
        }
        if self.llm.api_key_env.trim().is_empty() {
            return Err(PipelineError::Config("api_key_env must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// [`Self::load`] when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, PipelineError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }
}
