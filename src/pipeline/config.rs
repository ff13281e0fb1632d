//! Conversion settings. Loaded from TOML, `.env` and `VECPACK_*` variables.

use super::{PipelineError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_INPUT: &str = "VECPACK_INPUT";
pub const ENV_OUTPUT_DIR: &str = "VECPACK_OUTPUT_DIR";
pub const ENV_VECTORS_FILE: &str = "VECPACK_VECTORS_FILE";
pub const ENV_DOCIDS_FILE: &str = "VECPACK_DOCIDS_FILE";
pub const ENV_MAPPING_FILE: &str = "VECPACK_MAPPING_FILE";
pub const ENV_HTTP_TIMEOUT: &str = "VECPACK_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// JSONL input, one `{"vector": [...], "docid": "..."}` per line.
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub vectors_file: String,
    pub docids_file: String,
    pub mapping_file: String,
    /// Timeout applied to HTTP range requests.
    pub http_timeout_secs: u64,
    /// Written to the `__metadata__` block of both containers.
    pub metadata: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input/vectors.part00.jsonl"),
            output_dir: PathBuf::from("output"),
            vectors_file: "vectors.safetensors".to_string(),
            docids_file: "docids.safetensors".to_string(),
            mapping_file: "docid_to_idx.json".to_string(),
            http_timeout_secs: 30,
            metadata: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by `.env` and process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `VECPACK_*` overrides from `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_INPUT) {
            self.input_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_VECTORS_FILE) {
            self.vectors_file = v;
        }
        if let Some(v) = lookup(ENV_DOCIDS_FILE) {
            self.docids_file = v;
        }
        if let Some(v) = lookup(ENV_MAPPING_FILE) {
            self.mapping_file = v;
        }
        if let Some(v) = lookup(ENV_HTTP_TIMEOUT) {
            self.http_timeout_secs = v.trim().parse().map_err(|_| {
                PipelineError::Config(format!("{ENV_HTTP_TIMEOUT} is not a number: '{v}'"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let names = [&self.vectors_file, &self.docids_file, &self.mapping_file];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(PipelineError::Config("output file names must not be empty".into()));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(PipelineError::Config("output file names must be distinct".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(PipelineError::Config("http_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.output_dir.join(&self.vectors_file)
    }

    pub fn docids_path(&self) -> PathBuf {
        self.output_dir.join(&self.docids_file)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.output_dir.join(&self.mapping_file)
    }
}
