use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project-relative location of the config file.
pub const CONFIG_PATH: &str = ".hybridfuse/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub fusion: FusionConfig,
}

/// Tunables for fusion and hybrid search, loaded from the `[fusion]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// RRF constant; higher values flatten the gap between adjacent ranks.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    /// How many candidates to request per modality, as a multiple of the limit.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    /// Upper bound applied to user-supplied result limits.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Column searched by vector queries unless one is given explicitly.
    #[serde(default = "default_vector_column")]
    pub vector_column: String,

    /// Column searched by text queries when no text column is selected.
    #[serde(default = "default_text_column")]
    pub text_column: String,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            overfetch_factor: default_overfetch_factor(),
            max_limit: default_max_limit(),
            vector_column: default_vector_column(),
            text_column: default_text_column(),
        }
    }
}

impl FusionConfig {
    /// Reject settings that would make every search fail or return nothing.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if !(self.rrf_k.is_finite() && self.rrf_k > 0.0) {
            bail!("fusion.rrf_k must be positive and finite, got {}", self.rrf_k);
        }
        if self.overfetch_factor == 0 {
            bail!("fusion.overfetch_factor must be at least 1");
        }
        if self.max_limit == 0 {
            bail!("fusion.max_limit must be at least 1");
        }
        Ok(())
    }
}

/// Default RRF constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Default candidate over-fetch multiplier per modality.
pub const DEFAULT_OVERFETCH_FACTOR: usize = 2;

const fn default_rrf_k() -> f64 {
    DEFAULT_RRF_K
}

const fn default_overfetch_factor() -> usize {
    DEFAULT_OVERFETCH_FACTOR
}

const fn default_max_limit() -> usize {
    1000
}

fn default_vector_column() -> String {
    "vector".to_string()
}

fn default_text_column() -> String {
    "text".to_string()
}

#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_PATH)
}

/// Load `.hybridfuse/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed, or fails
/// validation.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        debug!("no config at {}, using defaults", path.display());
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .fusion
        .validate()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(config)
}
