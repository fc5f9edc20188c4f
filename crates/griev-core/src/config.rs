use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Directory holding the store, config, and lock files, relative to the
/// project root.
pub const GRV_DIR: &str = ".grv";

/// Weights must sum to 1.0 within this tolerance.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub weights: WeightConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Detection thresholds, all in percent [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Composite score at or above this marks a submission as a duplicate.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Maximum number of candidates scored per submission.
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    /// Audit rows with a composite below this are skipped.
    #[serde(default)]
    pub audit_floor: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            candidate_limit: default_candidate_limit(),
            audit_floor: 0.0,
        }
    }
}

/// Factor weights for the composite score. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default = "default_text_weight")]
    pub text: f64,
    #[serde(default = "default_location_weight")]
    pub location: f64,
    #[serde(default = "default_category_weight")]
    pub category: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            text: default_text_weight(),
            location: default_location_weight(),
            category: default_category_weight(),
        }
    }
}

impl WeightConfig {
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.text + self.location + self.category
    }
}

/// Which embedding backend produces complaint vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic feature-hashed bag-of-words. No network, no model files.
    #[default]
    Hash,
    /// HTTP embedding service. Requires the `remote-embed` feature.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Endpoint for the remote provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Request timeout for the remote provider.
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            dimension: default_embedding_dimension(),
            url: None,
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Preferred output mode ("pretty" | "text" | "json").
    #[serde(default)]
    pub output: Option<String>,
    /// Default submitter identity when no flag or env var is set.
    #[serde(default)]
    pub submitter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

impl ProjectConfig {
    /// Reject configurations the engine cannot score with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key and value.
    pub fn validate(&self) -> Result<()> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bail!("weights must sum to 1.0, got {sum}");
        }
        for (name, value) in [
            ("weights.text", self.weights.text),
            ("weights.location", self.weights.location),
            ("weights.category", self.weights.category),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be within [0.0, 1.0], got {value}");
            }
        }
        if !(0.0..=100.0).contains(&self.detection.threshold) {
            bail!(
                "detection.threshold must be within [0.0, 100.0], got {}",
                self.detection.threshold
            );
        }
        if !(0.0..=100.0).contains(&self.detection.audit_floor) {
            bail!(
                "detection.audit_floor must be within [0.0, 100.0], got {}",
                self.detection.audit_floor
            );
        }
        if self.detection.candidate_limit == 0 {
            bail!("detection.candidate_limit must be at least 1");
        }
        if !(8..=4096).contains(&self.embedding.dimension) {
            bail!(
                "embedding.dimension must be within [8, 4096], got {}",
                self.embedding.dimension
            );
        }
        if self.embedding.provider == EmbeddingProvider::Remote && self.embedding.url.is_none() {
            bail!("embedding.url is required when embedding.provider = \"remote\"");
        }
        Ok(())
    }
}

/// Path to the project config file under the given root.
#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(GRV_DIR).join("config.toml")
}

/// Load and validate `.grv/config.toml`. A missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if a value
/// fails validation.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_config_path(project_root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid config in {}", path.display()))?;

    Ok(config)
}

/// Load the user-level config from the platform config directory.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("griev/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve project and user config plus the effective output mode.
///
/// # Errors
///
/// Returns an error if either config file fails to load.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("GRV_FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            // canonical values
            "pretty" => Some("pretty"),
            "text" => Some("text"),
            "json" => Some("json"),
            // legacy compatibility
            "human" => Some("pretty"),
            "table" => Some("text"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_threshold() -> f64 {
    75.0
}

const fn default_candidate_limit() -> usize {
    50
}

const fn default_text_weight() -> f64 {
    0.6
}

const fn default_location_weight() -> f64 {
    0.25
}

const fn default_category_weight() -> f64 {
    0.15
}

const fn default_embedding_dimension() -> usize {
    384
}

const fn default_remote_timeout_secs() -> u64 {
    10
}
