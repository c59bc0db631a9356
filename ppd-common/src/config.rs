//! Configuration loading and resolution
//!
//! All tunable assumptions of the analysis (score scale, pattern thresholds,
//! default dimension ordering, cohort settings) live in one immutable
//! [`PpdConfig`] value that callers thread into the components needing it.
//! Changing a value here changes the meaning of every output, so the value is
//! resolved once per run and never mutated afterwards.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`PPD_CONFIG`)
//! 3. Platform config file (`<config dir>/ppd/config.toml`), if present
//! 4. Compiled defaults (fallback)

use crate::scores::{DimensionKey, GroupMap};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PPD_CONFIG";

/// Raw rubric score scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Lowest valid raw score
    pub raw_min: f64,
    /// Highest valid raw score; normalization divides by this
    pub raw_max: f64,
    /// Clamp out-of-range raw scores instead of rejecting them
    pub clamp_out_of_range: bool,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            raw_min: 0.0,
            raw_max: 5.0,
            clamp_out_of_range: false,
        }
    }
}

/// Named cut points gating the pattern flags
///
/// A `None` threshold is "not configured". Predicates depending on it fail
/// loudly; the candidate orchestrator instead drops the whole pattern block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    /// std_pop <= tau_balance → balanced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_balance: Option<f64>,
    /// min <= tau_bottleneck → bottlenecked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_bottleneck: Option<f64>,
    /// std_pop >= tau_noisy → noisy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_noisy: Option<f64>,
    /// balanced and mean <= tau_uniform_low_mean → uniform_low
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_uniform_low_mean: Option<f64>,
    /// balanced and mean >= tau_uniform_high_mean → uniform_high
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_uniform_high_mean: Option<f64>,
    /// range >= tau_polarised_range (with tau_low/tau_high) → polarised
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_polarised_range: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_high: Option<f64>,
}

impl ThresholdSet {
    /// Threshold set with every cut point unconfigured
    pub fn unset() -> Self {
        Self::default()
    }

    /// Compiled default cut points on the normalized [0, 1] scale
    pub fn recommended() -> Self {
        Self {
            tau_balance: Some(0.12),
            tau_bottleneck: Some(0.25),
            tau_noisy: Some(0.22),
            tau_uniform_low_mean: Some(0.30),
            tau_uniform_high_mean: Some(0.70),
            tau_polarised_range: Some(0.55),
            tau_low: Some(0.30),
            tau_high: Some(0.70),
        }
    }

    /// All thresholds by name, in declaration order
    pub fn named(&self) -> [(&'static str, Option<f64>); 8] {
        [
            ("tau_balance", self.tau_balance),
            ("tau_bottleneck", self.tau_bottleneck),
            ("tau_noisy", self.tau_noisy),
            ("tau_uniform_low_mean", self.tau_uniform_low_mean),
            ("tau_uniform_high_mean", self.tau_uniform_high_mean),
            ("tau_polarised_range", self.tau_polarised_range),
            ("tau_low", self.tau_low),
            ("tau_high", self.tau_high),
        ]
    }

    /// Names of thresholds that are not configured
    pub fn missing(&self) -> Vec<&'static str> {
        self.named()
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name)
            .collect()
    }

    /// True if every pattern threshold is configured
    pub fn is_complete(&self) -> bool {
        self.named().iter().all(|(_, value)| value.is_some())
    }
}

/// Fetch a threshold value or fail naming it
pub fn require_threshold(name: &str, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| Error::ThresholdNotConfigured(name.to_string()))
}

/// Pattern classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// |z| cut-off for listing polarised dimensions
    pub polarised_z_threshold: f64,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            polarised_z_threshold: 1.0,
        }
    }
}

/// Adjacency descriptor settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjacencyConfig {
    /// Fallback ordering when a caller supplies none; empty means none configured
    pub dimension_order: Vec<DimensionKey>,
}

/// Cohort materialization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    /// Groups reported first, in this order; unlisted groups follow in first-seen order
    pub group_order: Vec<String>,
    /// Named cut points for breach-rate reporting (normalized scale), reported in this order
    pub breach_thresholds: BreachThresholds,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            group_order: default_group_order(),
            breach_thresholds: default_breach_thresholds(),
        }
    }
}

/// Default rubric category order
pub fn default_group_order() -> Vec<String> {
    [
        "communication_skills",
        "cognitive_insights",
        "analytical_quantitative_skills",
        "problem_structuring_framework_use",
        "execution_task_reliability",
        "collaboration_professional_interaction",
    ]
    .iter()
    .map(|g| g.to_string())
    .collect()
}

/// Named breach-rate cut points in reporting order
pub type BreachThresholds = GroupMap<f64>;

/// Default breach-rate thresholds
pub fn default_breach_thresholds() -> BreachThresholds {
    [
        ("tau_operational", 0.60),
        ("tau_high", 0.80),
        ("tau_low", 0.40),
    ]
    .into_iter()
    .collect()
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpdConfig {
    #[serde(default)]
    pub scale: ScaleConfig,
    /// A missing `[thresholds]` table yields the recommended set; a present
    /// table leaves omitted keys unconfigured.
    #[serde(default = "ThresholdSet::recommended")]
    pub thresholds: ThresholdSet,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub adjacency: AdjacencyConfig,
    #[serde(default)]
    pub cohort: CohortConfig,
}

impl Default for PpdConfig {
    fn default() -> Self {
        Self {
            scale: ScaleConfig::default(),
            thresholds: ThresholdSet::recommended(),
            patterns: PatternsConfig::default(),
            adjacency: AdjacencyConfig::default(),
            cohort: CohortConfig::default(),
        }
    }
}

impl PpdConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PpdConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))
    }

    /// Render as TOML (unconfigured thresholds are omitted)
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values that would make every downstream output meaningless
    pub fn validate(&self) -> Result<()> {
        let scale = &self.scale;
        if !scale.raw_min.is_finite() || !scale.raw_max.is_finite() {
            return Err(Error::Config("scale bounds must be finite".to_string()));
        }
        if scale.raw_max <= scale.raw_min {
            return Err(Error::Config(format!(
                "scale.raw_max ({}) must be greater than scale.raw_min ({})",
                scale.raw_max, scale.raw_min
            )));
        }

        for (name, value) in self.thresholds.named() {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::Config(format!("thresholds.{} must be finite", name)));
                }
            }
        }

        let z = self.patterns.polarised_z_threshold;
        if !z.is_finite() || z <= 0.0 {
            return Err(Error::Config(format!(
                "patterns.polarised_z_threshold must be a positive number, got {}",
                z
            )));
        }

        for (name, value) in self.cohort.breach_thresholds.iter() {
            if !value.is_finite() {
                return Err(Error::Config(format!(
                    "cohort.breach_thresholds.{} must be finite",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Resolve which config file to load, if any
///
/// An explicit CLI argument or environment variable is returned even if the
/// file does not exist (loading it then fails loudly). The platform default
/// is only returned when it exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file
    default_config_file().filter(|path| path.exists())
}

/// Resolve and load the run configuration
pub fn load_config(cli_arg: Option<&Path>) -> Result<PpdConfig> {
    match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
        Some(path) => {
            let config = PpdConfig::load_file(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => {
            // Priority 4: Compiled defaults
            info!("No config file found, using compiled defaults");
            Ok(PpdConfig::default())
        }
    }
}

/// Platform config file location (`~/.config/ppd/config.toml` on Linux)
fn default_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir().map(|d| d.join("ppd").join("config.toml"));
    debug!("Platform config file candidate: {:?}", path);
    path
}
