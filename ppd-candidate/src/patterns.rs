//! Threshold-gated pattern classification
//!
//! Turns one group's metrics into boolean diagnostic flags. Thresholds come
//! from a borrowed [`ThresholdSet`]; every predicate fails with
//! [`Error::ThresholdNotConfigured`] when a cut point it reads is unset.
//!
//! **Flag definitions:**
//! - balanced: `std_pop <= tau_balance`
//! - bottlenecked: `min <= tau_bottleneck`
//! - noisy: `std_pop >= tau_noisy`
//! - uniform_low: balanced and `mean <= tau_uniform_low_mean`
//! - uniform_high: balanced and `mean >= tau_uniform_high_mean`
//! - polarised: `range >= tau_polarised_range`, `min <= tau_low` and `max >= tau_high`
//!
//! Flags are evaluated independently. Nothing here prevents noisy and
//! uniform_* from co-occurring if the configured thresholds overlap.

use crate::metrics::GroupMetrics;
use ppd_common::config::require_threshold;
use ppd_common::{DimensionKey, Error, Result, ScoreMap, ThresholdSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default |z| cut-off for polarised dimension lists
pub const DEFAULT_Z_THRESHOLD: f64 = 1.0;

/// Canonical classifier input
///
/// Required fields are optional here so that a partially populated record
/// fails in [`PatternClassifier::classify`] with [`Error::MissingField`]
/// naming the absent field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternInput {
    pub mean: Option<f64>,
    pub std_pop: Option<f64>,
    pub min: Option<f64>,
    pub min_dimensions: Option<Vec<DimensionKey>>,
    pub max: Option<f64>,
    pub range: Option<f64>,
    /// Accepted so a serialized [`GroupMetrics`] parses as-is; not used
    pub max_dimensions: Option<Vec<DimensionKey>>,
    /// Accepted so a serialized [`GroupMetrics`] parses as-is; not used
    pub n_dimensions: Option<usize>,
    /// Per-dimension scores of this group, for polarised dimension lists
    pub scores: Option<ScoreMap>,
}

impl PatternInput {
    /// Build from a complete metrics record plus the group's own scores
    pub fn from_metrics(metrics: &GroupMetrics, scores: Option<ScoreMap>) -> Self {
        Self {
            mean: Some(metrics.mean),
            std_pop: Some(metrics.std_pop),
            min: Some(metrics.min),
            min_dimensions: Some(metrics.min_dimensions.clone()),
            max: Some(metrics.max),
            range: Some(metrics.range),
            max_dimensions: Some(metrics.max_dimensions.clone()),
            n_dimensions: Some(metrics.n_dimensions),
            scores,
        }
    }

    /// Parse the single accepted JSON shape
    ///
    /// A non-object, an unknown key or a wrongly typed value is a
    /// [`Error::SchemaViolation`].
    pub fn from_json(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::SchemaViolation(
                "classifier input must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| Error::SchemaViolation(format!("invalid classifier input: {}", e)))
    }
}

/// A dimension whose within-group z-score passes the polarised cut-off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarisedDimension {
    pub dimension: DimensionKey,
    pub z: f64,
}

/// Diagnostic flags for one group of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternFlags {
    pub balanced: bool,
    pub bottlenecked: bool,
    pub polarised: bool,
    pub noisy: bool,
    pub uniform_low: bool,
    pub uniform_high: bool,
    /// First tied minimum; null unless bottlenecked
    pub bottleneck_dimension: Option<DimensionKey>,
    /// All tied minima; null unless bottlenecked
    pub bottleneck_dimensions: Option<Vec<DimensionKey>>,
    /// Null unless bottlenecked
    pub bottleneck_value: Option<f64>,
    /// Null unless polarised with per-dimension scores available
    pub polarised_dimensions_high: Option<Vec<PolarisedDimension>>,
    /// Null unless polarised with per-dimension scores available
    pub polarised_dimensions_low: Option<Vec<PolarisedDimension>>,
}

/// Pattern predicates over a borrowed threshold set
#[derive(Debug, Clone, Copy)]
pub struct PatternClassifier<'a> {
    thresholds: &'a ThresholdSet,
}

impl<'a> PatternClassifier<'a> {
    pub fn new(thresholds: &'a ThresholdSet) -> Self {
        Self { thresholds }
    }

    pub fn is_balanced(&self, std_pop: f64) -> Result<bool> {
        let tau = require_threshold("tau_balance", self.thresholds.tau_balance)?;
        Ok(std_pop <= tau)
    }

    pub fn is_bottlenecked(&self, min: f64) -> Result<bool> {
        let tau = require_threshold("tau_bottleneck", self.thresholds.tau_bottleneck)?;
        Ok(min <= tau)
    }

    pub fn is_noisy(&self, std_pop: f64) -> Result<bool> {
        let tau = require_threshold("tau_noisy", self.thresholds.tau_noisy)?;
        Ok(std_pop >= tau)
    }

    pub fn is_uniform_low(&self, mean: f64, std_pop: f64) -> Result<bool> {
        let tau = require_threshold("tau_uniform_low_mean", self.thresholds.tau_uniform_low_mean)?;
        Ok(self.is_balanced(std_pop)? && mean <= tau)
    }

    pub fn is_uniform_high(&self, mean: f64, std_pop: f64) -> Result<bool> {
        let tau =
            require_threshold("tau_uniform_high_mean", self.thresholds.tau_uniform_high_mean)?;
        Ok(self.is_balanced(std_pop)? && mean >= tau)
    }

    pub fn is_polarised(&self, min: f64, max: f64, range: f64) -> Result<bool> {
        let tau_range =
            require_threshold("tau_polarised_range", self.thresholds.tau_polarised_range)?;
        let tau_low = require_threshold("tau_low", self.thresholds.tau_low)?;
        let tau_high = require_threshold("tau_high", self.thresholds.tau_high)?;
        Ok(range >= tau_range && min <= tau_low && max >= tau_high)
    }

    /// Classify one group
    ///
    /// **Errors:**
    /// - [`Error::MissingField`] for the first absent of mean, std_pop, min,
    ///   min_dimensions, max, range
    /// - [`Error::ThresholdNotConfigured`] from any predicate
    pub fn classify(&self, input: &PatternInput, z_threshold: f64) -> Result<PatternFlags> {
        let mean = required(input.mean, "mean")?;
        let std_pop = required(input.std_pop, "std_pop")?;
        let min = required(input.min, "min")?;
        let min_dimensions = required(input.min_dimensions.as_ref(), "min_dimensions")?;
        let max = required(input.max, "max")?;
        let range = required(input.range, "range")?;

        let balanced = self.is_balanced(std_pop)?;
        let bottlenecked = self.is_bottlenecked(min)?;
        let polarised = self.is_polarised(min, max, range)?;
        let noisy = self.is_noisy(std_pop)?;
        let uniform_low = self.is_uniform_low(mean, std_pop)?;
        let uniform_high = self.is_uniform_high(mean, std_pop)?;

        let (bottleneck_dimension, bottleneck_dimensions, bottleneck_value) = if bottlenecked {
            (
                min_dimensions.first().cloned(),
                Some(min_dimensions.clone()),
                Some(min),
            )
        } else {
            (None, None, None)
        };

        let (high, low) = match (&input.scores, polarised) {
            (Some(scores), true) if !scores.is_empty() => {
                let (high, low) = polarised_dimension_lists(mean, std_pop, scores, z_threshold);
                (Some(high), Some(low))
            }
            _ => (None, None),
        };

        Ok(PatternFlags {
            balanced,
            bottlenecked,
            polarised,
            noisy,
            uniform_low,
            uniform_high,
            bottleneck_dimension,
            bottleneck_dimensions,
            bottleneck_value,
            polarised_dimensions_high: high,
            polarised_dimensions_low: low,
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::MissingField(field.to_string()))
}

/// Split dimensions by within-group z-score, each list by descending |z|
///
/// A zero std_pop yields two empty lists.
fn polarised_dimension_lists(
    mean: f64,
    std_pop: f64,
    scores: &ScoreMap,
    z_threshold: f64,
) -> (Vec<PolarisedDimension>, Vec<PolarisedDimension>) {
    if std_pop == 0.0 {
        return (Vec::new(), Vec::new());
    }

    let mut high = Vec::new();
    let mut low = Vec::new();

    for (key, x) in scores.iter() {
        let z = (x - mean) / std_pop;
        let entry = PolarisedDimension {
            dimension: key.clone(),
            z,
        };
        if z >= z_threshold {
            high.push(entry);
        } else if z <= -z_threshold {
            low.push(entry);
        }
    }

    high.sort_by(|a, b| b.z.abs().total_cmp(&a.z.abs()));
    low.sort_by(|a, b| b.z.abs().total_cmp(&a.z.abs()));

    (high, low)
}
