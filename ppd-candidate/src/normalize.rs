//! Raw rubric score normalization
//!
//! Maps raw scores on the configured `[raw_min, raw_max]` scale onto `[0, 1]`
//! by dividing by `raw_max`. Out-of-range input is clamped or rejected, never
//! passed through unmodified.

use ppd_common::{Error, Result, ScaleConfig, ScoreMap};

/// Clamp a raw score into `[raw_min, raw_max]`
pub fn clamp(raw: f64, scale: &ScaleConfig) -> f64 {
    if raw < scale.raw_min {
        return scale.raw_min;
    }
    if raw > scale.raw_max {
        return scale.raw_max;
    }
    raw
}

/// Normalize one raw score
///
/// **Errors:**
/// - [`Error::Division`] if `raw_max` is zero
/// - [`Error::Range`] if `raw` is out of range and `clamp_enabled` is false
pub fn normalize(raw: f64, scale: &ScaleConfig, clamp_enabled: bool) -> Result<f64> {
    if scale.raw_max == 0.0 {
        return Err(Error::Division(
            "raw_max must be non-zero for normalization".to_string(),
        ));
    }

    let mut value = raw;
    if raw < scale.raw_min || raw > scale.raw_max {
        if !clamp_enabled {
            return Err(Error::Range {
                value: raw,
                min: scale.raw_min,
                max: scale.raw_max,
            });
        }
        value = clamp(raw, scale);
    }

    Ok(value / scale.raw_max)
}

/// Normalize a sequence of raw scores, preserving order
///
/// Stops at the first offending element.
pub fn normalize_many(raws: &[f64], scale: &ScaleConfig, clamp_enabled: bool) -> Result<Vec<f64>> {
    raws.iter()
        .map(|raw| normalize(*raw, scale, clamp_enabled))
        .collect()
}

/// Normalize every score in a map using the scale's own clamp policy
pub fn normalize_scores(raw: &ScoreMap, scale: &ScaleConfig) -> Result<ScoreMap> {
    raw.try_map_values(|value| normalize(value, scale, scale.clamp_out_of_range))
}
