//! Within-candidate descriptive metrics
//!
//! Order-invariant summaries of one candidate's normalized scores, computed
//! per group. Every statistic fails with [`Error::EmptyInput`] on empty input.
//!
//! **Ties:** argmin/argmax collect every dimension within [`TIE_TOLERANCE`] of
//! the extreme, in insertion order. A single-winner argmin would hide ties
//! that are themselves diagnostic.

use ppd_common::{DimensionKey, Error, GroupMap, Result, ScoreMap};
use serde::{Deserialize, Serialize};

/// Absolute tolerance for treating two scores as tied at an extreme
pub const TIE_TOLERANCE: f64 = 1e-12;

/// Descriptive metrics for one group of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    pub mean: f64,
    pub std_pop: f64,
    pub min: f64,
    pub min_dimensions: Vec<DimensionKey>,
    pub max: f64,
    pub max_dimensions: Vec<DimensionKey>,
    pub range: f64,
    pub n_dimensions: usize,
}

fn require_values(values: &[f64], what: &str) -> Result<()> {
    if values.is_empty() {
        return Err(Error::EmptyInput(format!("cannot compute {} of empty input", what)));
    }
    Ok(())
}

pub fn mean(values: &[f64]) -> Result<f64> {
    require_values(values, "mean")?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by n)
pub fn population_std(values: &[f64]) -> Result<f64> {
    require_values(values, "standard deviation")?;
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Ok(variance.sqrt())
}

pub fn min(values: &[f64]) -> Result<f64> {
    require_values(values, "min")?;
    Ok(values.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn max(values: &[f64]) -> Result<f64> {
    require_values(values, "max")?;
    Ok(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn range(values: &[f64]) -> Result<f64> {
    Ok(max(values)? - min(values)?)
}

/// All dimensions tied at the minimum, plus the minimum
pub fn argmin_dimensions(scores: &ScoreMap) -> Result<(Vec<DimensionKey>, f64)> {
    let extreme = min(&scores.values())
        .map_err(|_| Error::EmptyInput("cannot compute argmin of empty scores".to_string()))?;
    Ok((tied_at(scores, extreme), extreme))
}

/// All dimensions tied at the maximum, plus the maximum
pub fn argmax_dimensions(scores: &ScoreMap) -> Result<(Vec<DimensionKey>, f64)> {
    let extreme = max(&scores.values())
        .map_err(|_| Error::EmptyInput("cannot compute argmax of empty scores".to_string()))?;
    Ok((tied_at(scores, extreme), extreme))
}

fn tied_at(scores: &ScoreMap, extreme: f64) -> Vec<DimensionKey> {
    scores
        .iter()
        .filter(|(_, value)| (value - extreme).abs() <= TIE_TOLERANCE)
        .map(|(key, _)| key.clone())
        .collect()
}

/// Compute the full metrics record for one score map
pub fn group_metrics(scores: &ScoreMap) -> Result<GroupMetrics> {
    if scores.is_empty() {
        return Err(Error::EmptyInput("scores map is empty".to_string()));
    }

    let values = scores.values();
    let (min_dimensions, min) = argmin_dimensions(scores)?;
    let (max_dimensions, max) = argmax_dimensions(scores)?;

    Ok(GroupMetrics {
        mean: mean(&values)?,
        std_pop: population_std(&values)?,
        min,
        min_dimensions,
        max,
        max_dimensions,
        range: max - min,
        n_dimensions: values.len(),
    })
}

/// Partition by group (first-seen order) and compute metrics per group
pub fn metrics_by_group(scores: &ScoreMap) -> Result<GroupMap<GroupMetrics>> {
    if scores.is_empty() {
        return Err(Error::EmptyInput("scores map is empty".to_string()));
    }

    let mut out = GroupMap::new();
    for (group, group_scores) in scores.partition_by_group() {
        let metrics = group_metrics(&group_scores)?;
        out.insert(group, metrics);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<DimensionKey> {
        names.iter().map(|n| DimensionKey::parse(n)).collect()
    }

    #[test]
    fn test_basic_statistics() {
        let values = [0.2, 0.4, 0.6, 0.8];
        assert!((mean(&values).unwrap() - 0.5).abs() < 1e-12);
        assert!((population_std(&values).unwrap() - 0.05f64.sqrt()).abs() < 1e-12);
        assert_eq!(min(&values).unwrap(), 0.2);
        assert_eq!(max(&values).unwrap(), 0.8);
        assert!((range(&values).unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_every_statistic_rejects_empty_input() {
        let empty: [f64; 0] = [];
        assert!(matches!(mean(&empty), Err(Error::EmptyInput(_))));
        assert!(matches!(population_std(&empty), Err(Error::EmptyInput(_))));
        assert!(matches!(min(&empty), Err(Error::EmptyInput(_))));
        assert!(matches!(max(&empty), Err(Error::EmptyInput(_))));
        assert!(matches!(range(&empty), Err(Error::EmptyInput(_))));
        assert!(matches!(argmin_dimensions(&ScoreMap::new()), Err(Error::EmptyInput(_))));
        assert!(matches!(argmax_dimensions(&ScoreMap::new()), Err(Error::EmptyInput(_))));
        assert!(matches!(group_metrics(&ScoreMap::new()), Err(Error::EmptyInput(_))));
        assert!(matches!(metrics_by_group(&ScoreMap::new()), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_argmin_keeps_ties_in_input_order() {
        let scores = ScoreMap::try_from_pairs([("A", 0.2), ("B", 0.2), ("C", 0.9)]).unwrap();
        let (dims, value) = argmin_dimensions(&scores).unwrap();
        assert_eq!(dims, keys(&["A", "B"]));
        assert_eq!(value, 0.2);
    }

    #[test]
    fn test_argmax_ties_within_tolerance() {
        let scores =
            ScoreMap::try_from_pairs([("x", 0.9), ("y", 0.9 - 1e-13), ("z", 0.1)]).unwrap();
        let (dims, value) = argmax_dimensions(&scores).unwrap();
        assert_eq!(dims, keys(&["x", "y"]));
        assert_eq!(value, 0.9);
    }

    #[test]
    fn test_group_metrics_record() {
        let scores = ScoreMap::try_from_pairs([("A", 0.0), ("B", 0.5), ("C", 1.0)]).unwrap();
        let m = group_metrics(&scores).unwrap();
        assert!((m.mean - 0.5).abs() < 1e-12);
        assert_eq!(m.min_dimensions, keys(&["A"]));
        assert_eq!(m.max_dimensions, keys(&["C"]));
        assert_eq!(m.range, 1.0);
        assert_eq!(m.n_dimensions, 3);
    }

    #[test]
    fn test_metrics_by_group_partitions_first_seen() {
        let scores = ScoreMap::try_from_pairs([
            ("comm::clarity", 0.8),
            ("cog::synthesis", 0.4),
            ("comm::listening", 0.6),
            ("loose", 0.5),
        ])
        .unwrap();

        let by_group = metrics_by_group(&scores).unwrap();
        let groups: Vec<&str> = by_group.keys().collect();
        assert_eq!(groups, vec!["comm", "cog", "ungrouped"]);

        let comm = by_group.get("comm").unwrap();
        assert_eq!(comm.n_dimensions, 2);
        assert!((comm.mean - 0.7).abs() < 1e-12);
        assert_eq!(by_group.get("ungrouped").unwrap().min_dimensions, keys(&["loose"]));
    }

    #[test]
    fn test_metrics_serialize_wire_keys() {
        let scores = ScoreMap::try_from_pairs([("g::a", 0.2), ("g::b", 0.2)]).unwrap();
        let json = serde_json::to_value(group_metrics(&scores).unwrap()).unwrap();
        assert_eq!(json["min_dimensions"], serde_json::json!(["g::a", "g::b"]));
        assert_eq!(json["n_dimensions"], serde_json::json!(2));
        assert_eq!(json["std_pop"], serde_json::json!(0.0));
    }
}
