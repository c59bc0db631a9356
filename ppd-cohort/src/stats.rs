//! Cohort summary statistics
//!
//! Quantiles use linear interpolation between closest ranks
//! (`h = (n - 1) * q`). Percentile ranks use midrank tie handling.

use ppd_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Distribution summary of one dimension or group across the cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std: f64,
    pub iqr: f64,
    pub min: f64,
    pub max: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Summarize a non-empty sample
pub fn summary_stats(values: &[f64]) -> Result<SummaryStats> {
    if values.is_empty() {
        return Err(Error::EmptyInput("cannot summarize an empty sample".to_string()));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

    let p25 = quantile_sorted(&sorted, 0.25);
    let p50 = quantile_sorted(&sorted, 0.50);
    let p75 = quantile_sorted(&sorted, 0.75);

    Ok(SummaryStats {
        mean,
        median: p50,
        std,
        iqr: p75 - p25,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        p10: quantile_sorted(&sorted, 0.10),
        p25,
        p50,
        p75,
        p90: quantile_sorted(&sorted, 0.90),
    })
}

/// Linear-interpolated quantile of an ascending, non-empty slice
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let h = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Percentile rank in `[0, 100]` of every value, in input order
///
/// Tied values share the average of their 1-indexed rank span; the midrank
/// `r` maps to `(r - 1) / (n - 1) * 100`. A single value ranks `100.0`.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![100.0],
        _ => {}
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let midrank = (start + 1 + end + 1) as f64 / 2.0;
        for &idx in &order[start..=end] {
            ranks[idx] = midrank;
        }
        start = end + 1;
    }

    let span = (n - 1) as f64;
    ranks.into_iter().map(|r| (r - 1.0) / span * 100.0).collect()
}

/// Share of values strictly below `tau`
pub fn breach_rate(values: &[f64], tau: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(Error::EmptyInput(
            "cannot compute a breach rate of an empty sample".to_string(),
        ));
    }
    let breaches = values.iter().filter(|v| **v < tau).count();
    Ok(breaches as f64 / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_single_value_ranks_100() {
        assert_eq!(percentile_ranks(&[0.42]), vec![100.0]);
        assert!(percentile_ranks(&[]).is_empty());
    }

    #[test]
    fn test_midrank_ties_share_rank() {
        let ranks = percentile_ranks(&[10.0, 20.0, 20.0, 30.0]);
        // Midrank of the tie is 2.5 → (2.5 - 1) / 3 * 100
        assert!((ranks[0] - 0.0).abs() < EPS);
        assert!((ranks[1] - 50.0).abs() < EPS);
        assert_eq!(ranks[1], ranks[2]);
        assert!((ranks[3] - 100.0).abs() < EPS);
    }

    #[test]
    fn test_ranks_follow_input_order() {
        let ranks = percentile_ranks(&[0.9, 0.1, 0.5]);
        assert_eq!(ranks, vec![100.0, 0.0, 50.0]);
    }

    #[test]
    fn test_all_tied_rank_midpoint() {
        let ranks = percentile_ranks(&[0.3, 0.3, 0.3]);
        assert!(ranks.iter().all(|r| (r - 50.0).abs() < EPS));
    }

    #[test]
    fn test_summary_interpolates_quantiles() {
        let stats = summary_stats(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!((stats.mean - 2.5).abs() < EPS);
        assert!((stats.median - 2.5).abs() < EPS);
        assert!((stats.p25 - 1.75).abs() < EPS);
        assert!((stats.p75 - 3.25).abs() < EPS);
        assert!((stats.iqr - 1.5).abs() < EPS);
        assert!((stats.p10 - 1.3).abs() < EPS);
        assert!((stats.p90 - 3.7).abs() < EPS);
        assert!((stats.std - 1.25f64.sqrt()).abs() < EPS);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
    }

    #[test]
    fn test_summary_of_single_value() {
        let stats = summary_stats(&[0.6]).unwrap();
        assert_eq!(stats.p10, 0.6);
        assert_eq!(stats.p90, 0.6);
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.iqr, 0.0);
    }

    #[test]
    fn test_summary_rejects_empty() {
        assert!(matches!(summary_stats(&[]), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_breach_rate_is_strict() {
        let values = [0.4, 0.5, 0.6, 0.7];
        assert_eq!(breach_rate(&values, 0.6).unwrap(), 0.5);
        assert_eq!(breach_rate(&values, 0.4).unwrap(), 0.0);
        assert_eq!(breach_rate(&values, 1.0).unwrap(), 1.0);
        assert!(breach_rate(&[], 0.5).is_err());
    }
}
