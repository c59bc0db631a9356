//! Cross-candidate aggregation
//!
//! Builds the cohort-level row sets from the long score view: per-dimension
//! and per-group summaries, per-candidate percentile ranks, per-candidate
//! group scores, and breach rates against the named thresholds.

use crate::stats::{breach_rate, percentile_ranks, summary_stats, SummaryStats};
use ppd_common::{BreachThresholds, GroupMap, Result};
use serde::Serialize;
use std::collections::HashMap;

/// One row of the joined `scores × dimensions` view
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub candidate_id: String,
    pub dimension_key: String,
    pub raw_score: f64,
    pub norm_score: f64,
    pub group_key: String,
    pub dimension_name: String,
}

/// Summary of one dimension or group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: String,
    #[serde(flatten)]
    pub stats: SummaryStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionPercentileRow {
    pub candidate_id: String,
    pub dimension_key: String,
    pub raw_score: f64,
    pub norm_score: f64,
    pub percentile_rank: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupScoreRow {
    pub candidate_id: String,
    pub group_key: String,
    pub group_score_norm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupPercentileRow {
    pub candidate_id: String,
    pub group_key: String,
    pub group_score_norm: f64,
    pub percentile_rank: f64,
}

/// Breach rate of one dimension or group against one named threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreachRateRow {
    pub key: String,
    pub tau_name: String,
    pub tau_value: f64,
    pub breach_rate: f64,
}

/// Every cohort row set, ready to persist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortAggregate {
    pub dimension_summaries: Vec<SummaryRow>,
    pub dimension_percentiles: Vec<DimensionPercentileRow>,
    pub dimension_breach_rates: Vec<BreachRateRow>,
    pub group_scores: Vec<GroupScoreRow>,
    pub group_summaries: Vec<SummaryRow>,
    pub group_percentiles: Vec<GroupPercentileRow>,
    pub group_breach_rates: Vec<BreachRateRow>,
}

/// Aggregate the long score view across candidates
///
/// Dimensions are reported in first-seen order. Groups listed in
/// `group_order` come first (skipped if absent from the data), followed by
/// any other groups in first-seen order.
pub fn compute_cohort(
    rows: &[ScoreRow],
    group_order: &[String],
    taus: &BreachThresholds,
) -> Result<CohortAggregate> {
    let mut aggregate = CohortAggregate::default();

    let mut by_dimension: GroupMap<Vec<&ScoreRow>> = GroupMap::new();
    let mut by_candidate_group: Vec<((&str, &str), Vec<f64>)> = Vec::new();
    let mut candidate_group_index: HashMap<(&str, &str), usize> = HashMap::new();

    for row in rows {
        by_dimension
            .get_or_insert_with(&row.dimension_key, Vec::new)
            .push(row);

        let key = (row.candidate_id.as_str(), row.group_key.as_str());
        match candidate_group_index.get(&key) {
            Some(&idx) => by_candidate_group[idx].1.push(row.norm_score),
            None => {
                candidate_group_index.insert(key, by_candidate_group.len());
                by_candidate_group.push((key, vec![row.norm_score]));
            }
        }
    }

    // Dimensions
    for (dimension_key, dim_rows) in by_dimension.iter() {
        let norms: Vec<f64> = dim_rows.iter().map(|r| r.norm_score).collect();

        aggregate.dimension_summaries.push(SummaryRow {
            key: dimension_key.to_string(),
            stats: summary_stats(&norms)?,
        });

        for (row, rank) in dim_rows.iter().zip(percentile_ranks(&norms)) {
            aggregate.dimension_percentiles.push(DimensionPercentileRow {
                candidate_id: row.candidate_id.clone(),
                dimension_key: dimension_key.to_string(),
                raw_score: row.raw_score,
                norm_score: row.norm_score,
                percentile_rank: rank,
            });
        }

        push_breach_rates(&mut aggregate.dimension_breach_rates, dimension_key, &norms, taus)?;
    }

    // Per-candidate group scores
    let mut group_values: GroupMap<Vec<(String, f64)>> = GroupMap::new();
    for group in group_order {
        group_values.insert(group.as_str(), Vec::new());
    }

    for ((candidate_id, group_key), norms) in &by_candidate_group {
        let score = norms.iter().sum::<f64>() / norms.len() as f64;
        aggregate.group_scores.push(GroupScoreRow {
            candidate_id: candidate_id.to_string(),
            group_key: group_key.to_string(),
            group_score_norm: score,
        });
        group_values
            .get_or_insert_with(group_key, Vec::new)
            .push((candidate_id.to_string(), score));
    }

    // Groups
    for (group_key, members) in group_values.iter() {
        if members.is_empty() {
            continue;
        }
        let scores: Vec<f64> = members.iter().map(|(_, s)| *s).collect();

        aggregate.group_summaries.push(SummaryRow {
            key: group_key.to_string(),
            stats: summary_stats(&scores)?,
        });

        push_breach_rates(&mut aggregate.group_breach_rates, group_key, &scores, taus)?;

        for ((candidate_id, score), rank) in members.iter().zip(percentile_ranks(&scores)) {
            aggregate.group_percentiles.push(GroupPercentileRow {
                candidate_id: candidate_id.clone(),
                group_key: group_key.to_string(),
                group_score_norm: *score,
                percentile_rank: rank,
            });
        }
    }

    Ok(aggregate)
}

fn push_breach_rates(
    out: &mut Vec<BreachRateRow>,
    key: &str,
    values: &[f64],
    taus: &BreachThresholds,
) -> Result<()> {
    for (tau_name, tau_value) in taus.iter() {
        out.push(BreachRateRow {
            key: key.to_string(),
            tau_name: tau_name.to_string(),
            tau_value: *tau_value,
            breach_rate: breach_rate(values, *tau_value)?,
        });
    }
    Ok(())
}
