//! Across-candidate cohort report
//!
//! Only cohort-level rows are serialized: dimension and group summaries,
//! breach rates, and pattern prevalence. Per-candidate percentile and group
//! score rows stay in the database.

use crate::aggregate::{BreachRateRow, SummaryRow};
use crate::materialise::MaterialiseSummary;
use crate::stats::SummaryStats;
use ppd_common::report::build_cohort_report;
use ppd_common::{GroupMap, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
struct PrevalenceEntry {
    count: i64,
    proportion: f64,
}

#[derive(Debug, Serialize)]
struct CohortSummary {
    n_candidates: usize,
    dimensions: GroupMap<SummaryStats>,
    dimension_breach_rates: GroupMap<GroupMap<f64>>,
    pattern_prevalence: GroupMap<PrevalenceEntry>,
}

#[derive(Debug, Serialize)]
struct GroupSummary {
    groups: GroupMap<SummaryStats>,
    group_breach_rates: GroupMap<GroupMap<f64>>,
    pattern_prevalence_by_group: GroupMap<GroupMap<PrevalenceEntry>>,
}

/// Build the across-candidate report for a committed run
pub fn cohort_report(summary: &MaterialiseSummary, version: &str) -> Result<Value> {
    let aggregate = &summary.aggregate;

    let mut pattern_prevalence = GroupMap::new();
    for row in &summary.prevalence.overall {
        pattern_prevalence.insert(
            row.pattern_label.as_str(),
            PrevalenceEntry {
                count: row.count,
                proportion: row.proportion,
            },
        );
    }

    let mut prevalence_by_group: GroupMap<GroupMap<PrevalenceEntry>> = GroupMap::new();
    for row in &summary.prevalence.by_group {
        prevalence_by_group
            .get_or_insert_with(&row.group_key, GroupMap::new)
            .insert(
                row.pattern_label.as_str(),
                PrevalenceEntry {
                    count: row.count,
                    proportion: row.proportion,
                },
            );
    }

    let cohort_summary = CohortSummary {
        n_candidates: summary.candidates,
        dimensions: summaries(&aggregate.dimension_summaries),
        dimension_breach_rates: breach_rates(&aggregate.dimension_breach_rates),
        pattern_prevalence,
    };

    let group_summary = GroupSummary {
        groups: summaries(&aggregate.group_summaries),
        group_breach_rates: breach_rates(&aggregate.group_breach_rates),
        pattern_prevalence_by_group: prevalence_by_group,
    };

    build_cohort_report(&cohort_summary, Some(&group_summary), version)
}

fn summaries(rows: &[SummaryRow]) -> GroupMap<SummaryStats> {
    let mut map = GroupMap::new();
    for row in rows {
        map.insert(row.key.as_str(), row.stats.clone());
    }
    map
}

fn breach_rates(rows: &[BreachRateRow]) -> GroupMap<GroupMap<f64>> {
    let mut map: GroupMap<GroupMap<f64>> = GroupMap::new();
    for row in rows {
        map.get_or_insert_with(&row.key, GroupMap::new)
            .insert(row.tau_name.as_str(), row.breach_rate);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::compute_cohort;
    use crate::aggregate::ScoreRow;
    use crate::prevalence::{compute_prevalence, PatternFlagRow};

    fn summary() -> MaterialiseSummary {
        let rows: Vec<ScoreRow> = [("c1", 4.0), ("c2", 2.0)]
            .iter()
            .map(|(cid, raw)| ScoreRow {
                candidate_id: cid.to_string(),
                dimension_key: "comm::clarity".to_string(),
                raw_score: *raw,
                norm_score: raw / 5.0,
                group_key: "comm".to_string(),
                dimension_name: "clarity".to_string(),
            })
            .collect();
        let taus: ppd_common::BreachThresholds = [("tau_low", 0.5)].into_iter().collect();
        let aggregate = compute_cohort(&rows, &[], &taus).unwrap();

        let flags = vec![
            PatternFlagRow {
                group_key: "comm".to_string(),
                balanced: true,
                bottlenecked: false,
                polarised: false,
                noisy: false,
                uniform_low: false,
                uniform_high: true,
            },
            PatternFlagRow {
                group_key: "comm".to_string(),
                balanced: true,
                bottlenecked: true,
                polarised: false,
                noisy: false,
                uniform_low: true,
                uniform_high: false,
            },
        ];

        MaterialiseSummary {
            candidates: 2,
            score_rows: rows.len(),
            copied_rows: 0,
            pattern_rows: flags.len(),
            aggregate,
            prevalence: compute_prevalence(&flags),
            transitions: Vec::new(),
        }
    }

    #[test]
    fn test_report_shape() {
        let report = cohort_report(&summary(), "1.1.2").unwrap();

        assert_eq!(report["metadata"]["axis"], "across-candidate");
        let cohort = &report["cohort_summary"];
        assert_eq!(cohort["n_candidates"], 2);
        assert_eq!(cohort["dimensions"]["comm::clarity"]["mean"], 0.6);
        assert_eq!(cohort["dimension_breach_rates"]["comm::clarity"]["tau_low"], 0.5);
        assert_eq!(cohort["pattern_prevalence"]["uniform_high"]["count"], 1);
        assert_eq!(cohort["pattern_prevalence"]["bottlenecked"]["proportion"], 0.5);

        let groups = &report["group_summary"];
        assert_eq!(groups["groups"]["comm"]["max"], 0.8);
        assert_eq!(
            groups["pattern_prevalence_by_group"]["comm"]["bottlenecked"]["count"],
            1
        );
    }

    #[test]
    fn test_report_has_no_candidate_rows() {
        let report = cohort_report(&summary(), "1.1.2").unwrap();
        let text = serde_json::to_string(&report).unwrap();
        assert!(!text.contains("c1"));
        assert!(!text.contains("candidate_id"));
    }
}
