//! Per-candidate analysis over the long score view
//!
//! Each candidate's flat `dimension_key → raw_score` map is rebuilt from the
//! joined score rows and run through the candidate pipeline. The resulting
//! report is flattened into per-group metric and pattern rows ready to
//! persist.

use crate::aggregate::ScoreRow;
use ppd_candidate::{AnalyzeOptions, CandidateAnalyzer, CandidateReport, GroupMetrics, PatternFlags};
use ppd_common::report::utc_timestamp;
use ppd_common::{DimensionKey, Result, ScoreMap};
use std::collections::HashMap;

/// Per-group metrics of one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMetricsRow {
    pub candidate_id: String,
    pub group_key: String,
    pub metrics: GroupMetrics,
}

/// Per-group pattern flags of one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPatternsRow {
    pub candidate_id: String,
    pub group_key: String,
    pub flags: PatternFlags,
}

/// Serialized candidate report kept for audit
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateReportRow {
    pub candidate_id: String,
    pub generated_at_utc: String,
    pub report_json: String,
}

/// Everything the candidate pass persists for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOutputs {
    pub candidate_id: String,
    pub metrics: Vec<GroupMetricsRow>,
    pub patterns: Vec<GroupPatternsRow>,
    pub report: Option<CandidateReportRow>,
}

/// Raw score maps keyed by candidate id, in row order
///
/// Candidates without any score row get no entry.
pub fn raw_scores_by_candidate(rows: &[ScoreRow]) -> Result<HashMap<&str, ScoreMap>> {
    let mut by_candidate: HashMap<&str, ScoreMap> = HashMap::new();
    for row in rows {
        by_candidate
            .entry(row.candidate_id.as_str())
            .or_default()
            .insert(DimensionKey::parse(&row.dimension_key), row.raw_score)?;
    }
    Ok(by_candidate)
}

/// Analyze one candidate and flatten the report into output rows
///
/// A candidate with no scores is an error, as for any empty analysis.
pub fn run_candidate(
    analyzer: &CandidateAnalyzer<'_>,
    candidate_id: &str,
    raw_scores: &ScoreMap,
    store_json_report: bool,
) -> Result<CandidateOutputs> {
    let report = analyzer.analyze(raw_scores, &AnalyzeOptions::default())?;
    candidate_outputs(candidate_id, &report, store_json_report)
}

fn candidate_outputs(
    candidate_id: &str,
    report: &CandidateReport,
    store_json_report: bool,
) -> Result<CandidateOutputs> {
    let metrics = report
        .metrics_by_group
        .iter()
        .map(|(group_key, metrics)| GroupMetricsRow {
            candidate_id: candidate_id.to_string(),
            group_key: group_key.to_string(),
            metrics: metrics.clone(),
        })
        .collect();

    let patterns = match &report.patterns_by_group {
        Some(patterns) => patterns
            .iter()
            .map(|(group_key, flags)| GroupPatternsRow {
                candidate_id: candidate_id.to_string(),
                group_key: group_key.to_string(),
                flags: flags.clone(),
            })
            .collect(),
        None => Vec::new(),
    };

    let report = if store_json_report {
        Some(CandidateReportRow {
            candidate_id: candidate_id.to_string(),
            generated_at_utc: utc_timestamp(),
            report_json: serde_json::to_string(report)?,
        })
    } else {
        None
    };

    Ok(CandidateOutputs {
        candidate_id: candidate_id.to_string(),
        metrics,
        patterns,
        report,
    })
}
