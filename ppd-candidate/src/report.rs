//! Within-candidate report assembly
//!
//! Payload in, envelope out: validate the candidate payload, flatten its
//! nested scores, analyze, and wrap the result with metadata.

use crate::analyze::{AnalyzeOptions, CandidateAnalyzer};
use ppd_common::report::build_candidate_report;
use ppd_common::schema::{flatten_scores, validate_candidate_input};
use ppd_common::{PpdConfig, Result};
use serde_json::Value;
use tracing::info;

/// Output switches for [`candidate_report_from_payload`]
#[derive(Debug, Clone)]
pub struct CandidateReportOptions {
    pub analyze: AnalyzeOptions,
    /// Attach the candidate identity block to the envelope
    pub include_identity: bool,
    /// Version string stamped into the metadata
    pub version: String,
}

/// Build a complete within-candidate report from a raw JSON payload
pub fn candidate_report_from_payload(
    payload: &Value,
    config: &PpdConfig,
    options: &CandidateReportOptions,
) -> Result<Value> {
    let (identity, nested) = validate_candidate_input(payload)?;
    let raw_scores = flatten_scores(&nested)?;

    let analysis = CandidateAnalyzer::new(config).analyze(&raw_scores, &options.analyze)?;
    info!(
        "Analyzed candidate {} ({} dimensions, {} groups)",
        identity.id,
        raw_scores.len(),
        analysis.metrics_by_group.len()
    );

    build_candidate_report(
        &analysis,
        Some(&identity),
        options.include_identity,
        &options.version,
    )
}
