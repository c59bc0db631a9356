//! Report envelopes and metadata stamping
//!
//! The analysis crates produce plain structured results. This module wraps
//! them in a stable envelope: generation metadata, an axis tag, optional
//! candidate identity, floats rounded to 6 decimal places, and a final shape
//! validation.

use crate::schema::{validate_candidate_report, validate_cohort_report, CandidateIdentity};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Tool name stamped into every output
pub const TOOL_NAME: &str = "Profile Pattern Diagnostics (PPD)";

/// Scope note stamped into every output
pub const SCOPE_NOTE: &str =
    "Diagnostic + descriptive only. No predictions, rankings, or suitability decisions.";

/// Decimal places kept in report floats
pub const REPORT_FLOAT_DIGITS: i32 = 6;

/// Which axis a report describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Axis {
    WithinCandidate,
    AcrossCandidate,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::WithinCandidate => "within-candidate",
            Axis::AcrossCandidate => "across-candidate",
        }
    }
}

/// Standard metadata attached to every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub tool: String,
    pub version: String,
    pub axis: Axis,
    pub generated_at_utc: String,
    pub scope_note: String,
}

impl ReportMetadata {
    pub fn new(axis: Axis, version: &str) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            version: version.to_string(),
            axis,
            generated_at_utc: utc_timestamp(),
            scope_note: SCOPE_NOTE.to_string(),
        }
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`
pub fn utc_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Wrap a candidate analysis in a within-candidate report
///
/// With `include_identity` false the `candidate` key is omitted entirely;
/// with it true and no identity known, `candidate` is null. The analysis is
/// serialized from a shared reference and never modified.
pub fn build_candidate_report<T: Serialize>(
    analysis: &T,
    identity: Option<&CandidateIdentity>,
    include_identity: bool,
    version: &str,
) -> Result<Value> {
    let mut report = Map::new();
    report.insert(
        "metadata".to_string(),
        serde_json::to_value(ReportMetadata::new(Axis::WithinCandidate, version))?,
    );
    report.insert("analysis".to_string(), serde_json::to_value(analysis)?);

    if include_identity {
        let candidate = match identity {
            Some(identity) => serde_json::to_value(identity)?,
            None => Value::Null,
        };
        report.insert("candidate".to_string(), candidate);
    }

    let report = round_floats(Value::Object(report), REPORT_FLOAT_DIGITS);
    validate_candidate_report(&report)?;
    Ok(report)
}

/// Wrap cohort-level summaries in an across-candidate report
pub fn build_cohort_report<C: Serialize, G: Serialize>(
    cohort_summary: &C,
    group_summary: Option<&G>,
    version: &str,
) -> Result<Value> {
    let mut report = Map::new();
    report.insert(
        "metadata".to_string(),
        serde_json::to_value(ReportMetadata::new(Axis::AcrossCandidate, version))?,
    );
    report.insert("cohort_summary".to_string(), serde_json::to_value(cohort_summary)?);
    report.insert(
        "group_summary".to_string(),
        match group_summary {
            Some(summary) => serde_json::to_value(summary)?,
            None => Value::Null,
        },
    );

    let report = round_floats(Value::Object(report), REPORT_FLOAT_DIGITS);
    validate_cohort_report(&report)?;
    Ok(report)
}

/// Round every float in a JSON tree; integers are left untouched
pub fn round_floats(value: Value, digits: i32) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => {
            let factor = 10f64.powi(digits);
            let rounded = n.as_f64().map(|v| (v * factor).round() / factor);
            match rounded.and_then(Number::from_f64) {
                Some(num) => Value::Number(num),
                None => Value::Number(n),
            }
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| round_floats(v, digits)).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, round_floats(v, digits)))
                .collect(),
        ),
        other => other,
    }
}
