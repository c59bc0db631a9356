//! Report envelope validation
//!
//! Within-candidate reports may carry an identity block. Across-candidate
//! (cohort) reports must never contain identity or contact fields anywhere
//! in their summaries.

use crate::report::Axis;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Keys that identify or contact a candidate
const FORBIDDEN_PII_KEYS: [&str; 3] = ["email", "phone_number", "linkedin_tag"];
const FORBIDDEN_ID_KEYS: [&str; 5] = [
    "candidate_id",
    "candidate_email",
    "candidate_phone_no",
    "candidate_phone_number",
    "candidate",
];

/// Validate a within-candidate report envelope
///
/// - `metadata` required with axis `within-candidate`
/// - `analysis` required object
/// - `candidate` optional: absent, null, or an object
pub fn validate_candidate_report(report: &Value) -> Result<()> {
    let report = require_object(report, "candidate_report")?;

    require_metadata(report.get("metadata"), Axis::WithinCandidate)?;
    require_object_field(report, "analysis")?;

    if let Some(candidate) = report.get("candidate") {
        if !candidate.is_null() {
            require_object(candidate, "candidate")?;
        }
    }

    Ok(())
}

/// Validate an across-candidate report envelope
///
/// - `metadata` required with axis `across-candidate`
/// - `cohort_summary` required object, `group_summary` optional object or null
/// - no identity/contact keys at any depth of either summary
pub fn validate_cohort_report(report: &Value) -> Result<()> {
    let report = require_object(report, "cohort_report")?;

    require_metadata(report.get("metadata"), Axis::AcrossCandidate)?;
    let cohort_summary = require_object_field(report, "cohort_summary")?;

    if let Some(key) = find_forbidden_key(&Value::Object(cohort_summary.clone())) {
        return Err(Error::SchemaViolation(format!(
            "Cohort report contains forbidden identity/PII key '{}' in cohort_summary.",
            key
        )));
    }

    if let Some(group_summary) = report.get("group_summary") {
        if !group_summary.is_null() {
            require_object(group_summary, "group_summary")?;
            if let Some(key) = find_forbidden_key(group_summary) {
                return Err(Error::SchemaViolation(format!(
                    "Cohort report contains forbidden identity/PII key '{}' in group_summary.",
                    key
                )));
            }
        }
    }

    Ok(())
}

fn require_object<'a>(value: &'a Value, name: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::SchemaViolation(format!("{} must be an object.", name)))
}

fn require_object_field<'a>(
    parent: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Map<String, Value>> {
    match parent.get(field) {
        Some(value) => require_object(value, field),
        None => Err(Error::SchemaViolation(format!("Missing required key: '{}'.", field))),
    }
}

fn require_metadata(meta: Option<&Value>, expected: Axis) -> Result<()> {
    let meta =
        meta.ok_or_else(|| Error::SchemaViolation("Missing required key: 'metadata'.".into()))?;
    let meta = require_object(meta, "metadata")?;

    for field in ["tool", "version", "axis", "generated_at_utc", "scope_note"] {
        match meta.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            _ => {
                return Err(Error::SchemaViolation(format!(
                    "metadata.{} must be a non-empty string.",
                    field
                )))
            }
        }
    }

    let axis = meta.get("axis").and_then(Value::as_str).unwrap_or_default();
    if axis != expected.as_str() {
        return Err(Error::SchemaViolation(format!(
            "metadata.axis must be '{}', got '{}'.",
            expected.as_str(),
            axis
        )));
    }

    Ok(())
}

/// First forbidden key found by a depth-first walk, if any
fn find_forbidden_key(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            if FORBIDDEN_PII_KEYS.contains(&key.as_str())
                || FORBIDDEN_ID_KEYS.contains(&key.as_str())
            {
                Some(key.clone())
            } else {
                find_forbidden_key(child)
            }
        }),
        Value::Array(items) => items.iter().find_map(find_forbidden_key),
        _ => None,
    }
}
