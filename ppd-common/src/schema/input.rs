//! Candidate input payload validation and flattening
//!
//! Accepts exactly one payload shape:
//!
//! ```json
//! {
//!   "candidate": {"id": 7, "email": "...", "phone_number": "...", "linkedin_tag": "..."},
//!   "scores": {"category": {"metric": 3.5}}
//! }
//! ```
//!
//! Anything else is rejected with [`Error::SchemaViolation`].

use crate::scores::{DimensionKey, ScoreMap, DIMENSION_DELIMITER};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Candidate identifier: string or integer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateId::Int(id) => write!(f, "{}", id),
            CandidateId::Text(id) => f.write_str(id),
        }
    }
}

/// Candidate identity block (metadata only; never feeds the analysis)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub id: CandidateId,
    pub email: String,
    pub phone_number: String,
    pub linkedin_tag: String,
}

/// One rubric category and its metric scores, in payload order
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScores {
    pub category: String,
    pub metrics: Vec<(String, f64)>,
}

/// Validated `{category: {metric: number}}` scores, in payload order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedScores {
    pub categories: Vec<CategoryScores>,
}

/// Validate a candidate payload into identity + nested scores
pub fn validate_candidate_input(payload: &Value) -> Result<(CandidateIdentity, NestedScores)> {
    let root = payload
        .as_object()
        .ok_or_else(|| violation("Candidate payload must be a JSON object."))?;

    let candidate = root
        .get("candidate")
        .ok_or_else(|| violation("Missing required key: 'candidate'."))?;
    let scores = root
        .get("scores")
        .ok_or_else(|| violation("Missing required key: 'scores'."))?;

    let candidate = candidate
        .as_object()
        .ok_or_else(|| violation("'candidate' must be an object."))?;
    let scores = scores
        .as_object()
        .ok_or_else(|| violation("'scores' must be an object."))?;

    let identity = validate_identity(candidate)?;
    let nested = validate_scores(scores)?;

    Ok((identity, nested))
}

fn validate_identity(candidate: &Map<String, Value>) -> Result<CandidateIdentity> {
    for field in ["id", "email", "phone_number", "linkedin_tag"] {
        if !candidate.contains_key(field) {
            return Err(violation(&format!("Missing required field: candidate.{}", field)));
        }
    }

    let id = match &candidate["id"] {
        Value::Number(n) => n
            .as_i64()
            .map(CandidateId::Int)
            .ok_or_else(|| violation("candidate.id must be an integer or a string."))?,
        Value::String(s) => CandidateId::Text(s.clone()),
        Value::Bool(_) => {
            return Err(violation(
                "candidate.id must be an integer or a string (bool is not allowed).",
            ))
        }
        _ => return Err(violation("candidate.id must be an integer or a string.")),
    };

    Ok(CandidateIdentity {
        id,
        email: required_text(candidate, "email")?,
        phone_number: required_text(candidate, "phone_number")?,
        linkedin_tag: required_text(candidate, "linkedin_tag")?,
    })
}

fn required_text(candidate: &Map<String, Value>, field: &str) -> Result<String> {
    match candidate.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(violation(&format!(
            "candidate.{} must be a non-empty string.",
            field
        ))),
    }
}

fn validate_scores(scores: &Map<String, Value>) -> Result<NestedScores> {
    let mut nested = NestedScores::default();

    for (category, metric_map) in scores {
        let cat = category.trim();
        if cat.is_empty() {
            return Err(violation("All score categories must be non-empty strings."));
        }

        let metric_map = metric_map.as_object().ok_or_else(|| {
            violation(&format!("Scores for category '{}' must be an object.", cat))
        })?;

        let mut metrics = Vec::with_capacity(metric_map.len());
        for (metric, value) in metric_map {
            let name = metric.trim();
            if name.is_empty() {
                return Err(violation(&format!(
                    "All metric names in category '{}' must be non-empty strings.",
                    cat
                )));
            }
            metrics.push((name.to_string(), numeric_leaf(cat, name, value)?));
        }

        if metrics.is_empty() {
            return Err(violation(&format!("Category '{}' has no metrics.", cat)));
        }

        nested.categories.push(CategoryScores {
            category: cat.to_string(),
            metrics,
        });
    }

    if nested.categories.is_empty() {
        return Err(violation("'scores' contains no categories."));
    }

    Ok(nested)
}

fn numeric_leaf(category: &str, metric: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Null => Err(violation(&format!(
            "Metric '{}::{}' is missing a value (null).",
            category, metric
        ))),
        Value::Bool(_) => Err(violation(&format!(
            "Metric '{}::{}' must be numeric (bool is not allowed).",
            category, metric
        ))),
        Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                violation(&format!(
                    "Metric '{}::{}' must be finite.",
                    category, metric
                ))
            }),
        _ => Err(violation(&format!(
            "Metric '{}::{}' must be numeric.",
            category, metric
        ))),
    }
}

/// Flatten nested scores into `"category::metric"` keys
///
/// Keys are parsed from the joined wire string, so `{"a::b": {"c": ..}}` and
/// `{"a": {"b::c": ..}}` both produce `a::b::c` and collide. Fails with
/// [`Error::DuplicateKey`] on any collision.
pub fn flatten_scores(nested: &NestedScores) -> Result<ScoreMap> {
    let mut flat = ScoreMap::new();

    for cat in &nested.categories {
        for (metric, value) in &cat.metrics {
            let key = format!("{}{}{}", cat.category, DIMENSION_DELIMITER, metric);
            flat.insert(DimensionKey::parse(&key), *value)?;
        }
    }

    if flat.is_empty() {
        return Err(Error::EmptyInput("No scores found after flattening.".to_string()));
    }

    Ok(flat)
}

fn violation(message: &str) -> Error {
    Error::SchemaViolation(message.to_string())
}
