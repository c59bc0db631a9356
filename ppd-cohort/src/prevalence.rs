//! Pattern-label prevalence
//!
//! Every persisted candidate-group pattern row gets exactly one label, taken
//! from the first flag set in this priority order:
//!
//! `bottlenecked > polarised > noisy > uniform_low > uniform_high > balanced`
//!
//! and `other` when none is set. The ordering is a reporting policy kept for
//! compatibility with existing outputs; it is not derived from the flags.

use ppd_common::GroupMap;
use serde::Serialize;
use std::fmt;

/// Single reporting label for one candidate-group row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternLabel {
    Bottlenecked,
    Polarised,
    Noisy,
    UniformLow,
    UniformHigh,
    Balanced,
    Other,
}

impl PatternLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternLabel::Bottlenecked => "bottlenecked",
            PatternLabel::Polarised => "polarised",
            PatternLabel::Noisy => "noisy",
            PatternLabel::UniformLow => "uniform_low",
            PatternLabel::UniformHigh => "uniform_high",
            PatternLabel::Balanced => "balanced",
            PatternLabel::Other => "other",
        }
    }
}

impl fmt::Display for PatternLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flag columns of one persisted `candidate_group_patterns` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFlagRow {
    pub group_key: String,
    pub balanced: bool,
    pub bottlenecked: bool,
    pub polarised: bool,
    pub noisy: bool,
    pub uniform_low: bool,
    pub uniform_high: bool,
}

impl PatternFlagRow {
    pub fn label(&self) -> PatternLabel {
        if self.bottlenecked {
            PatternLabel::Bottlenecked
        } else if self.polarised {
            PatternLabel::Polarised
        } else if self.noisy {
            PatternLabel::Noisy
        } else if self.uniform_low {
            PatternLabel::UniformLow
        } else if self.uniform_high {
            PatternLabel::UniformHigh
        } else if self.balanced {
            PatternLabel::Balanced
        } else {
            PatternLabel::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrevalenceRow {
    pub pattern_label: PatternLabel,
    pub count: i64,
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupPrevalenceRow {
    pub group_key: String,
    pub pattern_label: PatternLabel,
    pub count: i64,
    pub proportion: f64,
}

/// Label counts overall and per group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prevalence {
    pub overall: Vec<PrevalenceRow>,
    pub by_group: Vec<GroupPrevalenceRow>,
}

/// Tally labels; labels and groups appear in first-seen order
///
/// Proportions are relative to all rows (overall) or to the rows of the
/// group (by group).
pub fn compute_prevalence(rows: &[PatternFlagRow]) -> Prevalence {
    let mut overall: Vec<(PatternLabel, i64)> = Vec::new();
    let mut by_group: GroupMap<Vec<(PatternLabel, i64)>> = GroupMap::new();

    for row in rows {
        let label = row.label();
        bump(&mut overall, label);
        bump(by_group.get_or_insert_with(&row.group_key, Vec::new), label);
    }

    let total = rows.len() as f64;
    let overall = overall
        .into_iter()
        .map(|(pattern_label, count)| PrevalenceRow {
            pattern_label,
            count,
            proportion: count as f64 / total,
        })
        .collect();

    let mut group_rows = Vec::new();
    for (group_key, counts) in by_group {
        let group_total: i64 = counts.iter().map(|(_, c)| c).sum();
        for (pattern_label, count) in counts {
            group_rows.push(GroupPrevalenceRow {
                group_key: group_key.clone(),
                pattern_label,
                count,
                proportion: count as f64 / group_total as f64,
            });
        }
    }

    Prevalence {
        overall,
        by_group: group_rows,
    }
}

fn bump(counts: &mut Vec<(PatternLabel, i64)>, label: PatternLabel) {
    match counts.iter_mut().find(|(l, _)| *l == label) {
        Some((_, count)) => *count += 1,
        None => counts.push((label, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(group: &str, set: &[&str]) -> PatternFlagRow {
        PatternFlagRow {
            group_key: group.to_string(),
            balanced: set.contains(&"balanced"),
            bottlenecked: set.contains(&"bottlenecked"),
            polarised: set.contains(&"polarised"),
            noisy: set.contains(&"noisy"),
            uniform_low: set.contains(&"uniform_low"),
            uniform_high: set.contains(&"uniform_high"),
        }
    }

    #[test]
    fn test_label_priority() {
        assert_eq!(
            flags("g", &["balanced", "bottlenecked", "polarised"]).label(),
            PatternLabel::Bottlenecked
        );
        assert_eq!(flags("g", &["noisy", "polarised"]).label(), PatternLabel::Polarised);
        assert_eq!(flags("g", &["noisy", "uniform_low"]).label(), PatternLabel::Noisy);
        assert_eq!(
            flags("g", &["balanced", "uniform_low", "uniform_high"]).label(),
            PatternLabel::UniformLow
        );
        assert_eq!(flags("g", &["balanced", "uniform_high"]).label(), PatternLabel::UniformHigh);
        assert_eq!(flags("g", &["balanced"]).label(), PatternLabel::Balanced);
        assert_eq!(flags("g", &[]).label(), PatternLabel::Other);
    }

    #[test]
    fn test_proportions_sum_to_one_per_group() {
        let rows = vec![
            flags("a", &["bottlenecked"]),
            flags("a", &["balanced"]),
            flags("a", &["balanced"]),
            flags("b", &[]),
            flags("b", &["noisy"]),
        ];
        let prevalence = compute_prevalence(&rows);

        for group in ["a", "b"] {
            let sum: f64 = prevalence
                .by_group
                .iter()
                .filter(|r| r.group_key == group)
                .map(|r| r.proportion)
                .sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }

        let overall_sum: f64 = prevalence.overall.iter().map(|r| r.proportion).sum();
        assert!((overall_sum - 1.0).abs() < 1e-12);

        let balanced = prevalence
            .overall
            .iter()
            .find(|r| r.pattern_label == PatternLabel::Balanced)
            .unwrap();
        assert_eq!(balanced.count, 2);
        assert!((balanced.proportion - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_no_rows_no_prevalence() {
        assert_eq!(compute_prevalence(&[]), Prevalence::default());
    }

    #[test]
    fn test_label_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(PatternLabel::UniformLow).unwrap(),
            serde_json::json!("uniform_low")
        );
        assert_eq!(PatternLabel::Other.to_string(), "other");
    }
}
