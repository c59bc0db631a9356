//! Candidate orchestration
//!
//! Normalizer → Metrics Engine → (Adjacency Descriptor, Pattern Classifier),
//! composed into one [`CandidateReport`].
//!
//! **Degradation:** adjacency and patterns are optional context. An
//! unresolvable ordering or an incomplete threshold set nulls the
//! corresponding output instead of failing. Empty or out-of-range score input
//! is always a hard error.

use crate::adjacency::adjacency_energy;
use crate::metrics::{metrics_by_group, GroupMetrics};
use crate::normalize::normalize_scores;
use crate::patterns::{PatternClassifier, PatternFlags, PatternInput};
use ppd_common::{DimensionKey, Error, GroupMap, PpdConfig, Result, ScoreMap};
use serde::Serialize;
use tracing::debug;

/// Per-call switches for [`CandidateAnalyzer::analyze`]
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Explicit adjacency ordering; `None` or empty falls back to the configured default
    pub ordered_dimensions: Option<Vec<DimensionKey>>,
    pub include_adjacency: bool,
    pub include_patterns: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            ordered_dimensions: None,
            include_adjacency: true,
            include_patterns: true,
        }
    }
}

/// Within-candidate analysis result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateReport {
    pub scores_raw: ScoreMap,
    pub scores_norm: ScoreMap,
    pub metrics_by_group: GroupMap<GroupMetrics>,
    #[serde(rename = "adjacency_D")]
    pub adjacency_d: Option<f64>,
    pub adjacency_order: Option<Vec<DimensionKey>>,
    pub patterns_by_group: Option<GroupMap<PatternFlags>>,
}

/// Runs the candidate pipeline against one immutable configuration
#[derive(Debug, Clone, Copy)]
pub struct CandidateAnalyzer<'a> {
    config: &'a PpdConfig,
}

impl<'a> CandidateAnalyzer<'a> {
    pub fn new(config: &'a PpdConfig) -> Self {
        Self { config }
    }

    /// Analyze one candidate's raw scores
    pub fn analyze(
        &self,
        raw_scores: &ScoreMap,
        options: &AnalyzeOptions,
    ) -> Result<CandidateReport> {
        if raw_scores.is_empty() {
            return Err(Error::EmptyInput("raw scores are empty".to_string()));
        }

        let scores_norm = normalize_scores(raw_scores, &self.config.scale)?;
        let metrics = metrics_by_group(&scores_norm)?;

        let (adjacency_d, adjacency_order) = if options.include_adjacency {
            match self.resolve_order(options.ordered_dimensions.as_deref()) {
                Some(order) => {
                    let d = adjacency_energy(order, &scores_norm)?;
                    (Some(d), Some(order.to_vec()))
                }
                None => {
                    debug!("No dimension ordering resolved; adjacency omitted");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        let patterns_by_group = if options.include_patterns {
            self.classify_groups(&metrics, &scores_norm)?
        } else {
            None
        };

        Ok(CandidateReport {
            scores_raw: raw_scores.clone(),
            scores_norm,
            metrics_by_group: metrics,
            adjacency_d,
            adjacency_order,
            patterns_by_group,
        })
    }

    fn resolve_order<'o>(
        &'o self,
        explicit: Option<&'o [DimensionKey]>,
    ) -> Option<&'o [DimensionKey]> {
        match explicit {
            Some(order) if !order.is_empty() => Some(order),
            _ => {
                let fallback = self.config.adjacency.dimension_order.as_slice();
                (!fallback.is_empty()).then_some(fallback)
            }
        }
    }

    fn classify_groups(
        &self,
        metrics: &GroupMap<GroupMetrics>,
        scores_norm: &ScoreMap,
    ) -> Result<Option<GroupMap<PatternFlags>>> {
        let thresholds = &self.config.thresholds;
        if !thresholds.is_complete() {
            debug!(
                "Pattern thresholds not configured ({}); patterns omitted",
                thresholds.missing().join(", ")
            );
            return Ok(None);
        }

        let classifier = PatternClassifier::new(thresholds);
        let z_threshold = self.config.patterns.polarised_z_threshold;

        let mut patterns = GroupMap::new();
        for (group, group_metrics) in metrics.iter() {
            let own_scores = scores_norm.namespaced_in(group);
            let own_scores = (!own_scores.is_empty()).then_some(own_scores);
            let input = PatternInput::from_metrics(group_metrics, own_scores);
            patterns.insert(group, classifier.classify(&input, z_threshold)?);
        }

        Ok(Some(patterns))
    }
}
