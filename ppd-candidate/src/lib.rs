//! # PPD Candidate Analysis
//!
//! Within-candidate pipeline:
//! - Normalizer (raw rubric scale → [0, 1])
//! - Metrics Engine (per-group descriptive statistics, tie-aware extremes)
//! - Adjacency Descriptor (order-aware cyclic difference energy)
//! - Pattern Classifier (threshold-gated diagnostic flags)
//! - Candidate Orchestrator and report assembly
//!
//! Everything here is synchronous and pure; configuration is passed in.

pub mod adjacency;
pub mod analyze;
pub mod metrics;
pub mod normalize;
pub mod patterns;
pub mod report;

pub use adjacency::adjacency_energy;
pub use analyze::{AnalyzeOptions, CandidateAnalyzer, CandidateReport};
pub use metrics::{group_metrics, metrics_by_group, GroupMetrics};
pub use normalize::{clamp, normalize, normalize_many, normalize_scores};
pub use patterns::{PatternClassifier, PatternFlags, PatternInput, PolarisedDimension};
pub use report::{candidate_report_from_payload, CandidateReportOptions};
