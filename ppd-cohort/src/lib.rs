//! # PPD Cohort Materialization
//!
//! Across-candidate pipeline over a SQLite cohort database:
//! - SQLite storage (read-only source, staging destination)
//! - Candidate pass (per-candidate metrics and pattern rows)
//! - Cohort statistics (summaries, midrank percentiles, breach rates)
//! - Pattern prevalence
//! - Atomic materializer and cohort report

pub mod aggregate;
pub mod candidate_pass;
pub mod db;
pub mod materialise;
pub mod prevalence;
pub mod report;
pub mod stats;

pub use aggregate::{compute_cohort, CohortAggregate, ScoreRow};
pub use materialise::{
    materialise_db, CohortMaterializer, MaterialiseOptions, MaterialiseState, MaterialiseSummary,
};
pub use prevalence::{compute_prevalence, PatternLabel, Prevalence};
pub use report::cohort_report;
pub use stats::{breach_rate, percentile_ranks, summary_stats, SummaryStats};
