//! Input and output shape contracts

pub mod input;
pub mod output;

pub use input::{
    flatten_scores, validate_candidate_input, CandidateId, CandidateIdentity, CategoryScores,
    NestedScores,
};
pub use output::{validate_candidate_report, validate_cohort_report};
