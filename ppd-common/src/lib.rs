//! # PPD Common Library
//!
//! Shared code for all Profile Pattern Diagnostics crates including:
//! - Error taxonomy (Error enum)
//! - Configuration loading (scale, thresholds, orderings)
//! - Typed dimension keys and insertion-ordered score maps
//! - Input payload validation and flattening
//! - Report envelopes, metadata stamping and output validation

pub mod config;
pub mod error;
pub mod report;
pub mod schema;
pub mod scores;

pub use config::{BreachThresholds, PpdConfig, ScaleConfig, ThresholdSet};
pub use error::{Error, Result};
pub use scores::{DimensionKey, GroupMap, ScoreMap, DIMENSION_DELIMITER, UNGROUPED};
