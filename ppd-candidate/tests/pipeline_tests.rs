//! End-to-end tests for the within-candidate pipeline
//!
//! Tests cover:
//! - Normalization properties over the default 0-5 scale
//! - Adjacency order sensitivity through the orchestrator
//! - Pattern block presence/absence and per-group coverage
//! - Envelope rounding and identity handling

use ppd_candidate::{
    candidate_report_from_payload, normalize, AnalyzeOptions, CandidateAnalyzer,
    CandidateReportOptions,
};
use ppd_common::{DimensionKey, PpdConfig, ScaleConfig, ScoreMap, ThresholdSet};
use serde_json::json;

fn keys(names: &[&str]) -> Vec<DimensionKey> {
    names.iter().map(|n| DimensionKey::parse(n)).collect()
}

// ========================================
// Normalization
// ========================================

#[test]
fn test_normalize_boundaries_with_and_without_clamp() {
    let scale = ScaleConfig::default();

    for raw in [-1.0, -0.0001, 5.0001, 12.0] {
        assert!(normalize(raw, &scale, false).is_err(), "{} should be rejected", raw);
        let clamped = normalize(raw, &scale, true).unwrap();
        assert!(clamped == 0.0 || clamped == 1.0);
    }
}

#[test]
fn test_clamp_policy_comes_from_config() {
    let mut config = PpdConfig::default();
    config.scale.clamp_out_of_range = true;
    let scores = ScoreMap::try_from_pairs([("g::a", 7.5), ("g::b", -2.0)]).unwrap();

    let report = CandidateAnalyzer::new(&config)
        .analyze(&scores, &AnalyzeOptions::default())
        .unwrap();
    assert_eq!(report.scores_norm.values(), vec![1.0, 0.0]);
    // Raw scores are carried through untouched
    assert_eq!(report.scores_raw, scores);
}

// ========================================
// Adjacency through the orchestrator
// ========================================

#[test]
fn test_orchestrator_adjacency_is_order_sensitive() {
    let config = PpdConfig::default();
    let analyzer = CandidateAnalyzer::new(&config);
    // Raw scores chosen so the normalized values are 0, 0.8, 0.1, 1.0
    let scores =
        ScoreMap::try_from_pairs([("A", 0.0), ("B", 4.0), ("C", 0.5), ("D", 5.0)]).unwrap();

    let d_for = |order: &[&str]| {
        let options = AnalyzeOptions {
            ordered_dimensions: Some(keys(order)),
            include_patterns: false,
            ..AnalyzeOptions::default()
        };
        analyzer
            .analyze(&scores, &options)
            .unwrap()
            .adjacency_d
            .unwrap()
    };

    assert!((d_for(&["A", "B", "C", "D"]) - 0.85).abs() < 1e-12);
    assert!((d_for(&["A", "C", "B", "D"]) - 0.5).abs() < 1e-12);
}

// ========================================
// Patterns
// ========================================

#[test]
fn test_patterns_cover_every_group_when_configured() {
    let config = PpdConfig::default();
    let scores = ScoreMap::try_from_pairs([
        ("communication_skills::clarity", 1.0),
        ("communication_skills::listening", 5.0),
        ("communication_skills::structure", 5.0),
        ("cognitive_insights::synthesis", 3.0),
        ("cognitive_insights::abstraction", 3.0),
    ])
    .unwrap();

    let report = CandidateAnalyzer::new(&config)
        .analyze(&scores, &AnalyzeOptions::default())
        .unwrap();
    let patterns = report.patterns_by_group.expect("patterns configured");
    assert_eq!(patterns.len(), report.metrics_by_group.len());

    let comm = patterns.get("communication_skills").unwrap();
    assert!(comm.bottlenecked);
    assert!(comm.polarised);
    assert!(comm.noisy);
    assert_eq!(
        comm.bottleneck_dimension,
        Some(DimensionKey::parse("communication_skills::clarity"))
    );
    // Normalized 0.2, 1.0, 1.0: only the low outlier passes |z| >= 1
    let low = comm.polarised_dimensions_low.as_ref().unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].dimension, DimensionKey::parse("communication_skills::clarity"));
    assert!((low[0].z + 2f64.sqrt()).abs() < 1e-9);
    assert_eq!(comm.polarised_dimensions_high, Some(vec![]));

    let cog = patterns.get("cognitive_insights").unwrap();
    assert!(cog.balanced);
    assert!(!cog.bottlenecked);
    assert!(!cog.uniform_low && !cog.uniform_high);
    assert!(cog.bottleneck_dimensions.is_none());
}

#[test]
fn test_patterns_disabled_or_unconfigured_are_null() {
    let scores = ScoreMap::try_from_pairs([("g::a", 1.0), ("g::b", 2.0)]).unwrap();

    let config = PpdConfig::default();
    let disabled = AnalyzeOptions {
        include_patterns: false,
        ..AnalyzeOptions::default()
    };
    let report = CandidateAnalyzer::new(&config).analyze(&scores, &disabled).unwrap();
    assert!(report.patterns_by_group.is_none());

    let mut unconfigured = PpdConfig::default();
    unconfigured.thresholds = ThresholdSet::unset();
    let report = CandidateAnalyzer::new(&unconfigured)
        .analyze(&scores, &AnalyzeOptions::default())
        .unwrap();
    assert!(report.patterns_by_group.is_none());
}

// ========================================
// Envelope
// ========================================

#[test]
fn test_envelope_rounds_floats_to_six_places() {
    let payload = json!({
        "candidate": {"id": 3, "email": "e@x.org", "phone_number": "1", "linkedin_tag": "l"},
        "scores": {"g": {"a": 1, "b": 2, "c": 2}}
    });
    let options = CandidateReportOptions {
        analyze: AnalyzeOptions::default(),
        include_identity: false,
        version: "test".to_string(),
    };

    let report = candidate_report_from_payload(&payload, &PpdConfig::default(), &options).unwrap();
    let mean = report["analysis"]["metrics_by_group"]["g"]["mean"].as_f64().unwrap();
    // (0.2 + 0.4 + 0.4) / 3
    assert_eq!(mean, 0.333333);
    assert_eq!(report["metadata"]["version"], json!("test"));
    assert!(report.get("candidate").is_none());
}

#[test]
fn test_category_containing_delimiter_groups_and_orders_by_wire_key() {
    let payload = json!({
        "candidate": {"id": 4, "email": "e@x.org", "phone_number": "1", "linkedin_tag": "l"},
        "scores": {"x::y": {"m": 1, "n": 2}}
    });
    let options = CandidateReportOptions {
        analyze: AnalyzeOptions {
            ordered_dimensions: Some(keys(&["x::y::m", "x::y::n"])),
            include_patterns: false,
            ..AnalyzeOptions::default()
        },
        include_identity: false,
        version: "test".to_string(),
    };

    let report = candidate_report_from_payload(&payload, &PpdConfig::default(), &options).unwrap();
    let groups: Vec<&String> = report["analysis"]["metrics_by_group"]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(groups, vec!["x"]);
    // |0.2 - 0.4| twice around the cycle, over two dimensions
    let d = report["analysis"]["adjacency_D"].as_f64().unwrap();
    assert!((d - 0.2).abs() < 1e-9);
}

#[test]
fn test_nested_delimiter_collision_is_rejected() {
    let payload = json!({
        "candidate": {"id": 5, "email": "e@x.org", "phone_number": "1", "linkedin_tag": "l"},
        "scores": {"a::b": {"c": 1}, "a": {"b::c": 4}}
    });
    let options = CandidateReportOptions {
        analyze: AnalyzeOptions::default(),
        include_identity: false,
        version: "test".to_string(),
    };

    let err = candidate_report_from_payload(&payload, &PpdConfig::default(), &options).unwrap_err();
    assert!(matches!(err, ppd_common::Error::DuplicateKey(ref k) if k == "a::b::c"));
}
