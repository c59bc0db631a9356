//! Smoke tests for the `ppd` binary

use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn ppd(config: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ppd"));
    cmd.env_remove("PPD_CONFIG").arg("--config").arg(config);
    cmd
}

#[test]
fn test_candidate_command_writes_report() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let input = dir.path().join("candidate.json");
    let output = dir.path().join("report.json");

    std::fs::write(&config, "").unwrap();
    std::fs::write(
        &input,
        r#"{
            "candidate": {
                "id": "cand-1",
                "email": "a@b.org",
                "phone_number": "555-0100",
                "linkedin_tag": "cand-1"
            },
            "scores": {
                "communication_skills": {"clarity": 4, "listening": 2},
                "cognitive_insights": {"synthesis": 5}
            }
        }"#,
    )
    .unwrap();

    let status = ppd(&config)
        .args(["candidate", "--no-identity", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(report["metadata"]["axis"], "within-candidate");
    assert!(report.get("candidate").is_none());
    assert_eq!(report["analysis"]["scores_norm"]["communication_skills::clarity"], 0.8);
    assert!(report["analysis"]["adjacency_D"].is_null());
}

#[test]
fn test_candidate_command_fails_on_invalid_payload() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let input = dir.path().join("candidate.json");
    let output = dir.path().join("report.json");

    std::fs::write(&config, "").unwrap();
    std::fs::write(&input, r#"{"candidate": {"id": "x"}, "scores": {}}"#).unwrap();

    let status = ppd(&config)
        .args(["candidate", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn test_show_config_prints_toml() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[scale]\nclamp_out_of_range = true\n").unwrap();

    let output = ppd(&config).arg("show-config").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("clamp_out_of_range = true"));
    assert!(stdout.contains("[thresholds]"));
}

#[test]
fn test_materialise_requires_existing_input() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();
    let out_db = dir.path().join("out.db");

    let status = ppd(&config)
        .args(["materialise-db", "--in-db"])
        .arg(dir.path().join("missing.db"))
        .arg("--out-db")
        .arg(&out_db)
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!out_db.exists());
}
