//! Cohort materialization workflow
//!
//! **States:** Initialized → TablesCopied → OutputsCreated →
//! CandidatePassComplete → CohortPassComplete → PrevalencePassComplete →
//! Committed
//!
//! **Atomicity:** everything is written to `<out>.tmp` inside one
//! transaction. The staging file replaces the output only after commit; on
//! any error it is removed and an existing output is left as it was.
//!
//! A single attempt is made; nothing is retried.

use crate::aggregate::{compute_cohort, CohortAggregate};
use crate::candidate_pass::{raw_scores_by_candidate, run_candidate};
use crate::db::{self, SourceDb, BASE_TABLES};
use crate::prevalence::{compute_prevalence, Prevalence};
use chrono::{DateTime, Utc};
use ppd_candidate::CandidateAnalyzer;
use ppd_common::report::{utc_timestamp, TOOL_NAME};
use ppd_common::{BreachThresholds, Error, PpdConfig, Result, ScoreMap};
use serde::Serialize;
use sqlx::{Connection, SqliteConnection};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Materialization workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialiseState {
    /// Nothing written yet
    Initialized,
    /// candidates/dimensions/scores copied into staging
    TablesCopied,
    /// Output tables and metadata created
    OutputsCreated,
    /// Per-candidate metrics, patterns and reports written
    CandidatePassComplete,
    /// Summaries, percentiles, group scores and breach rates written
    CohortPassComplete,
    /// Prevalence written from persisted pattern flags
    PrevalencePassComplete,
    /// Transaction committed and output published
    Committed,
}

impl fmt::Display for MaterialiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MaterialiseState::Initialized => "INITIALIZED",
            MaterialiseState::TablesCopied => "TABLES_COPIED",
            MaterialiseState::OutputsCreated => "OUTPUTS_CREATED",
            MaterialiseState::CandidatePassComplete => "CANDIDATE_PASS_COMPLETE",
            MaterialiseState::CohortPassComplete => "COHORT_PASS_COMPLETE",
            MaterialiseState::PrevalencePassComplete => "PREVALENCE_PASS_COMPLETE",
            MaterialiseState::Committed => "COMMITTED",
        };
        f.write_str(name)
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub old_state: MaterialiseState,
    pub new_state: MaterialiseState,
    pub transitioned_at: DateTime<Utc>,
}

/// Inputs of one materialization run
#[derive(Debug, Clone)]
pub struct MaterialiseOptions {
    pub in_db: PathBuf,
    pub out_db: PathBuf,
    /// Keep each candidate's full report JSON in `candidate_reports`
    pub store_json_reports: bool,
    /// Overrides `cohort.breach_thresholds` from the configuration
    pub breach_thresholds: Option<BreachThresholds>,
}

impl MaterialiseOptions {
    pub fn new(in_db: impl Into<PathBuf>, out_db: impl Into<PathBuf>) -> Self {
        Self {
            in_db: in_db.into(),
            out_db: out_db.into(),
            store_json_reports: false,
            breach_thresholds: None,
        }
    }
}

/// Outcome of a committed run
#[derive(Debug, Clone)]
pub struct MaterialiseSummary {
    pub candidates: usize,
    pub score_rows: usize,
    pub copied_rows: u64,
    pub pattern_rows: usize,
    pub aggregate: CohortAggregate,
    pub prevalence: Prevalence,
    pub transitions: Vec<StateTransition>,
}

/// Drives one materialization run against an immutable configuration
pub struct CohortMaterializer<'a> {
    config: &'a PpdConfig,
    state: MaterialiseState,
    transitions: Vec<StateTransition>,
}

impl<'a> CohortMaterializer<'a> {
    pub fn new(config: &'a PpdConfig) -> Self {
        Self {
            config,
            state: MaterialiseState::Initialized,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> MaterialiseState {
        self.state
    }

    fn transition_to(&mut self, new_state: MaterialiseState) {
        info!("Materialisation: {} → {}", self.state, new_state);
        self.transitions.push(StateTransition {
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        });
        self.state = new_state;
    }

    /// Build the output database; all-or-nothing
    pub async fn run(&mut self, options: &MaterialiseOptions) -> Result<MaterialiseSummary> {
        let staging = db::staging_path(&options.out_db)?;
        check_paths(&options.in_db, &options.out_db, &staging)?;

        let config = self.config;
        let taus = match &options.breach_thresholds {
            Some(taus) => taus,
            None => &config.cohort.breach_thresholds,
        };
        validate_taus(taus)?;

        info!(
            "Materialising {} → {} (store_json_reports={}, {} breach thresholds)",
            options.in_db.display(),
            options.out_db.display(),
            options.store_json_reports,
            taus.len()
        );

        match self.build_staging(options, &staging, taus).await {
            Ok(summary) => {
                if let Err(e) = std::fs::rename(&staging, &options.out_db) {
                    discard_staging(&staging);
                    return Err(e.into());
                }
                self.transition_to(MaterialiseState::Committed);
                info!(
                    "Materialisation complete: {} candidates, {} score rows, {} pattern rows → {}",
                    summary.candidates,
                    summary.score_rows,
                    summary.pattern_rows,
                    options.out_db.display()
                );
                Ok(MaterialiseSummary {
                    transitions: self.transitions.clone(),
                    ..summary
                })
            }
            Err(e) => {
                warn!("Materialisation failed in state {}: {}", self.state, e);
                discard_staging(&staging);
                Err(e)
            }
        }
    }

    /// Populate and commit the staging file; connections are closed on return
    async fn build_staging(
        &mut self,
        options: &MaterialiseOptions,
        staging: &Path,
        taus: &BreachThresholds,
    ) -> Result<MaterialiseSummary> {
        let mut source = SourceDb::open(&options.in_db).await?;
        let mut conn = match db::open_staging(staging).await {
            Ok(conn) => conn,
            Err(e) => {
                source.close().await.ok();
                return Err(e);
            }
        };

        let outcome = self.populate(&mut conn, &mut source, options, taus).await;

        let closed_staging = conn.close().await;
        let closed_source = source.close().await;

        let summary = outcome?;
        closed_staging?;
        closed_source?;
        Ok(summary)
    }

    async fn populate(
        &mut self,
        conn: &mut SqliteConnection,
        source: &mut SourceDb,
        options: &MaterialiseOptions,
        taus: &BreachThresholds,
    ) -> Result<MaterialiseSummary> {
        db::attach_source(conn, &options.in_db).await?;
        let mut tx = conn.begin().await?;

        let mut copied_rows = 0;
        for table in BASE_TABLES {
            copied_rows += db::copy_base_table(&mut tx, table).await?;
        }
        self.transition_to(MaterialiseState::TablesCopied);

        db::create_output_tables(&mut tx, options.store_json_reports).await?;
        db::insert_metadata(&mut tx, &metadata_entries(options)).await?;
        self.transition_to(MaterialiseState::OutputsCreated);

        let candidate_ids = source.candidate_ids().await?;
        let score_rows = source.score_rows().await?;
        let raw_scores = raw_scores_by_candidate(&score_rows)?;

        let analyzer = CandidateAnalyzer::new(self.config);
        let no_scores = ScoreMap::new();
        for (idx, candidate_id) in candidate_ids.iter().enumerate() {
            let scores = raw_scores.get(candidate_id.as_str()).unwrap_or(&no_scores);
            let outputs =
                run_candidate(&analyzer, candidate_id, scores, options.store_json_reports)?;
            db::insert_candidate_outputs(&mut tx, &outputs).await?;
            debug!(
                "Candidate {}/{} analyzed: {} groups, {} pattern rows",
                idx + 1,
                candidate_ids.len(),
                outputs.metrics.len(),
                outputs.patterns.len()
            );
        }
        self.transition_to(MaterialiseState::CandidatePassComplete);

        let aggregate = compute_cohort(&score_rows, &self.config.cohort.group_order, taus)?;
        db::insert_cohort_aggregate(&mut tx, &aggregate).await?;
        debug!(
            "Cohort pass: {} dimensions, {} groups",
            aggregate.dimension_summaries.len(),
            aggregate.group_summaries.len()
        );
        self.transition_to(MaterialiseState::CohortPassComplete);

        let flags = db::fetch_pattern_flags(&mut tx).await?;
        let prevalence = compute_prevalence(&flags);
        db::insert_prevalence(&mut tx, &prevalence).await?;
        self.transition_to(MaterialiseState::PrevalencePassComplete);

        tx.commit().await?;

        Ok(MaterialiseSummary {
            candidates: candidate_ids.len(),
            score_rows: score_rows.len(),
            copied_rows,
            pattern_rows: flags.len(),
            aggregate,
            prevalence,
            transitions: Vec::new(),
        })
    }
}

/// Run one materialization with a fresh materializer
pub async fn materialise_db(
    config: &PpdConfig,
    options: &MaterialiseOptions,
) -> Result<MaterialiseSummary> {
    CohortMaterializer::new(config).run(options).await
}

fn metadata_entries(options: &MaterialiseOptions) -> Vec<(&'static str, String)> {
    let source_name = options
        .in_db
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    vec![
        ("tool", TOOL_NAME.to_string()),
        ("generated_at_utc", utc_timestamp()),
        ("source_db", source_name),
        ("store_json_reports", options.store_json_reports.to_string()),
    ]
}

fn validate_taus(taus: &BreachThresholds) -> Result<()> {
    for (name, value) in taus.iter() {
        if !value.is_finite() {
            return Err(Error::Config(format!(
                "Breach threshold '{}' must be finite, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

/// Refuse runs whose output or staging file would overwrite the input
fn check_paths(in_db: &Path, out_db: &Path, staging: &Path) -> Result<()> {
    let Ok(input) = std::fs::canonicalize(in_db) else {
        // Missing input is reported when the source is opened
        return Ok(());
    };

    for target in [out_db, staging] {
        if let Ok(target) = std::fs::canonicalize(target) {
            if target == input {
                return Err(Error::Config(format!(
                    "Output database must differ from input database: {}",
                    in_db.display()
                )));
            }
        }
    }
    Ok(())
}

fn discard_staging(staging: &Path) {
    if let Err(e) = db::remove_if_exists(staging) {
        warn!("Failed to remove staging database {}: {}", staging.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_materializer_starts_initialized() {
        let config = PpdConfig::default();
        let materializer = CohortMaterializer::new(&config);
        assert_eq!(materializer.state(), MaterialiseState::Initialized);
    }

    #[test]
    fn test_transitions_are_recorded() {
        let config = PpdConfig::default();
        let mut materializer = CohortMaterializer::new(&config);
        materializer.transition_to(MaterialiseState::TablesCopied);
        materializer.transition_to(MaterialiseState::OutputsCreated);

        assert_eq!(materializer.state(), MaterialiseState::OutputsCreated);
        assert_eq!(materializer.transitions.len(), 2);
        assert_eq!(materializer.transitions[0].old_state, MaterialiseState::Initialized);
        assert_eq!(materializer.transitions[1].new_state, MaterialiseState::OutputsCreated);
    }

    #[test]
    fn test_metadata_entries() {
        let mut options = MaterialiseOptions::new("/data/cohort.db", "/data/out.db");
        options.store_json_reports = true;
        let entries = metadata_entries(&options);

        let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["tool", "generated_at_utc", "source_db", "store_json_reports"]);
        assert_eq!(entries[2].1, "cohort.db");
        assert_eq!(entries[3].1, "true");
    }

    #[test]
    fn test_non_finite_tau_rejected() {
        let taus: BreachThresholds = [("tau_low", f64::NAN)].into_iter().collect();
        assert!(matches!(validate_taus(&taus), Err(Error::Config(_))));
    }

    #[test]
    fn test_output_must_differ_from_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cohort.db");
        std::fs::write(&input, b"").unwrap();
        let staging = db::staging_path(&input).unwrap();

        assert!(matches!(
            check_paths(&input, &input, &staging),
            Err(Error::Config(_))
        ));
        assert!(check_paths(&input, &dir.path().join("out.db"), &staging).is_ok());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(MaterialiseState::CandidatePassComplete.to_string(), "CANDIDATE_PASS_COMPLETE");
    }
}
