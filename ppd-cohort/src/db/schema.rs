//! Output table definitions for the materialised database

use ppd_common::Result;
use sqlx::SqliteConnection;

const CREATE_METADATA: &str = r#"
CREATE TABLE db_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

const CREATE_CANDIDATE_REPORTS: &str = r#"
CREATE TABLE candidate_reports (
    candidate_id TEXT PRIMARY KEY,
    generated_at_utc TEXT NOT NULL,
    report_json TEXT NOT NULL,
    FOREIGN KEY (candidate_id) REFERENCES candidates(candidate_id)
)
"#;

const CANDIDATE_TABLES: [&str; 4] = [
    r#"
    CREATE TABLE candidate_group_metrics (
        candidate_id TEXT NOT NULL,
        group_key TEXT NOT NULL,
        mean REAL,
        std_pop REAL,
        min REAL,
        max REAL,
        range REAL,
        n_dimensions INTEGER,
        min_dimensions_json TEXT,
        max_dimensions_json TEXT,
        PRIMARY KEY (candidate_id, group_key),
        FOREIGN KEY (candidate_id) REFERENCES candidates(candidate_id)
    )
    "#,
    r#"
    CREATE TABLE candidate_group_patterns (
        candidate_id TEXT NOT NULL,
        group_key TEXT NOT NULL,
        balanced INTEGER,
        bottlenecked INTEGER,
        polarised INTEGER,
        noisy INTEGER,
        uniform_low INTEGER,
        uniform_high INTEGER,
        bottleneck_dimension TEXT,
        bottleneck_value REAL,
        bottleneck_dimensions_json TEXT,
        PRIMARY KEY (candidate_id, group_key),
        FOREIGN KEY (candidate_id) REFERENCES candidates(candidate_id)
    )
    "#,
    "CREATE INDEX idx_cgm_group ON candidate_group_metrics(group_key)",
    "CREATE INDEX idx_cgp_group ON candidate_group_patterns(group_key)",
];

const COHORT_TABLES: [&str; 9] = [
    r#"
    CREATE TABLE cohort_dimension_summary (
        dimension_key TEXT PRIMARY KEY,
        mean REAL, median REAL, std REAL, iqr REAL, min REAL, max REAL,
        p10 REAL, p25 REAL, p50 REAL, p75 REAL, p90 REAL
    )
    "#,
    r#"
    CREATE TABLE cohort_candidate_dimension_percentiles (
        candidate_id TEXT NOT NULL,
        dimension_key TEXT NOT NULL,
        raw_score REAL NOT NULL,
        norm_score REAL NOT NULL,
        percentile_rank REAL NOT NULL,
        PRIMARY KEY (candidate_id, dimension_key),
        FOREIGN KEY (candidate_id) REFERENCES candidates(candidate_id),
        FOREIGN KEY (dimension_key) REFERENCES dimensions(dimension_key)
    )
    "#,
    r#"
    CREATE TABLE cohort_candidate_group_scores (
        candidate_id TEXT NOT NULL,
        group_key TEXT NOT NULL,
        group_score_norm REAL NOT NULL,
        PRIMARY KEY (candidate_id, group_key),
        FOREIGN KEY (candidate_id) REFERENCES candidates(candidate_id)
    )
    "#,
    r#"
    CREATE TABLE cohort_group_summary (
        group_key TEXT PRIMARY KEY,
        mean REAL, median REAL, std REAL, iqr REAL, min REAL, max REAL,
        p10 REAL, p25 REAL, p50 REAL, p75 REAL, p90 REAL
    )
    "#,
    r#"
    CREATE TABLE cohort_candidate_group_percentiles (
        candidate_id TEXT NOT NULL,
        group_key TEXT NOT NULL,
        group_score_norm REAL NOT NULL,
        percentile_rank REAL NOT NULL,
        PRIMARY KEY (candidate_id, group_key),
        FOREIGN KEY (candidate_id) REFERENCES candidates(candidate_id)
    )
    "#,
    r#"
    CREATE TABLE cohort_dimension_breach_rates (
        dimension_key TEXT NOT NULL,
        tau_name TEXT NOT NULL,
        tau_value REAL NOT NULL,
        breach_rate REAL NOT NULL,
        PRIMARY KEY (dimension_key, tau_name),
        FOREIGN KEY (dimension_key) REFERENCES dimensions(dimension_key)
    )
    "#,
    r#"
    CREATE TABLE cohort_group_breach_rates (
        group_key TEXT NOT NULL,
        tau_name TEXT NOT NULL,
        tau_value REAL NOT NULL,
        breach_rate REAL NOT NULL,
        PRIMARY KEY (group_key, tau_name)
    )
    "#,
    r#"
    CREATE TABLE cohort_pattern_prevalence_overall (
        pattern_label TEXT PRIMARY KEY,
        count INTEGER NOT NULL,
        proportion REAL NOT NULL
    )
    "#,
    r#"
    CREATE TABLE cohort_pattern_prevalence_by_group (
        group_key TEXT NOT NULL,
        pattern_label TEXT NOT NULL,
        count INTEGER NOT NULL,
        proportion REAL NOT NULL,
        PRIMARY KEY (group_key, pattern_label)
    )
    "#,
];

/// Create every output table (the report table only when requested)
pub async fn create_output_tables(
    conn: &mut SqliteConnection,
    store_json_reports: bool,
) -> Result<()> {
    sqlx::query(CREATE_METADATA).execute(&mut *conn).await?;

    if store_json_reports {
        sqlx::query(CREATE_CANDIDATE_REPORTS).execute(&mut *conn).await?;
    }

    for statement in CANDIDATE_TABLES.iter().chain(COHORT_TABLES.iter()) {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    Ok(())
}
