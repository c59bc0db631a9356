//! Bulk inserts of output row sets and read-back of persisted pattern flags

use crate::aggregate::{BreachRateRow, CohortAggregate, SummaryRow};
use crate::candidate_pass::CandidateOutputs;
use crate::prevalence::{PatternFlagRow, Prevalence};
use ppd_common::Result;
use sqlx::{Row, SqliteConnection};

/// Write `db_metadata` key/value pairs
pub async fn insert_metadata(
    conn: &mut SqliteConnection,
    entries: &[(&str, String)],
) -> Result<()> {
    for (key, value) in entries {
        sqlx::query("INSERT OR REPLACE INTO db_metadata (key, value) VALUES (?, ?)")
            .bind(*key)
            .bind(value)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Write one candidate's report, metric rows and pattern rows
pub async fn insert_candidate_outputs(
    conn: &mut SqliteConnection,
    outputs: &CandidateOutputs,
) -> Result<()> {
    if let Some(report) = &outputs.report {
        sqlx::query(
            "INSERT INTO candidate_reports (candidate_id, generated_at_utc, report_json) VALUES (?, ?, ?)",
        )
        .bind(&report.candidate_id)
        .bind(&report.generated_at_utc)
        .bind(&report.report_json)
        .execute(&mut *conn)
        .await?;
    }

    for row in &outputs.metrics {
        let m = &row.metrics;
        sqlx::query(
            r#"
            INSERT INTO candidate_group_metrics (
                candidate_id, group_key,
                mean, std_pop, min, max, range, n_dimensions,
                min_dimensions_json, max_dimensions_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.candidate_id)
        .bind(&row.group_key)
        .bind(m.mean)
        .bind(m.std_pop)
        .bind(m.min)
        .bind(m.max)
        .bind(m.range)
        .bind(m.n_dimensions as i64)
        .bind(serde_json::to_string(&m.min_dimensions)?)
        .bind(serde_json::to_string(&m.max_dimensions)?)
        .execute(&mut *conn)
        .await?;
    }

    for row in &outputs.patterns {
        let p = &row.flags;
        sqlx::query(
            r#"
            INSERT INTO candidate_group_patterns (
                candidate_id, group_key,
                balanced, bottlenecked, polarised, noisy, uniform_low, uniform_high,
                bottleneck_dimension, bottleneck_value, bottleneck_dimensions_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.candidate_id)
        .bind(&row.group_key)
        .bind(p.balanced)
        .bind(p.bottlenecked)
        .bind(p.polarised)
        .bind(p.noisy)
        .bind(p.uniform_low)
        .bind(p.uniform_high)
        .bind(p.bottleneck_dimension.as_ref().map(|d| d.to_string()))
        .bind(p.bottleneck_value)
        .bind(serde_json::to_string(&p.bottleneck_dimensions)?)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Write every cohort row set
pub async fn insert_cohort_aggregate(
    conn: &mut SqliteConnection,
    aggregate: &CohortAggregate,
) -> Result<()> {
    insert_summaries(
        conn,
        "cohort_dimension_summary",
        "dimension_key",
        &aggregate.dimension_summaries,
    )
    .await?;
    insert_summaries(conn, "cohort_group_summary", "group_key", &aggregate.group_summaries).await?;

    for row in &aggregate.dimension_percentiles {
        sqlx::query(
            r#"
            INSERT INTO cohort_candidate_dimension_percentiles
                (candidate_id, dimension_key, raw_score, norm_score, percentile_rank)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.candidate_id)
        .bind(&row.dimension_key)
        .bind(row.raw_score)
        .bind(row.norm_score)
        .bind(row.percentile_rank)
        .execute(&mut *conn)
        .await?;
    }

    for row in &aggregate.group_scores {
        sqlx::query(
            "INSERT INTO cohort_candidate_group_scores (candidate_id, group_key, group_score_norm) VALUES (?, ?, ?)",
        )
        .bind(&row.candidate_id)
        .bind(&row.group_key)
        .bind(row.group_score_norm)
        .execute(&mut *conn)
        .await?;
    }

    for row in &aggregate.group_percentiles {
        sqlx::query(
            r#"
            INSERT INTO cohort_candidate_group_percentiles
                (candidate_id, group_key, group_score_norm, percentile_rank)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&row.candidate_id)
        .bind(&row.group_key)
        .bind(row.group_score_norm)
        .bind(row.percentile_rank)
        .execute(&mut *conn)
        .await?;
    }

    insert_breach_rates(
        conn,
        "cohort_dimension_breach_rates",
        "dimension_key",
        &aggregate.dimension_breach_rates,
    )
    .await?;
    insert_breach_rates(
        conn,
        "cohort_group_breach_rates",
        "group_key",
        &aggregate.group_breach_rates,
    )
    .await?;

    Ok(())
}

/// Write overall and per-group prevalence rows
pub async fn insert_prevalence(conn: &mut SqliteConnection, prevalence: &Prevalence) -> Result<()> {
    for row in &prevalence.overall {
        sqlx::query(
            "INSERT INTO cohort_pattern_prevalence_overall (pattern_label, count, proportion) VALUES (?, ?, ?)",
        )
        .bind(row.pattern_label.as_str())
        .bind(row.count)
        .bind(row.proportion)
        .execute(&mut *conn)
        .await?;
    }

    for row in &prevalence.by_group {
        sqlx::query(
            r#"
            INSERT INTO cohort_pattern_prevalence_by_group
                (group_key, pattern_label, count, proportion)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&row.group_key)
        .bind(row.pattern_label.as_str())
        .bind(row.count)
        .bind(row.proportion)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Persisted pattern flags, in insertion order
pub async fn fetch_pattern_flags(conn: &mut SqliteConnection) -> Result<Vec<PatternFlagRow>> {
    let rows = sqlx::query(
        r#"
        SELECT group_key, balanced, bottlenecked, polarised, noisy, uniform_low, uniform_high
        FROM candidate_group_patterns
        ORDER BY rowid
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<PatternFlagRow> {
            Ok(PatternFlagRow {
                group_key: row.try_get("group_key")?,
                balanced: row.try_get("balanced")?,
                bottlenecked: row.try_get("bottlenecked")?,
                polarised: row.try_get("polarised")?,
                noisy: row.try_get("noisy")?,
                uniform_low: row.try_get("uniform_low")?,
                uniform_high: row.try_get("uniform_high")?,
            })
        })
        .collect()
}

async fn insert_summaries(
    conn: &mut SqliteConnection,
    table: &str,
    key_column: &str,
    rows: &[SummaryRow],
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} ({}, mean, median, std, iqr, min, max, p10, p25, p50, p75, p90) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        table, key_column
    );

    for row in rows {
        let s = &row.stats;
        sqlx::query(&sql)
            .bind(&row.key)
            .bind(s.mean)
            .bind(s.median)
            .bind(s.std)
            .bind(s.iqr)
            .bind(s.min)
            .bind(s.max)
            .bind(s.p10)
            .bind(s.p25)
            .bind(s.p50)
            .bind(s.p75)
            .bind(s.p90)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_breach_rates(
    conn: &mut SqliteConnection,
    table: &str,
    key_column: &str,
    rows: &[BreachRateRow],
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} ({}, tau_name, tau_value, breach_rate) VALUES (?, ?, ?, ?)",
        table, key_column
    );

    for row in rows {
        sqlx::query(&sql)
            .bind(&row.key)
            .bind(&row.tau_name)
            .bind(row.tau_value)
            .bind(row.breach_rate)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
