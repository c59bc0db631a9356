//! SQLite storage for cohort materialization
//!
//! **Source:** opened read-only on its own connection; only the candidate id
//! list and the joined long score view are read from it.
//!
//! **Destination:** a staging file next to the requested output. The source
//! is attached to the staging connection as `src` so base tables can be
//! copied with `INSERT ... SELECT`. All writes go through one transaction on
//! that connection; the staging file is renamed onto the output only after
//! commit.
//!
//! No other module issues SQL.

pub mod copy;
pub mod schema;
pub mod writes;

use crate::aggregate::ScoreRow;
use ppd_common::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, Row, SqliteConnection};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use copy::{copy_base_table, SOURCE_SCHEMA};
pub use schema::create_output_tables;
pub use writes::{
    fetch_pattern_flags, insert_candidate_outputs, insert_cohort_aggregate, insert_metadata,
    insert_prevalence,
};

/// Base relations copied verbatim into the destination
pub const BASE_TABLES: [&str; 3] = ["candidates", "dimensions", "scores"];

/// Read-only handle on the input database
pub struct SourceDb {
    conn: SqliteConnection,
}

impl SourceDb {
    /// Open an existing database read-only
    pub async fn open(path: &Path) -> Result<Self> {
        ensure_exists(path)?;

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);
        let conn = SqliteConnection::connect_with(&options).await?;

        debug!("Opened source database read-only: {}", path.display());
        Ok(Self { conn })
    }

    /// All candidate ids, ascending
    pub async fn candidate_ids(&mut self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT CAST(candidate_id AS TEXT) FROM candidates ORDER BY candidate_id",
        )
        .fetch_all(&mut self.conn)
        .await?;
        Ok(ids)
    }

    /// Joined `scores × dimensions` rows ordered by candidate, group, dimension name
    pub async fn score_rows(&mut self) -> Result<Vec<ScoreRow>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(s.candidate_id AS TEXT) AS candidate_id,
                s.dimension_key,
                CAST(s.raw_score AS REAL) AS raw_score,
                CAST(s.norm_score AS REAL) AS norm_score,
                d.group_key,
                d.dimension_name
            FROM scores s
            JOIN dimensions d ON d.dimension_key = s.dimension_key
            ORDER BY s.candidate_id, d.group_key, d.dimension_name
            "#,
        )
        .fetch_all(&mut self.conn)
        .await?;

        rows.iter()
            .map(|row| -> Result<ScoreRow> {
                Ok(ScoreRow {
                    candidate_id: row.try_get("candidate_id")?,
                    dimension_key: row.try_get("dimension_key")?,
                    raw_score: row.try_get("raw_score")?,
                    norm_score: row.try_get("norm_score")?,
                    group_key: row.try_get("group_key")?,
                    dimension_name: row.try_get("dimension_name")?,
                })
            })
            .collect()
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Staging file path for an output database (`<out>.tmp`)
pub fn staging_path(out_db: &Path) -> Result<PathBuf> {
    let file_name = out_db.file_name().ok_or_else(|| {
        Error::Config(format!("Output database path has no file name: {}", out_db.display()))
    })?;
    let mut staging = file_name.to_os_string();
    staging.push(".tmp");
    Ok(out_db.with_file_name(staging))
}

/// Create a fresh staging database; any stale file at `path` is replaced
pub async fn open_staging(path: &Path) -> Result<SqliteConnection> {
    remove_if_exists(path)?;

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .foreign_keys(true);
    let conn = SqliteConnection::connect_with(&options).await?;

    debug!("Created staging database: {}", path.display());
    Ok(conn)
}

/// Attach the source database to `conn` as [`SOURCE_SCHEMA`]
///
/// Must run outside a transaction. SQLite creates missing files on attach,
/// so the path is checked first.
pub async fn attach_source(conn: &mut SqliteConnection, source: &Path) -> Result<()> {
    ensure_exists(source)?;

    sqlx::query("ATTACH DATABASE ? AS src")
        .bind(source.to_string_lossy().into_owned())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Remove a file, treating "not found" as success
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("Input database not found: {}", path.display()),
    )))
}
