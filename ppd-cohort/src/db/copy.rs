//! Verbatim copy of base tables from the attached source database
//!
//! The source is attached to the destination connection as schema `src`.
//! The table's `CREATE TABLE` statement is replayed in `main`, then rows are
//! copied with a single `INSERT ... SELECT`. Hidden and generated columns are
//! skipped; SQLite recomputes generated columns on insert.

use ppd_common::{Error, Result};
use sqlx::SqliteConnection;
use tracing::debug;

/// Schema name the source database is attached under
pub const SOURCE_SCHEMA: &str = "src";

/// Copy schema and rows of `table`; returns the number of rows copied
pub async fn copy_base_table(conn: &mut SqliteConnection, table: &str) -> Result<u64> {
    let create_sql: Option<String> = sqlx::query_scalar::<_, Option<String>>(
        "SELECT sql FROM src.sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(table)
    .fetch_optional(&mut *conn)
    .await?
    .flatten();

    let create_sql = create_sql.ok_or_else(|| {
        Error::SchemaViolation(format!("Table not found in source database: {}", table))
    })?;

    sqlx::query(&create_sql).execute(&mut *conn).await?;

    let columns: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM pragma_table_xinfo(?, 'src') WHERE hidden = 0 ORDER BY cid",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    if columns.is_empty() {
        return Ok(0);
    }

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let quoted_table = quote_ident(table);

    let copy_sql = format!(
        "INSERT INTO main.{table} ({cols}) SELECT {cols} FROM {schema}.{table}",
        table = quoted_table,
        cols = column_list,
        schema = SOURCE_SCHEMA,
    );

    let copied = sqlx::query(&copy_sql)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    debug!("Copied {} rows of {} ({} columns)", copied, table, columns.len());
    Ok(copied)
}

/// Quote an SQL identifier, doubling embedded quotes
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
