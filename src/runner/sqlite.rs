//! SQLite executor for SQL artifacts.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;

use super::{ArtifactRunner, ExecutionResult, Table};
use crate::extract::strip_code_fence;
use crate::refine::Artifact;

/// Maximum rows kept from a single query.
const MAX_ROWS: usize = 500;

/// Runs SQL artifacts against a SQLite database file.
pub struct SqliteRunner {
    db_path: PathBuf,
}

impl SqliteRunner {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl ArtifactRunner for SqliteRunner {
    async fn run(&self, artifact: &Artifact) -> ExecutionResult {
        let db_path = self.db_path.clone();
        let sql = strip_code_fence(&artifact.text).to_string();
        tracing::debug!(version = artifact.version, "Executing SQL artifact");

        let outcome = tokio::task::spawn_blocking(move || execute_sql(&db_path, &sql)).await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ExecutionResult::Failed(e.to_string()),
            Err(e) => ExecutionResult::Failed(format!("SQL worker panicked: {}", e)),
        }
    }
}

/// Open a database that must already exist.
fn open_existing(db_path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

fn execute_sql(db_path: &Path, sql: &str) -> rusqlite::Result<ExecutionResult> {
    let conn = open_existing(db_path)?;
    let mut stmt = conn.prepare(sql)?;

    if stmt.column_count() == 0 {
        let changed = stmt.execute([])?;
        return Ok(ExecutionResult::Output(format!("{} row(s) affected", changed)));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        if rows.len() >= MAX_ROWS {
            break;
        }
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(to_json(row.get_ref(i)?));
        }
        rows.push(cells);
    }

    Ok(ExecutionResult::Table(Table { columns, rows }))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} byte blob>", bytes.len())),
    }
}

/// Describe every user table as `Table name: x` followed by
/// `column (TYPE)` lines.
pub fn describe_schema(db_path: &Path) -> anyhow::Result<String> {
    let conn = open_existing(db_path)
        .with_context(|| format!("cannot open database {}", db_path.display()))?;

    let mut tables_stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let tables: Vec<String> = tables_stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut sections = Vec::with_capacity(tables.len());
    for table in tables {
        let mut info = conn.prepare(&format!(
            "PRAGMA table_info(\"{}\")",
            table.replace('"', "\"\"")
        ))?;
        let columns: Vec<String> = info
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let ty: String = row.get(2)?;
                Ok(format!("{} ({})", name, ty))
            })?
            .collect::<rusqlite::Result<_>>()?;

        sections.push(format!("Table name: {}\n{}", table, columns.join("\n")));
    }

    Ok(sections.join("\n\n"))
}


#[cfg(test)]
mod tests {
    use super::fixtures::transactions_db;
    use super::*;
    use crate::refine::ArtifactKind;
    use serde_json::json;

    #[tokio::test]
    async fn select_returns_table() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SqliteRunner::new(transactions_db(dir.path()));
        let artifact = Artifact::first(
            ArtifactKind::Sql,
            "```sql\nSELECT color, SUM(qty_delta * unit_price) AS revenue FROM transactions \
             WHERE action = 'sale' GROUP BY color ORDER BY revenue DESC;\n```",
        );

        let ExecutionResult::Table(table) = runner.run(&artifact).await else {
            panic!("expected a table");
        };
        assert_eq!(table.columns, vec!["color", "revenue"]);
        assert_eq!(table.rows[0], vec![json!("blue"), json!(50.0)]);
        assert_eq!(table.rows[1], vec![json!("red"), json!(30.0)]);
    }

    #[tokio::test]
    async fn bad_sql_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SqliteRunner::new(transactions_db(dir.path()));
        let artifact = Artifact::first(ArtifactKind::Sql, "SELECT colour FROM transactions");

        let result = runner.run(&artifact).await;
        assert!(matches!(result, ExecutionResult::Failed(ref e) if e.contains("colour")));
    }

    #[tokio::test]
    async fn statements_report_affected_rows() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SqliteRunner::new(transactions_db(dir.path()));
        let artifact = Artifact::first(
            ArtifactKind::Sql,
            "UPDATE transactions SET unit_price = 12.0 WHERE color = 'red'",
        );

        assert_eq!(
            runner.run(&artifact).await,
            ExecutionResult::Output("2 row(s) affected".to_string())
        );
    }

    #[test]
    fn schema_lists_tables_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let schema = describe_schema(&transactions_db(dir.path())).unwrap();
        assert!(schema.starts_with("Table name: transactions\nid (INTEGER)\n"));
        assert!(schema.contains("unit_price (REAL)"));
    }

    #[tokio::test]
    async fn missing_database_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.db");
        let runner = SqliteRunner::new(&path);

        let result = runner
            .run(&Artifact::first(ArtifactKind::Sql, "SELECT 1"))
            .await;
        assert!(matches!(result, ExecutionResult::Failed(_)));

        let err = describe_schema(&path).unwrap_err();
        assert!(err.to_string().contains("typo.db"));
        assert!(!path.exists());
    }
}
