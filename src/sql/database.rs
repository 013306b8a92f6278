use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};

use crate::core::errors::ApiError;
use crate::core::text::clip_chars;

/// Longest string value rendered into results or sample rows.
const MAX_VALUE_CHARS: usize = 300;

/// Read-only handle on the Chinook music-store database.
#[derive(Clone)]
pub struct MusicDatabase {
    pool: SqlitePool,
    db_path: PathBuf,
    sample_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(usize),
}

impl SqlValue {
    /// Literal form used inside result tuples.
    fn literal(&self) -> String {
        match self {
            SqlValue::Null => "None".to_string(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => format_real(*v),
            SqlValue::Text(v) => format!("'{}'", clip_chars(v, MAX_VALUE_CHARS).replace('\'', "\\'")),
            SqlValue::Blob(len) => format!("<{} bytes>", len),
        }
    }

    /// Bare form used in the tab-separated sample rows.
    fn plain(&self) -> String {
        match self {
            SqlValue::Text(v) => clip_chars(v, 100),
            other => other.literal(),
        }
    }
}

fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

impl MusicDatabase {
    pub async fn open(db_path: &Path, sample_rows: usize) -> Result<Self, ApiError> {
        if !db_path.is_file() {
            return Err(ApiError::NotFound(format!(
                "Music database not found at {}",
                db_path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to open music db: {}", e)))?;

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
            sample_rows,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn table_names(&self) -> Result<Vec<String>, ApiError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("name").ok())
            .collect())
    }

    /// Schema description handed to the query-writing prompt: each
    /// table's `CREATE` statement followed by a few sample rows.
    pub async fn table_info(&self) -> Result<String, ApiError> {
        let rows = sqlx::query(
            "SELECT name, sql FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut sections = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name").map_err(ApiError::internal)?;
            let create: String = row.try_get::<Option<String>, _>("sql").ok().flatten().unwrap_or_default();
            let mut section = create.trim().to_string();
            if self.sample_rows > 0 {
                section.push_str("\n\n");
                section.push_str(&self.sample_block(&name).await?);
            }
            sections.push(section);
        }

        Ok(sections.join("\n\n"))
    }

    async fn sample_block(&self, table: &str) -> Result<String, ApiError> {
        let quoted = quote_identifier(table);
        let columns: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", quoted))
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?
            .iter()
            .filter_map(|row| row.try_get::<String, _>("name").ok())
            .collect();

        let rows = sqlx::query(&format!("SELECT * FROM {} LIMIT {}", quoted, self.sample_rows))
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut lines = vec![
            format!("/*\n{} rows from {} table:", self.sample_rows, table),
            columns.join("\t"),
        ];
        for row in &rows {
            let values = row_values(row)?;
            lines.push(
                values
                    .iter()
                    .map(SqlValue::plain)
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }
        lines.push("*/".to_string());
        Ok(lines.join("\n"))
    }

    /// Executes a query and renders all rows as a list of tuples.
    /// Returns an empty string when no rows match.
    pub async fn run(&self, query: &str) -> Result<String, ApiError> {
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        if rows.is_empty() {
            return Ok(String::new());
        }

        let mut tuples = Vec::with_capacity(rows.len());
        for row in &rows {
            let values = row_values(row)?;
            let rendered: Vec<String> = values.iter().map(SqlValue::literal).collect();
            tuples.push(if rendered.len() == 1 {
                format!("({},)", rendered[0])
            } else {
                format!("({})", rendered.join(", "))
            });
        }
        Ok(format!("[{}]", tuples.join(", ")))
    }

}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn row_values(row: &SqliteRow) -> Result<Vec<SqlValue>, ApiError> {
    (0..row.len())
        .map(|idx| {
            let raw = row.try_get_raw(idx).map_err(ApiError::internal)?;
            if raw.is_null() {
                return Ok(SqlValue::Null);
            }
            let type_name = raw.type_info().name().to_ascii_uppercase();
            let value = match type_name.as_str() {
                "INTEGER" => SqlValue::Integer(row.try_get_unchecked(idx).map_err(ApiError::internal)?),
                "REAL" => SqlValue::Real(row.try_get_unchecked(idx).map_err(ApiError::internal)?),
                "BLOB" => SqlValue::Blob(
                    row.try_get_unchecked::<Vec<u8>, _>(idx)
                        .map_err(ApiError::internal)?
                        .len(),
                ),
                _ => SqlValue::Text(row.try_get_unchecked(idx).map_err(ApiError::internal)?),
            };
            Ok(value)
        })
        .collect()
}

/// Rejects anything but a single `SELECT` (or `WITH ... SELECT`) statement.
/// Comments are ignored; `;` inside quotes does not split statements.
pub fn ensure_read_only(query: &str) -> Result<(), String> {
    let statements = split_statements(query);
    let statement = match statements.as_slice() {
        [] => return Err("empty query".to_string()),
        [single] => single,
        _ => return Err("only a single statement is allowed".to_string()),
    };
    let first_word = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if first_word != "select" && first_word != "with" {
        return Err(format!("only SELECT queries are allowed, got {}", first_word.to_uppercase()));
    }
    Ok(())
}

/// Splits SQL on top-level `;`, dropping `--` and `/* */` comments and
/// empty statements. Quoted text (`'`, `"`, `` ` ``, `[...]`) is kept intact.
fn split_statements(query: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                current.push(c);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == close {
                        // doubled quote is an escaped quote
                        if close != ']' && chars.peek() == Some(&close) {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                            continue;
                        }
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                current.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
                current.push(' ');
            }
            ';' => statements.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|statement| statement.trim().to_string())
        .filter(|statement| !statement.is_empty())
        .collect()
}
