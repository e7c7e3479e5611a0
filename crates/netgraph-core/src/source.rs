//! Tabular input.
//!
//! The validator reads its arcs through [`TabularSource`], which knows how
//! to list tables and columns and stream selected columns row by row.
//! [`SqliteTable`] is the rusqlite implementation.

use std::fmt;

use rusqlite::Connection;
use rusqlite::types::Value;
use serde::Serialize;
use thiserror::Error;

/// Storage class of one scanned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueKind {
    Null,
    Integer,
    Float,
    Text,
    Blob,
}

impl ValueKind {
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(_) => Self::Integer,
            Value::Real(_) => Self::Float,
            Value::Text(_) => Self::Text,
            Value::Blob(_) => Self::Blob,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "NULL",
            Self::Integer => "INTEGER",
            Self::Float => "DOUBLE",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        })
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("scan aborted: {0}")]
    Aborted(String),
}

/// A column projection over one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub table: String,
    pub columns: Vec<String>,
    /// Prepend the row identifier as value 0.
    pub with_row_id: bool,
}

impl ScanRequest {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            with_row_id: false,
        }
    }

    #[must_use]
    pub const fn with_row_id(mut self) -> Self {
        self.with_row_id = true;
        self
    }

    /// Append a column and return its position in each scanned row.
    pub fn push(&mut self, column: impl Into<String>) -> usize {
        self.columns.push(column.into());
        self.columns.len() - 1 + usize::from(self.with_row_id)
    }
}

/// Read access to a table of arcs.
pub trait TabularSource {
    /// Whether `table` exists, matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn table_exists(&self, table: &str) -> Result<bool, SourceError>;

    /// Column names of `table` in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn column_names(&self, table: &str) -> Result<Vec<String>, SourceError>;

    /// Stream the projection `request`, calling `visit` once per row.
    ///
    /// Returns the number of rows visited.
    ///
    /// # Errors
    ///
    /// Returns the first error from the backend or from `visit`.
    fn scan(
        &self,
        request: &ScanRequest,
        visit: &mut dyn FnMut(&[Value]) -> Result<(), SourceError>,
    ) -> Result<u64, SourceError>;
}

/// A [`TabularSource`] over a rusqlite connection.
#[derive(Debug, Clone, Copy)]
pub struct SqliteTable<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteTable<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

/// Quote an SQL identifier.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl TabularSource for SqliteTable<'_> {
    fn table_exists(&self, table: &str) -> Result<bool, SourceError> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master \
             WHERE type = 'table' AND Upper(tbl_name) = Upper(?1)",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn column_names(&self, table: &str) -> Result<Vec<String>, SourceError> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn scan(
        &self,
        request: &ScanRequest,
        visit: &mut dyn FnMut(&[Value]) -> Result<(), SourceError>,
    ) -> Result<u64, SourceError> {
        let mut projection: Vec<String> = Vec::with_capacity(request.columns.len() + 1);
        if request.with_row_id {
            projection.push("ROWID".to_string());
        }
        projection.extend(request.columns.iter().map(|c| quote_ident(c)));
        let sql = format!(
            "SELECT {} FROM {}",
            projection.join(", "),
            quote_ident(&request.table)
        );
        tracing::trace!(%sql, "scan");

        let mut stmt = self.conn.prepare(&sql)?;
        let width = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut values = Vec::with_capacity(width);
        let mut visited = 0u64;
        while let Some(row) = rows.next()? {
            values.clear();
            for i in 0..width {
                values.push(row.get::<_, Value>(i)?);
            }
            visit(&values)?;
            visited += 1;
        }
        Ok(visited)
    }
}
