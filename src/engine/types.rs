//! Query outcome types.
//!
//! Defines what an engine hands back for a statement: a result set with its
//! classification and timings, or a positioned failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Rows requested per execution when the configuration says nothing.
pub const DEFAULT_ROW_LIMIT: usize = 1000;

/// Options passed along with every execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteOptions {
    /// Maximum number of rows to bring back.
    pub limit: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ROW_LIMIT,
        }
    }
}

/// Whether a statement produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Schema or data modification without rows (CREATE, INSERT, ...).
    Ddl,
    /// A query returning rows.
    Dql,
}

/// Server-side timing breakdown for a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    /// Time until the engine finished executing the statement.
    #[serde(with = "duration_serde")]
    pub execute: Duration,

    /// Time spent materializing rows.
    #[serde(with = "duration_serde")]
    pub fetch: Duration,
}

impl Timings {
    pub fn total(&self) -> Duration {
        self.execute + self.fetch
    }
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "execute {:.2?}, fetch {:.2?}, total {:.2?}",
            self.execute,
            self.fetch,
            self.total()
        )
    }
}

/// The successful result of executing a statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The statement text as the engine received it.
    pub query: String,

    pub kind: ResultKind,

    /// Column metadata for the result set (empty for DDL).
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,

    /// Rows of data, at most `ExecuteOptions::limit` of them.
    #[serde(default)]
    pub rows: Vec<Row>,

    /// Number of rows the statement produced before the limit was applied.
    pub row_count: usize,

    /// Whether rows were dropped to honour the limit.
    #[serde(default)]
    pub was_truncated: bool,

    pub timings: Option<Timings>,
}

impl QueryResult {
    /// Creates a result for a statement that returns no rows.
    pub fn ddl(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kind: ResultKind::Ddl,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            was_truncated: false,
            timings: None,
        }
    }

    /// Creates a result set with the given columns and rows.
    pub fn dql(query: impl Into<String>, columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self {
            query: query.into(),
            kind: ResultKind::Dql,
            columns,
            rows,
            row_count,
            was_truncated: false,
            timings: None,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = Some(timings);
        self
    }

    /// Keeps at most `limit` rows, remembering whether any were dropped.
    pub fn truncated_to(mut self, limit: usize) -> Self {
        if self.rows.len() > limit {
            self.rows.truncate(limit);
            self.was_truncated = true;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A statement rejected by the engine.
///
/// `offset` is a 0-indexed character offset into the exact text that was
/// sent for execution.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct EngineFailure {
    pub message: String,
    pub offset: usize,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    /// A failure with no usable position; anchors at the statement start.
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self::new(message, 0)
    }
}

/// How a single execution settled.
pub type ExecutionOutcome = std::result::Result<QueryResult, EngineFailure>;

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// Represents a single value from a query result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Serde support for Duration (not natively supported by serde).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Stored as u64 nanoseconds
        (duration.as_nanos() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
