//! PostgreSQL engine implementation.
//!
//! Provides the `PostgresEngine` struct that implements the `QueryEngine`
//! trait for PostgreSQL using sqlx. Server error positions are translated
//! into flat offsets so the session can anchor markers in the editor.

use super::{
    ColumnInfo, EngineFailure, ExecuteOptions, ExecutionOutcome, QueryEngine, QueryResult, Row,
    Timings, Value,
};
use crate::config::ConnectionConfig;
use crate::error::{PaneError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgDatabaseError, PgErrorPosition, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default statement timeout in seconds.
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Extra time the client waits past the server-side timeout before giving up.
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Leading keywords of statements that produce a result set.
const ROW_RETURNING_KEYWORDS: &[&str] = &["SELECT", "WITH", "SHOW", "VALUES", "TABLE", "EXPLAIN"];

/// PostgreSQL query engine.
///
/// Every pooled connection runs with `statement_timeout` set, so the server
/// cancels long statements itself. The client stops waiting shortly after.
#[derive(Debug)]
pub struct PostgresEngine {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PostgresEngine {
    /// Creates an engine from an existing connection pool whose connections
    /// already carry `statement_timeout`.
    pub fn from_pool(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Connects with retry and exponential backoff on transient errors.
    pub async fn connect(config: &ConnectionConfig, statement_timeout: Duration) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(10))
                .after_connect(move |conn, _meta| {
                    let sql = statement_timeout_sql(statement_timeout);
                    Box::pin(async move {
                        conn.execute(sql.as_str()).await?;
                        Ok(())
                    })
                })
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Successfully connected to engine");
                    return Ok(Self::from_pool(pool, statement_timeout));
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(error) => map_connection_error(error, config),
            None => PaneError::connection("No connection attempt was made"),
        })
    }
}

#[async_trait]
impl QueryEngine for PostgresEngine {
    async fn execute(&self, query: &str, options: ExecuteOptions) -> ExecutionOutcome {
        let start = Instant::now();

        let fetched = tokio::time::timeout(
            self.statement_timeout + CLIENT_TIMEOUT_GRACE,
            sqlx::query(query).fetch_all(&self.pool),
        )
        .await
        .map_err(|_| {
            EngineFailure::unpositioned(format!(
                "Query timed out after {} seconds",
                self.statement_timeout.as_secs()
            ))
        })?
        .map_err(to_engine_failure)?;

        let execute = start.elapsed();
        let fetch_start = Instant::now();

        let result = match fetched.first() {
            Some(first_row) => {
                let columns = first_row
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect();
                let row_count = fetched.len();
                if row_count > options.limit {
                    warn!(
                        "Query returned {} rows, truncating to {} rows",
                        row_count, options.limit
                    );
                }
                let rows: Vec<Row> = fetched.iter().take(options.limit).map(convert_row).collect();
                let mut result = QueryResult::dql(query, columns, rows);
                result.row_count = row_count;
                result.was_truncated = row_count > options.limit;
                result
            }
            None if returns_rows(query) => QueryResult::dql(query, Vec::new(), Vec::new()),
            None => QueryResult::ddl(query),
        };

        Ok(result.with_timings(Timings {
            execute,
            fetch: fetch_start.elapsed(),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Session setting applied to every new connection.
fn statement_timeout_sql(timeout: Duration) -> String {
    format!("SET statement_timeout = {}", timeout.as_millis())
}

/// Classifies an empty result by the statement's leading keyword.
fn returns_rows(query: &str) -> bool {
    let keyword: String = query
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    ROW_RETURNING_KEYWORDS.contains(&keyword.as_str())
}

/// Converts a sqlx error into a positioned engine failure.
///
/// PostgreSQL reports `position` as a 1-based character index into the
/// submitted text; anything else anchors at the statement start.
fn to_engine_failure(error: sqlx::Error) -> EngineFailure {
    let offset = error
        .as_database_error()
        .and_then(|db_error| db_error.try_downcast_ref::<PgDatabaseError>())
        .and_then(|pg_error| match pg_error.position() {
            Some(PgErrorPosition::Original(position)) => Some(position.saturating_sub(1)),
            _ => None,
        })
        .unwrap_or(0);

    EngineFailure::new(format_query_error(&error), offset)
}

/// Formats a query error with detail and hint when available.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Determines if a connection error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    [
        "connection refused",
        "timed out",
        "timeout",
        "temporarily unavailable",
        "connection reset",
        "broken pipe",
    ]
    .iter()
    .any(|needle| error_str.contains(needle))
}

/// Maps sqlx connection errors to user-facing messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> PaneError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        PaneError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("authentication failed") {
        PaneError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        PaneError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        PaneError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        PaneError::connection(error.to_string())
    }
}
