//! Query engine abstraction.
//!
//! Provides a trait-based interface for statement execution, so the session
//! can run against PostgreSQL, a scripted mock, or anything an embedding UI
//! plugs in.

mod mock;
mod postgres;
mod types;

pub use mock::{MockQueryEngine, ScriptedResponse};
pub use postgres::{PostgresEngine, DEFAULT_STATEMENT_TIMEOUT_SECS};
pub use types::{
    ColumnInfo, EngineFailure, ExecuteOptions, ExecutionOutcome, QueryResult, ResultKind, Row,
    Timings, Value, DEFAULT_ROW_LIMIT,
};

use crate::config::{ConnectionConfig, ExecutionConfig};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait defining the interface for query engines.
///
/// `execute` is one-shot. Aborting an execution means dropping its future;
/// implementations must not produce side effects visible to the session after
/// that.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Executes a single statement exactly as given.
    async fn execute(&self, query: &str, options: ExecuteOptions) -> ExecutionOutcome;

    /// Releases engine resources.
    async fn close(&self) -> Result<()>;
}

/// Connects to the engine described by `config`.
///
/// This is the central factory function for engine connections.
pub async fn connect(
    config: &ConnectionConfig,
    execution: &ExecutionConfig,
) -> Result<Arc<dyn QueryEngine>> {
    let engine =
        PostgresEngine::connect(config, Duration::from_secs(execution.statement_timeout_secs))
            .await?;
    Ok(Arc::new(engine))
}
