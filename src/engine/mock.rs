//! Mock query engine for testing.
//!
//! Returns scripted outcomes keyed by statement text and records what it was
//! asked to run. A gated engine holds every execution until it is released,
//! which lets tests observe the session while a statement is in flight.

use super::{
    ColumnInfo, EngineFailure, ExecuteOptions, ExecutionOutcome, QueryEngine, QueryResult, Row,
    Timings, Value,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// A canned outcome for one statement.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// A result set.
    Rows { columns: Vec<ColumnInfo>, rows: Vec<Row> },
    /// A statement without a result set.
    Ddl,
    /// An engine rejection at `offset`.
    Fail { message: String, offset: usize },
}

impl ScriptedResponse {
    pub fn fail(message: impl Into<String>, offset: usize) -> Self {
        Self::Fail {
            message: message.into(),
            offset,
        }
    }
}

/// Decrements the in-flight counter even when the execution is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A mock engine that returns predefined results.
#[derive(Debug, Default)]
pub struct MockQueryEngine {
    responses: Mutex<HashMap<String, ScriptedResponse>>,
    executed: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl MockQueryEngine {
    /// Creates an engine that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine whose executions wait for [`MockQueryEngine::release`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Scripts the outcome for an exact statement text.
    pub fn respond_to(self, query: impl Into<String>, response: ScriptedResponse) -> Self {
        lock(&self.responses).insert(query.into(), response);
        self
    }

    /// Lets one waiting (or the next) execution proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Statements received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    /// Number of executions currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous executions ever observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of executions that produced an outcome.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn default_response(query: &str) -> ScriptedResponse {
        let upper = query.trim_start().to_uppercase();
        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            ScriptedResponse::Rows {
                columns: vec![ColumnInfo::new("result", "text")],
                rows: vec![vec![Value::String(format!("Mock result for: {query}"))]],
            }
        } else {
            ScriptedResponse::Ddl
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl QueryEngine for MockQueryEngine {
    async fn execute(&self, query: &str, options: ExecuteOptions) -> ExecutionOutcome {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        lock(&self.executed).push(query.to_string());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let started = Instant::now();
        let response = lock(&self.responses)
            .get(query)
            .cloned()
            .unwrap_or_else(|| Self::default_response(query));

        let outcome = match response {
            ScriptedResponse::Rows { columns, rows } => Ok(QueryResult::dql(query, columns, rows)
                .truncated_to(options.limit)
                .with_timings(Timings {
                    execute: started.elapsed(),
                    fetch: Duration::ZERO,
                })),
            ScriptedResponse::Ddl => Ok(QueryResult::ddl(query)),
            ScriptedResponse::Fail { message, offset } => Err(EngineFailure::new(message, offset)),
        };

        self.completed.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
