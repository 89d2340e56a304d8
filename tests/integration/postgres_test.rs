//! Session runs against a live PostgreSQL server.

use super::common::TestSession;
use pretty_assertions::assert_eq;
use query_pane::config::{ConnectionConfig, ExecutionConfig};
use query_pane::editor::{BufferEditor, Position};
use query_pane::engine::{self, QueryEngine, ResultKind};
use query_pane::session::SessionEvent;
use std::sync::Arc;

/// Helper to connect an engine from DATABASE_URL.
async fn get_test_engine() -> Option<Arc<dyn QueryEngine>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    engine::connect(&config, &ExecutionConfig::default()).await.ok()
}

#[tokio::test]
async fn test_select_under_cursor() {
    let Some(engine) = get_test_engine().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let editor = BufferEditor::new("SELECT 1 AS one;\nSELECT 'a;b' AS s, 2 AS two;")
        .with_cursor(Position::new(2, 3));
    let mut session = TestSession::start(editor, engine);

    session.handle.toggle_run().await.unwrap();
    let events = session.until_idle().await;
    let result = events
        .into_iter()
        .find_map(|e| match e {
            SessionEvent::ResultReady { result, .. } => Some(result),
            _ => None,
        })
        .unwrap();

    assert_eq!(result.kind, ResultKind::Dql);
    assert_eq!(result.columns.len(), 2);
    assert_eq!(result.columns[0].name, "s");
    assert_eq!(result.row_count, 1);

    session.finish().await;
}

#[tokio::test]
async fn test_syntax_error_position() {
    let Some(engine) = get_test_engine().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let editor = BufferEditor::new("SELECT 1;\n  SELECT 1 FROM WHERE;").with_cursor(Position::new(2, 4));
    let mut session = TestSession::start(editor, engine);

    session.handle.toggle_run().await.unwrap();
    let events = session.until_idle().await;
    let location = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::ErrorLocated { location, .. } => Some(*location),
            _ => None,
        })
        .unwrap();

    // "WHERE" starts at offset 14 of the statement, which begins at 2:2
    assert_eq!(location.position, Position::new(2, 16));
    assert_eq!(location.span.end, Position::new(2, 21));

    let editor = session.finish().await;
    assert_eq!(editor.markers(), &[location.span]);
}

#[tokio::test]
async fn test_statement_timeout_is_set_on_the_server() {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let config = ConnectionConfig::from_connection_string(&url).unwrap();
    let execution = ExecutionConfig {
        statement_timeout_secs: 1,
        ..ExecutionConfig::default()
    };
    let engine = engine::connect(&config, &execution).await.unwrap();

    let shown = engine
        .execute("SHOW statement_timeout", execution.execute_options())
        .await
        .unwrap();
    assert_eq!(shown.rows[0][0].to_display_string(), "1s");

    let failure = engine
        .execute("SELECT pg_sleep(3)", execution.execute_options())
        .await
        .unwrap_err();
    assert!(failure.message.contains("statement timeout"), "{}", failure.message);

    engine.close().await.unwrap();
}
