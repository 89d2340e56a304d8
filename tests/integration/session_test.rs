//! Run, cancel and error handling through the session actor.

use super::common::{last_feed, TestSession};
use pretty_assertions::assert_eq;
use query_pane::editor::{BufferEditor, EditorAction, EditorSurface, Position, TextRange};
use query_pane::engine::{MockQueryEngine, ScriptedResponse};
use query_pane::feed::{NotificationDetail, NotificationKind};
use query_pane::session::{SessionCommand, SessionEvent, SessionState};
use std::sync::Arc;

#[tokio::test]
async fn test_cursor_run_executes_enclosing_statement() {
    let engine = Arc::new(MockQueryEngine::new());
    let editor = BufferEditor::new("SELECT 1;\n\nSELECT 'a;b' AS s;\nSELECT 3;")
        .with_cursor(Position::new(3, 4));
    let mut session = TestSession::start(editor, engine.clone());

    let feed = session.run_to_idle().await.unwrap();
    assert_eq!(engine.executed(), vec!["SELECT 'a;b' AS s"]);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.notifications[0].kind, NotificationKind::Success);
    assert_eq!(feed.notifications[0].content.title, "SELECT 'a;b' AS s");

    session.finish().await;
}

#[tokio::test]
async fn test_selection_is_sent_verbatim() {
    let engine = Arc::new(MockQueryEngine::new());
    let editor = BufferEditor::new("SELECT 1; SELECT 2;")
        .with_selection(TextRange::new(Position::new(1, 0), Position::new(1, 19)));
    let mut session = TestSession::start(editor, engine.clone());

    session.run_to_idle().await;
    assert_eq!(engine.executed(), vec!["SELECT 1; SELECT 2;"]);

    session.finish().await;
}

#[tokio::test]
async fn test_nothing_under_caret_stays_idle() {
    let engine = Arc::new(MockQueryEngine::new());
    let editor = BufferEditor::new("SELECT 1;\n\n   ").with_cursor(Position::new(3, 1));
    let mut session = TestSession::start(editor, engine.clone());

    session.handle.toggle_run().await.unwrap();
    let events = session.until_idle().await;
    assert_eq!(events.len(), 1);
    assert!(engine.executed().is_empty());

    session.finish().await;
}

#[tokio::test]
async fn test_toggle_while_running_cancels_without_notifying() {
    let engine = Arc::new(MockQueryEngine::gated());
    let editor = BufferEditor::new("SELECT 1");
    let mut session = TestSession::start(editor, engine.clone());

    session.handle.toggle_run().await.unwrap();
    session
        .wait_for(|e| matches!(e, SessionEvent::StateChanged(SessionState::Running)))
        .await;
    while engine.in_flight() == 0 {
        tokio::task::yield_now().await;
    }

    session.handle.toggle_run().await.unwrap();
    let events = session.until_idle().await;
    assert!(matches!(events[0], SessionEvent::RunCancelled { .. }));
    assert!(last_feed(&events).is_none());

    while engine.in_flight() > 0 {
        tokio::task::yield_now().await;
    }
    engine.release();

    session.finish().await;
    assert_eq!(engine.executed(), vec!["SELECT 1"]);
    assert_eq!(engine.completed(), 0);
    assert_eq!(engine.peak_in_flight(), 1);
}

#[tokio::test]
async fn test_rerun_after_cancel_is_single_flight() {
    let engine = Arc::new(MockQueryEngine::gated());
    let mut session = TestSession::start(BufferEditor::new("SELECT 1"), engine.clone());

    session.handle.toggle_run().await.unwrap();
    while engine.in_flight() == 0 {
        tokio::task::yield_now().await;
    }
    session.handle.toggle_run().await.unwrap();
    session.until_idle().await;
    while engine.in_flight() > 0 {
        tokio::task::yield_now().await;
    }

    session.handle.toggle_run().await.unwrap();
    while engine.in_flight() == 0 {
        tokio::task::yield_now().await;
    }
    engine.release();

    let feed = session
        .wait_for(|e| matches!(e, SessionEvent::FeedChanged(_)))
        .await;
    let SessionEvent::FeedChanged(feed) = feed else {
        unreachable!()
    };
    assert_eq!(feed.len(), 1);

    session.finish().await;
    assert_eq!(engine.executed().len(), 2);
    assert_eq!(engine.completed(), 1);
    assert_eq!(engine.peak_in_flight(), 1);
}

#[tokio::test]
async fn test_error_is_mapped_into_document() {
    let engine = Arc::new(
        MockQueryEngine::new()
            .respond_to("SELECT * FROM t", ScriptedResponse::fail("unexpected token: *", 7)),
    );
    let editor =
        BufferEditor::new("SELECT 1;\n\n  SELECT * FROM t;").with_cursor(Position::new(3, 4));
    let mut session = TestSession::start(editor, engine);

    session.handle.toggle_run().await.unwrap();
    let events = session.until_idle().await;

    let located = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::ErrorLocated { location, .. } => Some(*location),
            _ => None,
        })
        .unwrap();
    let marker = TextRange::new(Position::new(3, 9), Position::new(3, 10));
    assert_eq!(located.position, Position::new(3, 9));
    assert_eq!(located.span, marker);

    let feed = last_feed(&events).unwrap();
    assert_eq!(feed.notifications[0].kind, NotificationKind::Error);
    assert_eq!(feed.notifications[0].estimated_height, 70);
    assert_eq!(
        feed.notifications[0].content.detail,
        Some(NotificationDetail::Message("unexpected token: *".into()))
    );

    let editor = session.finish().await;
    assert_eq!(editor.markers(), &[marker]);
    assert_eq!(editor.cursor(), Position::new(3, 9));
    assert_eq!(editor.scrolled_to(), Some(3));
    assert!(editor.is_focused());
}

#[tokio::test]
async fn test_markers_replaced_on_next_run() {
    let engine = Arc::new(
        MockQueryEngine::new().respond_to("SELECT * FORM t", ScriptedResponse::fail("syntax", 9)),
    );
    let mut session = TestSession::start(BufferEditor::new("SELECT * FORM t"), engine);

    session.run_to_idle().await;
    session.run_to_idle().await;

    let editor = session.finish().await;
    assert_eq!(editor.markers().len(), 1);
}

#[tokio::test]
async fn test_append_and_run() {
    let engine = Arc::new(MockQueryEngine::new());
    let mut session = TestSession::start(BufferEditor::new("SELECT 1;"), engine.clone());

    session.handle.append_and_run("SELECT 42").await.unwrap();
    session.until_idle().await;
    assert_eq!(engine.executed(), vec!["SELECT 42;"]);

    let editor = session.finish().await;
    assert_eq!(editor.text(), "SELECT 1;\nSELECT 42;");
}

#[tokio::test]
async fn test_run_query_selects_quoted_name() {
    let engine = Arc::new(MockQueryEngine::new());
    let editor = BufferEditor::new("SELECT 1;\n'trades';").with_cursor(Position::new(1, 0));
    let mut session = TestSession::start(editor, engine.clone());

    session.handle.run_query("trades").await.unwrap();
    session.until_idle().await;
    assert_eq!(engine.executed(), vec!["'trades'"]);

    session.finish().await;
}

#[tokio::test]
async fn test_keyboard_actions() {
    let engine = Arc::new(MockQueryEngine::new());
    let mut session = TestSession::start(BufferEditor::new("SELECT 1"), engine.clone());

    session.handle.trigger(EditorAction::ExecuteAt).await.unwrap();
    session.until_idle().await;
    assert_eq!(engine.executed(), vec!["SELECT 1"]);

    session.handle.trigger(EditorAction::FocusGrid).await.unwrap();
    assert!(matches!(session.next_event().await, SessionEvent::FocusGrid));

    let editor = session.finish().await;
    assert_eq!(editor.registered_actions(), &EditorAction::ALL[..]);
}

#[tokio::test]
async fn test_editor_commands() {
    let engine = Arc::new(MockQueryEngine::new());
    let editor = BufferEditor::new("SELECT  FROM t").with_cursor(Position::new(1, 7));
    let session = TestSession::start(editor, engine);

    for command in [
        SessionCommand::InsertText("price".into()),
        SessionCommand::SavePreferences,
        SessionCommand::SetText(String::new()),
        SessionCommand::Focus,
    ] {
        session.handle.send(command).await.unwrap();
    }

    let editor = session.finish().await;
    assert_eq!(editor.text(), "SELECT price FROM t");
    assert_eq!(editor.scrolled_to(), Some(1));
    assert!(editor.is_focused());
    assert_eq!(editor.preference_saves(), 1);
}

#[tokio::test]
async fn test_export_link() {
    let engine = Arc::new(MockQueryEngine::new());
    let mut session = TestSession::start(BufferEditor::new("SELECT * FROM t;"), engine.clone());

    session.handle.export(None).await.unwrap();
    match session.next_event().await {
        SessionEvent::ExportRequested { url } => assert_eq!(url, "/exp?query=SELECT+*+FROM+t"),
        other => panic!("unexpected event {other:?}"),
    }

    session.finish().await;
    assert!(engine.executed().is_empty());
}
