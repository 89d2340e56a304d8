//! Notification feed behaviour as seen by session observers.

use super::common::TestSession;
use pretty_assertions::assert_eq;
use query_pane::config::{Config, FeedConfig};
use query_pane::editor::BufferEditor;
use query_pane::engine::MockQueryEngine;
use query_pane::feed::{NotificationFeedState, NotificationKind};
use query_pane::session::{SessionCommand, SessionEvent};
use std::sync::Arc;

fn heights(feed: &NotificationFeedState) -> Vec<u32> {
    feed.notifications
        .iter()
        .map(|n| n.estimated_height)
        .collect()
}

async fn feed_after(session: &mut TestSession, command: SessionCommand) -> NotificationFeedState {
    session.handle.send(command).await.unwrap();
    match session
        .wait_for(|e| matches!(e, SessionEvent::FeedChanged(_)))
        .await
    {
        SessionEvent::FeedChanged(feed) => feed,
        _ => unreachable!(),
    }
}

/// Five DDL runs fill the default feed with 70px entries.
async fn session_with_five_entries() -> TestSession {
    let engine = Arc::new(MockQueryEngine::new());
    let mut session = TestSession::start(BufferEditor::new("CREATE TABLE t (x INT)"), engine);
    for _ in 0..5 {
        session.run_to_idle().await;
    }
    session
}

#[tokio::test]
async fn test_feed_keeps_entries_within_budget() {
    let mut session = session_with_five_entries().await;

    let feed = feed_after(&mut session, SessionCommand::SetMaxHeight(500)).await;
    assert_eq!(heights(&feed), vec![70; 5]);
    assert!(feed
        .notifications
        .iter()
        .all(|n| n.kind == NotificationKind::Info));

    let ids: Vec<u64> = feed.notifications.iter().map(|n| n.id.0).collect();
    let mut newest_first = ids.clone();
    newest_first.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(ids, newest_first);

    session.finish().await;
}

#[tokio::test]
async fn test_success_entry_then_eviction() {
    let mut session = session_with_five_entries().await;

    session
        .handle
        .send(SessionCommand::SetText("SELECT 1".into()))
        .await
        .unwrap();
    let feed = session.run_to_idle().await.unwrap();
    assert_eq!(heights(&feed), vec![145, 70, 70, 70, 70, 70]);
    assert_eq!(feed.total_height(), 495);

    session
        .handle
        .send(SessionCommand::SetText("DROP TABLE t".into()))
        .await
        .unwrap();
    let feed = session.run_to_idle().await.unwrap();
    assert_eq!(heights(&feed), vec![70, 145, 70, 70, 70, 70]);
    assert_eq!(feed.total_height(), 495);

    session.finish().await;
}

#[tokio::test]
async fn test_shrinking_budget_evicts_and_may_empty() {
    let mut session = session_with_five_entries().await;

    let feed = feed_after(&mut session, SessionCommand::SetMaxHeight(100)).await;
    assert_eq!(heights(&feed), vec![70]);
    assert_eq!(feed.max_height, 100);

    let feed = feed_after(&mut session, SessionCommand::SetMaxHeight(50)).await;
    assert!(feed.is_empty());

    session.finish().await;
}

#[tokio::test]
async fn test_remove_and_clear() {
    let mut session = session_with_five_entries().await;

    let feed = feed_after(&mut session, SessionCommand::SetMaxHeight(500)).await;
    let target = feed.notifications[2].id;

    let feed = feed_after(&mut session, SessionCommand::RemoveNotification(target)).await;
    assert_eq!(feed.len(), 4);
    assert!(feed.notifications.iter().all(|n| n.id != target));

    let feed = feed_after(&mut session, SessionCommand::ClearNotifications).await;
    assert!(feed.is_empty());

    session.finish().await;
}

#[tokio::test]
async fn test_configured_heights_are_used() {
    let config = Config {
        feed: FeedConfig {
            max_height: 200,
            success_height: 120,
            plain_height: 40,
        },
        ..Config::default()
    };
    let engine = Arc::new(MockQueryEngine::new());
    let mut session =
        TestSession::start_with_config(BufferEditor::new("SELECT 1"), engine, &config);

    let mut feed = None;
    for _ in 0..3 {
        feed = session.run_to_idle().await;
    }
    let feed = feed.unwrap();
    assert_eq!(heights(&feed), vec![120]);
    assert_eq!(feed.max_height, 200);

    session.finish().await;
}
