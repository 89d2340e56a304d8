//! Shared helpers for driving a session from tests.

use query_pane::config::Config;
use query_pane::editor::BufferEditor;
use query_pane::engine::QueryEngine;
use query_pane::feed::NotificationFeedState;
use query_pane::session::{QuerySession, SessionEvent, SessionHandle, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub struct TestSession {
    pub handle: SessionHandle,
    pub events: mpsc::Receiver<SessionEvent>,
    pub task: JoinHandle<BufferEditor>,
}

impl TestSession {
    pub fn start(editor: BufferEditor, engine: Arc<dyn QueryEngine>) -> Self {
        Self::start_with_config(editor, engine, &Config::default())
    }

    pub fn start_with_config(
        editor: BufferEditor,
        engine: Arc<dyn QueryEngine>,
        config: &Config,
    ) -> Self {
        let (events_tx, events) = mpsc::channel(128);
        let (handle, session) = QuerySession::spawn(editor, engine, config, events_tx);
        let task = tokio::spawn(session.run());
        Self {
            handle,
            events,
            task,
        }
    }

    pub async fn next_event(&mut self) -> SessionEvent {
        timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for a session event")
            .expect("event channel closed")
    }

    /// Waits for the first event matching `predicate`, dropping the rest.
    pub async fn wait_for(&mut self, predicate: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        loop {
            let event = self.next_event().await;
            if predicate(&event) {
                return event;
            }
        }
    }

    /// Collects events until the session reports idle.
    pub async fn until_idle(&mut self) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next_event().await;
            let idle = matches!(event, SessionEvent::StateChanged(SessionState::Idle));
            seen.push(event);
            if idle {
                return seen;
            }
        }
    }

    /// Toggles a run and returns the feed once it settles.
    pub async fn run_to_idle(&mut self) -> Option<NotificationFeedState> {
        self.handle.toggle_run().await.unwrap();
        last_feed(&self.until_idle().await)
    }

    /// Stops the session and hands back its editor.
    pub async fn finish(self) -> BufferEditor {
        self.handle.close().await.unwrap();
        self.task.await.unwrap()
    }
}

pub fn last_feed(events: &[SessionEvent]) -> Option<NotificationFeedState> {
    events.iter().rev().find_map(|event| match event {
        SessionEvent::FeedChanged(feed) => Some(feed.clone()),
        _ => None,
    })
}
