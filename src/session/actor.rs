//! Actor-based query session.
//!
//! Wraps [`QuerySessionController`] in a single tokio task that owns all
//! session state. Commands arrive through a [`SessionHandle`]; executions run
//! as spawned tasks racing the engine against their cancellation token and
//! report back tagged with their request id. Observers receive
//! [`SessionEvent`]s carrying cloned snapshots.

use super::controller::{
    Completion, ExecutionRequest, QuerySessionController, RequestId, RunDirective, SessionState,
};
use crate::config::Config;
use crate::editor::{EditorAction, EditorSurface};
use crate::engine::{ExecuteOptions, ExecutionOutcome, QueryEngine, QueryResult};
use crate::error::{PaneError, Result};
use crate::feed::{NotificationFeed, NotificationFeedState, NotificationId};
use crate::query::{ErrorLocation, ExtractedRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 32;

/// Commands sent to the session actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Run the statement under the caret, or cancel the running one.
    ToggleRun,
    /// Select the quoted literal `'text'` and toggle a run.
    RunQuery(String),
    /// Append `text` as a new statement, select it and toggle a run.
    AppendAndRun(String),
    /// Publish the export link for the given query, or the statement under
    /// the caret.
    Export(Option<String>),
    InsertText(String),
    /// Scroll the caret into view and focus the editor.
    Focus,
    LoadPreferences,
    SavePreferences,
    /// Replace the document; empty text is ignored.
    SetText(String),
    SetMaxHeight(u32),
    RemoveNotification(NotificationId),
    ClearNotifications,
    /// A registered keyboard action fired.
    Action(EditorAction),
    /// Cancel anything in flight and stop the actor.
    Shutdown,
}

/// Events published by the session actor.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// An execution was issued.
    RunStarted {
        id: RequestId,
        request: ExtractedRequest,
    },
    /// The in-flight execution was cancelled; no outcome will be recorded.
    RunCancelled { id: RequestId },
    ResultReady { id: RequestId, result: QueryResult },
    /// The engine rejected the statement; the editor marker sits at `location`.
    ErrorLocated {
        id: RequestId,
        location: ErrorLocation,
        message: String,
    },
    FeedChanged(NotificationFeedState),
    ExportRequested { url: String },
    /// The grid should take keyboard focus.
    FocusGrid,
}

/// The session actor that owns the controller and processes commands.
pub struct QuerySession<E> {
    controller: QuerySessionController<E>,
    engine: Arc<dyn QueryEngine>,
    options: ExecuteOptions,
    receiver: mpsc::Receiver<SessionCommand>,
    events: mpsc::Sender<SessionEvent>,
    outcome_tx: mpsc::Sender<(RequestId, ExecutionOutcome)>,
    outcome_rx: mpsc::Receiver<(RequestId, ExecutionOutcome)>,
}

impl<E: EditorSurface + 'static> QuerySession<E> {
    /// Creates a session and returns a handle for communication.
    ///
    /// Nothing runs until [`QuerySession::run`] is awaited or spawned.
    pub fn spawn(
        editor: E,
        engine: Arc<dyn QueryEngine>,
        config: &Config,
        events: mpsc::Sender<SessionEvent>,
    ) -> (SessionHandle, Self) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (outcome_tx, outcome_rx) = mpsc::channel(COMMAND_BUFFER);

        let session = Self {
            controller: QuerySessionController::new(
                editor,
                NotificationFeed::from_config(&config.feed),
            ),
            engine,
            options: config.execution.execute_options(),
            receiver,
            events,
            outcome_tx,
            outcome_rx,
        };

        (SessionHandle { sender }, session)
    }

    /// Runs the actor loop until `Shutdown` arrives or every handle is
    /// dropped, then returns the editor.
    pub async fn run(mut self) -> E {
        self.controller.register_actions();
        info!("Query session started");

        loop {
            tokio::select! {
                biased;

                command = self.receiver.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command).await,
                },

                Some((id, outcome)) = self.outcome_rx.recv() => {
                    self.settle(id, outcome).await;
                }
            }
        }

        self.shutdown().await;
        self.controller.into_editor()
    }

    async fn handle(&mut self, command: SessionCommand) {
        debug!("Session command: {:?}", command);
        match command {
            SessionCommand::ToggleRun => {
                let directive = self.controller.toggle_run();
                self.apply(directive).await;
            }
            SessionCommand::RunQuery(text) => {
                let directive = self.controller.run_query(&text);
                self.apply(directive).await;
            }
            SessionCommand::AppendAndRun(text) => {
                let directive = self.controller.append_and_run(&text);
                self.apply(directive).await;
            }
            SessionCommand::Action(action) if action.toggles_run() => {
                let directive = self.controller.toggle_run();
                self.apply(directive).await;
            }
            SessionCommand::Action(_) => self.publish(SessionEvent::FocusGrid).await,
            SessionCommand::Export(query) => match self.controller.export_link(query.as_deref()) {
                Some(url) => self.publish(SessionEvent::ExportRequested { url }).await,
                None => debug!("Nothing to export"),
            },
            SessionCommand::InsertText(text) => self.controller.insert_text(&text),
            SessionCommand::Focus => self.controller.focus_editor(),
            SessionCommand::LoadPreferences => self.controller.load_preferences(),
            SessionCommand::SavePreferences => self.controller.save_preferences(),
            SessionCommand::SetText(text) => self.controller.set_text(&text),
            SessionCommand::SetMaxHeight(max_height) => {
                let state = self.controller.set_max_height(max_height).clone();
                self.publish(SessionEvent::FeedChanged(state)).await;
            }
            SessionCommand::RemoveNotification(id) => {
                let state = self.controller.remove_notification(id).clone();
                self.publish(SessionEvent::FeedChanged(state)).await;
            }
            SessionCommand::ClearNotifications => {
                let state = self.controller.clear_notifications().clone();
                self.publish(SessionEvent::FeedChanged(state)).await;
            }
            SessionCommand::Shutdown => {
                // Handled in run() loop
            }
        }
    }

    async fn apply(&mut self, directive: RunDirective) {
        match directive {
            RunDirective::Nothing => {
                self.publish(SessionEvent::StateChanged(SessionState::Idle))
                    .await;
            }
            RunDirective::Execute(execution) => {
                self.publish(SessionEvent::RunStarted {
                    id: execution.id,
                    request: execution.request.clone(),
                })
                .await;
                self.publish(SessionEvent::StateChanged(SessionState::Running))
                    .await;
                self.spawn_execution(execution);
            }
            RunDirective::Cancelled(id) => {
                self.publish(SessionEvent::RunCancelled { id }).await;
                self.publish(SessionEvent::StateChanged(SessionState::Idle))
                    .await;
            }
        }
    }

    /// Starts the engine call on its own task.
    fn spawn_execution(&self, execution: ExecutionRequest) {
        let engine = Arc::clone(&self.engine);
        let outcomes = self.outcome_tx.clone();
        let options = self.options;

        tokio::spawn(async move {
            let ExecutionRequest {
                id,
                request,
                cancel,
            } = execution;

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Execution {} aborted", id);
                }
                outcome = engine.execute(&request.query, options) => {
                    if outcomes.send((id, outcome)).await.is_err() {
                        warn!("Session gone before execution {} reported", id);
                    }
                }
            }
        });
    }

    async fn settle(&mut self, id: RequestId, outcome: ExecutionOutcome) {
        let Some(completion) = self.controller.complete(id, outcome) else {
            return;
        };

        match completion {
            Completion::Succeeded { result, .. } => {
                self.publish(SessionEvent::ResultReady { id, result }).await;
            }
            Completion::Failed {
                failure, location, ..
            } => {
                self.publish(SessionEvent::ErrorLocated {
                    id,
                    location,
                    message: failure.message,
                })
                .await;
            }
        }

        let feed = self.controller.feed().clone();
        self.publish(SessionEvent::FeedChanged(feed)).await;
        self.publish(SessionEvent::StateChanged(SessionState::Idle))
            .await;
    }

    async fn publish(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            warn!("Session event dropped: no subscriber");
        }
    }

    /// Gracefully shuts down the actor.
    async fn shutdown(&mut self) {
        if let Some(id) = self.controller.cancel() {
            self.publish(SessionEvent::RunCancelled { id }).await;
        }
        if let Err(e) = self.engine.close().await {
            warn!("Error closing engine: {}", e);
        }
        info!("Query session stopped");
    }
}

/// Handle for communicating with the session actor.
///
/// Lightweight and cloneable. Results come back on the event channel.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Sends any command to the session.
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| PaneError::session("Query session closed"))
    }

    /// Runs the statement under the caret, or cancels the running one.
    pub async fn toggle_run(&self) -> Result<()> {
        self.send(SessionCommand::ToggleRun).await
    }

    pub async fn run_query(&self, text: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::RunQuery(text.into())).await
    }

    pub async fn append_and_run(&self, text: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::AppendAndRun(text.into())).await
    }

    pub async fn export(&self, query: Option<String>) -> Result<()> {
        self.send(SessionCommand::Export(query)).await
    }

    pub async fn trigger(&self, action: EditorAction) -> Result<()> {
        self.send(SessionCommand::Action(action)).await
    }

    pub async fn set_max_height(&self, max_height: u32) -> Result<()> {
        self.send(SessionCommand::SetMaxHeight(max_height)).await
    }

    /// Signals the actor to stop.
    pub async fn close(&self) -> Result<()> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| PaneError::session("Query session already closed"))
    }
}
