//! Query session state machine.
//!
//! Pure state layer for a query pane, separated from the async actor loop so
//! that run/cancel/complete transitions can be unit tested without an engine
//! or a runtime. The controller owns the editor surface and the notification
//! feed; the actor owns the controller.

use crate::editor::{EditorAction, EditorSurface};
use crate::engine::{EngineFailure, ExecutionOutcome, QueryResult, ResultKind};
use crate::feed::{
    NotificationContent, NotificationDetail, NotificationFeed, NotificationFeedState,
    NotificationId, NotificationKind, QuerySummary,
};
use crate::query::{extract, locate_error, ErrorLocation, ExtractedRequest};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Path of the CSV export endpoint.
pub const EXPORT_PATH: &str = "/exp";

/// Unique identifier for a run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Generates a new unique request ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
}

/// One execution the caller must start.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub id: RequestId,
    pub request: ExtractedRequest,
    /// Cancelled when the run is toggled off or the session shuts down.
    pub cancel: CancellationToken,
}

/// What a toggle asks the caller to do.
#[derive(Debug, Clone)]
pub enum RunDirective {
    /// Nothing under the caret; the session stays idle.
    Nothing,
    Execute(ExecutionRequest),
    /// The in-flight request was cancelled.
    Cancelled(RequestId),
}

/// How a run settled once its outcome was accepted.
#[derive(Debug, Clone)]
pub enum Completion {
    Succeeded {
        result: QueryResult,
        notification: NotificationId,
    },
    Failed {
        failure: EngineFailure,
        location: ErrorLocation,
        notification: NotificationId,
    },
}

/// The request currently in flight.
#[derive(Debug)]
struct InFlight {
    id: RequestId,
    cancel: CancellationToken,
    request: ExtractedRequest,
}

/// Drives one editor through run, cancel and completion.
pub struct QuerySessionController<E> {
    editor: E,
    feed: NotificationFeed,
    in_flight: Option<InFlight>,
}

impl<E: EditorSurface> QuerySessionController<E> {
    pub fn new(editor: E, feed: NotificationFeed) -> Self {
        Self {
            editor,
            feed,
            in_flight: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn into_editor(self) -> E {
        self.editor
    }

    pub fn feed(&self) -> &NotificationFeedState {
        self.feed.state()
    }

    /// The statement being executed, if any.
    pub fn current_request(&self) -> Option<&ExtractedRequest> {
        self.in_flight.as_ref().map(|f| &f.request)
    }

    /// Registers the session's keyboard actions with the editor.
    pub fn register_actions(&mut self) {
        for action in EditorAction::ALL {
            self.editor.register_action(action);
        }
    }

    /// Starts a run when idle, cancels the in-flight run otherwise.
    pub fn toggle_run(&mut self) -> RunDirective {
        if let Some(id) = self.cancel() {
            return RunDirective::Cancelled(id);
        }

        self.editor.clear_markers();
        self.editor.save_preferences();

        let document = self.editor.document();
        let Some(request) = extract(&document, self.editor.anchor()) else {
            debug!("Nothing to run under the caret");
            return RunDirective::Nothing;
        };

        let id = RequestId::new();
        let cancel = CancellationToken::new();
        info!("Running request {} from {}", id, request.origin());

        self.in_flight = Some(InFlight {
            id,
            cancel: cancel.clone(),
            request: request.clone(),
        });
        RunDirective::Execute(ExecutionRequest {
            id,
            request,
            cancel,
        })
    }

    /// Cancels and forgets the in-flight request, returning its id.
    pub fn cancel(&mut self) -> Option<RequestId> {
        let in_flight = self.in_flight.take()?;
        in_flight.cancel.cancel();
        info!("Cancelled request {}", in_flight.id);
        Some(in_flight.id)
    }

    /// Applies an execution outcome. Outcomes for any request other than the
    /// in-flight one are discarded.
    pub fn complete(&mut self, id: RequestId, outcome: ExecutionOutcome) -> Option<Completion> {
        match &self.in_flight {
            Some(in_flight) if in_flight.id == id => {}
            _ => {
                warn!("Discarding outcome of stale request {}", id);
                return None;
            }
        }
        let in_flight = self.in_flight.take()?;
        let title = NotificationContent::title(in_flight.request.query.as_str());

        match outcome {
            Ok(result) => {
                let (kind, content) = match result.kind {
                    ResultKind::Dql => (
                        NotificationKind::Success,
                        title.with_detail(NotificationDetail::Summary(QuerySummary {
                            row_count: result.row_count,
                            timings: result.timings,
                        })),
                    ),
                    ResultKind::Ddl => (NotificationKind::Info, title),
                };
                let notification = self.feed.notify(kind, content);
                info!("Request {} finished: {} rows", id, result.row_count);
                Some(Completion::Succeeded {
                    result,
                    notification,
                })
            }
            Err(failure) => {
                let location =
                    locate_error(&self.editor.document(), &in_flight.request, failure.offset);

                self.editor.add_marker(location.span);
                self.editor.move_caret(location.position);
                self.editor.scroll_to_row(location.position.row);
                self.editor.focus();

                let notification = self.feed.notify(
                    NotificationKind::Error,
                    title.with_detail(NotificationDetail::Message(failure.message.clone())),
                );
                info!("Request {} failed at {}: {}", id, location.position, failure);
                Some(Completion::Failed {
                    failure,
                    location,
                    notification,
                })
            }
        }
    }

    /// Selects the quoted literal `'text'` if present, then toggles a run.
    pub fn run_query(&mut self, text: &str) -> RunDirective {
        if self.editor.find(&format!("'{text}'")).is_none() {
            debug!("'{}' not found in editor", text);
        }
        self.toggle_run()
    }

    /// Appends `text` as a new statement line, selects it and toggles a run.
    pub fn append_and_run(&mut self, text: &str) -> RunDirective {
        self.editor.append(&format!("\n{text};"));
        let document = self.editor.document();
        self.editor.select(document.line_range(document.line_count()));
        self.toggle_run()
    }

    /// Builds the export link for `query`, or for the statement under the
    /// caret when none is given.
    pub fn export_link(&self, query: Option<&str>) -> Option<String> {
        let query = match query {
            Some(query) => query.to_string(),
            None => extract(&self.editor.document(), self.editor.anchor())?.query,
        };
        let encoded = form_urlencoded::Serializer::new(String::new())
            .append_pair("query", &query)
            .finish();
        Some(format!("{EXPORT_PATH}?{encoded}"))
    }

    pub fn insert_text(&mut self, text: &str) {
        self.editor.insert_at_cursor(text);
        self.editor.focus();
    }

    /// Scrolls the caret row into view and focuses the editor.
    pub fn focus_editor(&mut self) {
        let row = self.editor.cursor().row;
        self.editor.scroll_to_row(row);
        self.editor.focus();
    }

    pub fn load_preferences(&mut self) {
        self.editor.load_preferences();
    }

    pub fn save_preferences(&mut self) {
        self.editor.save_preferences();
    }

    /// Replaces the document; empty text is ignored.
    pub fn set_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.editor.set_text(text);
        }
    }

    pub fn set_max_height(&mut self, max_height: u32) -> &NotificationFeedState {
        self.feed.set_max_height(max_height)
    }

    pub fn remove_notification(&mut self, id: NotificationId) -> &NotificationFeedState {
        self.feed.remove(id)
    }

    pub fn clear_notifications(&mut self) -> &NotificationFeedState {
        self.feed.clear()
    }
}
