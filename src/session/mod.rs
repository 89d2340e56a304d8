//! Query session: the run/cancel state machine and the actor around it.

mod actor;
mod controller;

pub use actor::{QuerySession, SessionCommand, SessionEvent, SessionHandle};
pub use controller::{
    Completion, ExecutionRequest, QuerySessionController, RequestId, RunDirective, SessionState,
    EXPORT_PATH,
};
