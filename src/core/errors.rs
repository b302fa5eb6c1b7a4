/*!
 * Error Types
 * Recoverable handle errors with thiserror and miette, plus the fatal
 * protocol violations that abort instead of returning
 */

use crate::core::types::{NativeHandleId, ObjectId, WrapId};
use miette::Diagnostic;
use thiserror::Error;

/// Handle-related errors surfaced to callers
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum HandleError {
    #[error("Invalid handle state transition: {from} -> {to}")]
    #[diagnostic(
        code(handle::invalid_transition),
        help("Handle state only moves forward; a handle whose close was requested cannot be revived.")
    )]
    InvalidTransition { from: String, to: String },

    #[error("Object {0} is not a handle wrapper")]
    #[diagnostic(
        code(handle::not_a_handle),
        help("The receiver has no wrapper attached, or it was attached to a different object.")
    )]
    NotAHandle(ObjectId),

    #[error("Object {0} has already been reclaimed")]
    #[diagnostic(
        code(handle::object_reclaimed),
        help("The managed object was freed by the collector. Allocate a new one.")
    )]
    ObjectReclaimed(ObjectId),

    #[error("Object {0} already carries a wrapper")]
    #[diagnostic(code(handle::already_wrapped))]
    AlreadyWrapped(ObjectId),

    #[error("Object {0} belongs to a different environment")]
    #[diagnostic(code(handle::foreign_object))]
    ForeignObject(ObjectId),

    #[error("Environment has been torn down")]
    #[diagnostic(code(handle::environment_gone))]
    EnvironmentGone,

    #[error("Unknown method: {0}")]
    #[diagnostic(
        code(handle::unknown_method),
        help("HandleWrap exposes close, hasRef, ref and unref.")
    )]
    UnknownMethod(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(handle::config))]
    Config(String),
}

/// Failure reported by a user callback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("callback failed: {0}")]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Broken event-loop contract. Never returned, only passed to [`fatal`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("close completion for {wrap} observed state {observed}, expected closing")]
    UnexpectedCloseState { wrap: WrapId, observed: &'static str },

    #[error("{wrap} has no native handle while {state}")]
    NullNativeHandle { wrap: WrapId, state: &'static str },

    #[error("close completion for {native} has no live wrapper attached")]
    MissingHandleData { native: NativeHandleId },

    #[error("{native} is not known to the event loop")]
    UnknownNativeHandle { native: NativeHandleId },

    #[error("close requested twice for {native}")]
    DoubleCloseRequest { native: NativeHandleId },
}

/// Abort on a protocol violation.
///
/// Unwinds rather than exiting so that scoped guards held by the caller are
/// still released.
#[track_caller]
pub fn fatal(violation: ProtocolViolation) -> ! {
    tracing::error!(violation = %violation, "fatal handle protocol violation");
    panic!("handle protocol violation: {violation}");
}
