/*!
 * Event Loop Interface
 *
 * Primitives consumed from the single-threaded loop that owns native handles:
 * asynchronous close with a one-shot completion, and the reference-count
 * primitive (ref / unref / has-ref / is-active).
 */

mod local;

pub use local::{LocalLoop, LoopStats};

use crate::core::types::NativeHandleId;

/// One-shot completion for a close request
pub type CloseCallback = Box<dyn FnOnce(NativeHandleId)>;

/// Event loop primitives used by the handle lifecycle
///
/// All calls happen on the loop's own thread. Implementations must never run
/// a close completion synchronously inside [`EventLoop::close`].
#[cfg_attr(test, mockall::automock)]
pub trait EventLoop {
    /// Queue an asynchronous close; `on_close` runs exactly once on a later turn
    fn close(&self, handle: NativeHandleId, on_close: CloseCallback);

    /// Make the handle keep the loop alive
    fn ref_handle(&self, handle: NativeHandleId);

    /// Stop the handle from keeping the loop alive
    fn unref_handle(&self, handle: NativeHandleId);

    /// Whether the handle is referenced
    fn has_ref(&self, handle: NativeHandleId) -> bool;

    /// Whether the handle has outstanding work registered with the loop
    fn is_active(&self, handle: NativeHandleId) -> bool;

    /// Run one non-blocking turn. Returns true while the loop is still alive.
    fn run_nowait(&self) -> bool;
}
