/*!
 * Handle Wrap Library
 * Lifecycle of event-loop handles paired with collector-managed objects
 *
 * A [`HandleWrap`] ties one native handle to one managed object. Closing is
 * asynchronous: [`HandleWrap::close`] queues the native close and the event
 * loop's completion finishes the transition to `Closed`. The collector may
 * find the object unreachable at any point; an open handle is then closed
 * first and the object is reclaimed once that close completes.
 */

pub mod config;
pub mod core;
pub mod env;
pub mod event_loop;
pub mod handle;
pub mod monitoring;
pub mod runtime;

// Re-exports
pub use config::{EnvironmentConfig, WeakCallbackPolicy};
pub use crate::core::errors::{fatal, CallbackError, HandleError, ProtocolViolation};
pub use crate::core::types::{
    HandleResult, NativeHandleId, ObjectId, ProviderType, Symbol, WrapId, HANDLE_ONCLOSE_SYMBOL,
};
pub use env::{CleanupStats, Environment, LeakReport, LeakedHandle};
pub use event_loop::{CloseCallback, EventLoop, LocalLoop, LoopStats};
pub use handle::{
    register_external_references, register_module_references, BasicHandle, HandleKind,
    HandleRegistry, HandleState, HandleWrap, RegistryKey,
};
pub use monitoring::{init_tracing, TraceFormat};
pub use runtime::{
    Callback, CallbackContext, CollectStats, ConstructorTemplate, ExternalReferenceRegistry,
    Finalizer, HeapStats, ObjectHeap, ObjectRef, Reclaim, Value, WeakObjectRef,
};
