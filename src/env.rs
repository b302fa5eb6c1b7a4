/*!
 * Environment
 *
 * Explicit execution context shared by every wrapper: the event loop, the
 * managed heap, the handle registry and the configuration.
 *
 * # Example
 *
 * ```ignore
 * let event_loop = LocalLoop::new();
 * let env = Environment::new(event_loop.clone());
 *
 * let object = env.new_object();
 * let native = event_loop.init_handle(ProviderType::Timer);
 * let wrap = env.wrap_handle(&object, native, Box::new(BasicHandle::new(ProviderType::Timer)))?;
 *
 * wrap.close(None);
 * event_loop.run();
 * ```
 */

use crate::config::EnvironmentConfig;
use crate::core::errors::HandleError;
use crate::core::types::{HandleResult, NativeHandleId, ObjectId, ProviderType, WrapId};
use crate::event_loop::EventLoop;
use crate::handle::{methods, HandleKind, HandleRegistry, HandleState, HandleWrap};
use crate::runtime::{
    Callback, CallbackContext, CollectStats, ConstructorTemplate, ObjectHeap, ObjectRef, Value,
};
use serde::Serialize;
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};

pub(crate) struct EnvShared {
    pub(crate) event_loop: Rc<dyn EventLoop>,
    pub(crate) heap: Rc<ObjectHeap>,
    pub(crate) registry: RefCell<HandleRegistry<Weak<HandleWrap>>>,
    pub(crate) config: EnvironmentConfig,
    next_wrap_id: Cell<u64>,
    callback_errors: Cell<u64>,
    template: OnceCell<ConstructorTemplate>,
}

impl EnvShared {
    pub(crate) fn next_wrap_id(&self) -> WrapId {
        let id = self.next_wrap_id.get();
        self.next_wrap_id.set(id + 1);
        WrapId(id)
    }

    /// Invoke a stored callback with the wrapper as receiver
    pub(crate) fn make_callback(&self, wrap: &HandleWrap, callback: &Callback) {
        let ctx = CallbackContext {
            receiver: wrap.object(),
            wrap: wrap.id(),
            provider: wrap.provider(),
        };

        if let Err(e) = callback.call(&ctx) {
            self.callback_errors.set(self.callback_errors.get() + 1);
            warn!(wrap = %wrap.id(), provider = %wrap.provider(), error = %e, "close callback failed");
        }
    }
}

/// Execution context for handle wrappers
#[derive(Clone)]
pub struct Environment {
    shared: Rc<EnvShared>,
}

impl Environment {
    pub fn new(event_loop: Rc<dyn EventLoop>) -> Self {
        Self::with_config(event_loop, EnvironmentConfig::default())
    }

    pub fn with_config(event_loop: Rc<dyn EventLoop>, config: EnvironmentConfig) -> Self {
        let registry = HandleRegistry::with_capacity(config.registry_capacity);
        debug!(?config, "environment created");
        Self {
            shared: Rc::new(EnvShared {
                event_loop,
                heap: ObjectHeap::new(),
                registry: RefCell::new(registry),
                config,
                next_wrap_id: Cell::new(1),
                callback_errors: Cell::new(0),
                template: OnceCell::new(),
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Rc<EnvShared> {
        &self.shared
    }

    pub fn heap(&self) -> &Rc<ObjectHeap> {
        &self.shared.heap
    }

    pub fn event_loop(&self) -> &Rc<dyn EventLoop> {
        &self.shared.event_loop
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.shared.config
    }

    /// Allocate a fresh managed object
    pub fn new_object(&self) -> ObjectRef {
        self.shared.heap.allocate()
    }

    /// Pair a native handle with a managed object
    pub fn wrap_handle(
        &self,
        object: &ObjectRef,
        native: NativeHandleId,
        kind: Box<dyn HandleKind>,
    ) -> HandleResult<Rc<HandleWrap>> {
        HandleWrap::new(self, object, native, kind)
    }

    /// Wrapper attached to an object, if any
    pub fn unwrap_handle(&self, object: ObjectId) -> Option<Rc<HandleWrap>> {
        let internal = self.shared.heap.internal(object)?;
        internal
            .downcast::<HandleWrap>()
            .ok()
            .filter(|wrap| wrap.object() == object)
    }

    /// Like [`unwrap_handle`](Self::unwrap_handle), but a plain object is an error
    pub fn require_handle(&self, object: ObjectId) -> HandleResult<Rc<HandleWrap>> {
        self.unwrap_handle(object)
            .ok_or(HandleError::NotAHandle(object))
    }

    /// Wrappers in the registry (state is not `Closed`)
    pub fn handle_count(&self) -> usize {
        self.shared.registry.borrow().len()
    }

    /// Registered wrappers in insertion order
    pub fn handles(&self) -> Vec<Rc<HandleWrap>> {
        self.shared
            .registry
            .borrow()
            .iter()
            .filter_map(|(_, wrap)| wrap.upgrade())
            .collect()
    }

    /// Run a collection pass on the managed heap
    pub fn collect_garbage(&self) -> CollectStats {
        let stats = self.shared.heap.collect();
        debug!(
            examined = stats.examined,
            reclaimed = stats.reclaimed,
            deferred = stats.deferred,
            "collection pass finished"
        );
        stats
    }

    /// Close callbacks that reported failure
    pub fn callback_errors(&self) -> u64 {
        self.shared.callback_errors.get()
    }

    pub fn constructor_template(&self) -> &ConstructorTemplate {
        self.shared.template.get_or_init(methods::constructor_template)
    }

    /// Call a prototype method on a managed object
    pub fn invoke_method(&self, receiver: ObjectId, name: &str, args: &[Value]) -> HandleResult<Value> {
        self.constructor_template().invoke(self, receiver, name, args)
    }

    /// Close every registered handle and drive the loop until they complete
    pub fn run_cleanup(&self) -> CleanupStats {
        let start = Instant::now();
        let mut stats = CleanupStats::default();

        for wrap in self.handles() {
            if wrap.state() == HandleState::Initialized {
                wrap.close(None);
                stats.handles_closed += 1;
                *stats
                    .by_provider
                    .entry(wrap.provider().as_str().to_string())
                    .or_insert(0) += 1;
            }
        }

        while self.handle_count() > 0 && stats.loop_iterations < self.shared.config.cleanup_max_iterations {
            self.shared.event_loop.run_nowait();
            stats.loop_iterations += 1;
        }

        stats.remaining = self.handle_count();
        stats.cleanup_duration_micros = start.elapsed().as_micros() as u64;

        if stats.remaining > 0 {
            warn!(
                remaining = stats.remaining,
                iterations = stats.loop_iterations,
                "handle cleanup did not complete"
            );
        } else {
            info!("{}", stats);
        }
        stats
    }

    /// Registered handles that would keep the process alive at exit
    pub fn leak_report(&self) -> LeakReport {
        let handles = self.handles();
        let total = handles.len();
        let leaked = handles
            .iter()
            .filter(|wrap| !wrap.is_not_indicative_of_memory_leak_at_exit())
            .map(|wrap| LeakedHandle {
                wrap: wrap.id(),
                object: wrap.object(),
                provider: wrap.provider(),
                state: wrap.state(),
                has_ref: wrap.has_ref(),
                active: wrap.is_active(),
            })
            .collect();

        LeakReport { total, leaked }
    }

    /// Shut the environment down: optional leak report, then cleanup
    pub fn teardown(self) -> CleanupStats {
        if self.shared.config.verify_handles_at_exit {
            let report = self.leak_report();
            for leaked in &report.leaked {
                warn!(
                    wrap = %leaked.wrap,
                    object = %leaked.object,
                    provider = %leaked.provider,
                    state = %leaked.state,
                    "handle left open at exit"
                );
            }
        }

        let stats = self.run_cleanup();
        self.collect_garbage();
        stats
    }
}

/// Result of a shutdown cleanup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub handles_closed: usize,
    pub loop_iterations: usize,
    pub remaining: usize,
    pub cleanup_duration_micros: u64,
    pub by_provider: BTreeMap<String, usize>,
}

impl CleanupStats {
    /// Every handle finished closing
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

impl fmt::Display for CleanupStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handle cleanup: {} closed, {} remaining, {} loop turns, took {}μs",
            self.handles_closed, self.remaining, self.loop_iterations, self.cleanup_duration_micros
        )
    }
}

/// A handle that would hold the process open
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakedHandle {
    pub wrap: WrapId,
    pub object: ObjectId,
    pub provider: ProviderType,
    pub state: HandleState,
    pub has_ref: bool,
    pub active: bool,
}

/// Exit-time leak diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeakReport {
    pub total: usize,
    pub leaked: Vec<LeakedHandle>,
}

impl LeakReport {
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
