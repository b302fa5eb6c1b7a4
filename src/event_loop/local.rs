/*!
 * Local Event Loop
 *
 * Minimal single-threaded loop with libuv handle semantics: handles carry
 * ref/active flags, `close` marks the handle closing and queues its
 * completion, and the close phase of each turn drains that queue.
 */

use super::{CloseCallback, EventLoop};
use crate::core::errors::{fatal, ProtocolViolation};
use crate::core::types::{NativeHandleId, ProviderType};
use ahash::AHashMap;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, trace};

/// Loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub handles_initialized: u64,
    pub close_requests: u64,
    pub close_completions: u64,
    pub turns: u64,
}

#[derive(Debug)]
struct NativeHandle {
    provider: ProviderType,
    referenced: bool,
    active: bool,
    closing: bool,
}

struct LoopInner {
    handles: AHashMap<NativeHandleId, NativeHandle>,
    next_id: u64,
    pending_close: VecDeque<(NativeHandleId, CloseCallback)>,
    stats: LoopStats,
}

impl LoopInner {
    fn handle_mut(&mut self, handle: NativeHandleId) -> &mut NativeHandle {
        match self.handles.get_mut(&handle) {
            Some(h) => h,
            None => fatal(ProtocolViolation::UnknownNativeHandle { native: handle }),
        }
    }

    fn handle(&self, handle: NativeHandleId) -> &NativeHandle {
        match self.handles.get(&handle) {
            Some(h) => h,
            None => fatal(ProtocolViolation::UnknownNativeHandle { native: handle }),
        }
    }

    fn is_alive(&self) -> bool {
        !self.pending_close.is_empty()
            || self
                .handles
                .values()
                .any(|h| h.referenced && h.active && !h.closing)
    }
}

/// Single-threaded reference loop
pub struct LocalLoop {
    inner: RefCell<LoopInner>,
}

impl LocalLoop {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            inner: RefCell::new(LoopInner {
                handles: AHashMap::new(),
                next_id: 1,
                pending_close: VecDeque::new(),
                stats: LoopStats::default(),
            }),
        })
    }

    /// Allocate a native handle: referenced, inactive
    pub fn init_handle(&self, provider: ProviderType) -> NativeHandleId {
        let mut inner = self.inner.borrow_mut();
        let id = NativeHandleId(inner.next_id);
        inner.next_id += 1;
        inner.handles.insert(
            id,
            NativeHandle {
                provider,
                referenced: true,
                active: false,
                closing: false,
            },
        );
        inner.stats.handles_initialized += 1;
        trace!(native = %id, provider = %provider, "native handle initialized");
        id
    }

    /// Register outstanding work on a handle (a started timer, a reading socket)
    pub fn start(&self, handle: NativeHandleId) {
        let mut inner = self.inner.borrow_mut();
        let h = inner.handle_mut(handle);
        if !h.closing {
            h.active = true;
        }
    }

    pub fn stop(&self, handle: NativeHandleId) {
        self.inner.borrow_mut().handle_mut(handle).active = false;
    }

    /// Handle still allocated (not yet completed its close)
    pub fn contains(&self, handle: NativeHandleId) -> bool {
        self.inner.borrow().handles.contains_key(&handle)
    }

    pub fn is_closing(&self, handle: NativeHandleId) -> bool {
        self.inner
            .borrow()
            .handles
            .get(&handle)
            .map(|h| h.closing)
            .unwrap_or(false)
    }

    pub fn provider(&self, handle: NativeHandleId) -> Option<ProviderType> {
        self.inner.borrow().handles.get(&handle).map(|h| h.provider)
    }

    pub fn pending_closes(&self) -> usize {
        self.inner.borrow().pending_close.len()
    }

    pub fn handle_count(&self) -> usize {
        self.inner.borrow().handles.len()
    }

    /// Referenced active handles or queued close completions remain
    pub fn is_alive(&self) -> bool {
        self.inner.borrow().is_alive()
    }

    /// Turn the loop until no close completions are queued
    pub fn run(&self) -> u64 {
        let mut turns = 0;
        while self.pending_closes() > 0 {
            self.run_nowait();
            turns += 1;
        }
        turns
    }

    pub fn stats(&self) -> LoopStats {
        self.inner.borrow().stats
    }

    /// Close phase: completions queued during this phase run next turn
    ///
    /// Entries are popped one at a time so a completion that unwinds leaves
    /// the rest of the batch queued for the following turn.
    fn run_close_phase(&self) -> usize {
        let count = self.inner.borrow().pending_close.len();

        for _ in 0..count {
            let next = {
                let mut inner = self.inner.borrow_mut();
                let next = inner.pending_close.pop_front();
                if let Some((handle, _)) = &next {
                    inner.handles.remove(handle);
                    inner.stats.close_completions += 1;
                }
                next
            };
            let Some((handle, on_close)) = next else {
                break;
            };
            trace!(native = %handle, "running close completion");
            on_close(handle);
        }

        count
    }
}

impl EventLoop for LocalLoop {
    fn close(&self, handle: NativeHandleId, on_close: CloseCallback) {
        let mut inner = self.inner.borrow_mut();
        let h = inner.handle_mut(handle);
        if h.closing {
            fatal(ProtocolViolation::DoubleCloseRequest { native: handle });
        }
        h.closing = true;
        h.active = false;
        inner.pending_close.push_back((handle, on_close));
        inner.stats.close_requests += 1;
        debug!(native = %handle, "native close queued");
    }

    fn ref_handle(&self, handle: NativeHandleId) {
        self.inner.borrow_mut().handle_mut(handle).referenced = true;
    }

    fn unref_handle(&self, handle: NativeHandleId) {
        self.inner.borrow_mut().handle_mut(handle).referenced = false;
    }

    fn has_ref(&self, handle: NativeHandleId) -> bool {
        self.inner.borrow().handle(handle).referenced
    }

    fn is_active(&self, handle: NativeHandleId) -> bool {
        let inner = self.inner.borrow();
        let h = inner.handle(handle);
        h.active && !h.closing
    }

    fn run_nowait(&self) -> bool {
        self.inner.borrow_mut().stats.turns += 1;
        self.run_close_phase();
        self.is_alive()
    }
}
