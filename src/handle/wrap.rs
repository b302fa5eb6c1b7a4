/*!
 * Handle Wrapper
 *
 * Pairs one native event-loop handle with one managed object and drives the
 * close protocol between them.
 *
 * # Ownership
 *
 * The managed object owns the wrapper through its internal field; the
 * wrapper is freed only when the object is reclaimed. The wrapper owns the
 * native handle until the close completion detaches it.
 *
 * # Gating
 *
 * `ref`, `unref` and `has_ref` touch the native handle only while the state
 * is not `Closed`. `close` acts only from `Initialized`.
 */

use super::completion;
use super::kind::HandleKind;
use super::registry::RegistryKey;
use super::state::HandleState;
use crate::core::errors::{fatal, HandleError, ProtocolViolation};
use crate::core::types::{
    HandleResult, NativeHandleId, ObjectId, ProviderType, WrapId, HANDLE_ONCLOSE_SYMBOL,
};
use crate::env::{EnvShared, Environment};
use crate::runtime::{Callback, Finalizer, ObjectRef, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Lifecycle wrapper around a native handle
pub struct HandleWrap {
    id: WrapId,
    env: Weak<EnvShared>,
    this: Weak<HandleWrap>,
    object: ObjectId,
    provider: ProviderType,
    state: Cell<HandleState>,
    native: Cell<Option<NativeHandleId>>,
    registry_key: Cell<Option<RegistryKey>>,
    close_requested: Cell<bool>,
    kind: RefCell<Box<dyn HandleKind>>,
}

impl HandleWrap {
    /// Create a wrapper in `Initialized`, attach it to `object` and register it
    pub(crate) fn new(
        env: &Environment,
        object: &ObjectRef,
        native: NativeHandleId,
        kind: Box<dyn HandleKind>,
    ) -> HandleResult<Rc<Self>> {
        let shared = env.shared();
        if !Rc::ptr_eq(object.heap(), &shared.heap) {
            return Err(HandleError::ForeignObject(object.id()));
        }

        let provider = kind.provider();
        let wrap = Rc::new_cyclic(|this| HandleWrap {
            id: shared.next_wrap_id(),
            env: Rc::downgrade(shared),
            this: this.clone(),
            object: object.id(),
            provider,
            state: Cell::new(HandleState::Initialized),
            native: Cell::new(Some(native)),
            registry_key: Cell::new(None),
            close_requested: Cell::new(false),
            kind: RefCell::new(kind),
        });

        shared.heap.set_internal(
            object.id(),
            Rc::clone(&wrap) as Rc<dyn Any>,
            Some(Rc::clone(&wrap) as Rc<dyn Finalizer>),
        )?;

        let key = shared.registry.borrow_mut().push_back(Rc::downgrade(&wrap));
        wrap.registry_key.set(Some(key));

        debug!(
            wrap = %wrap.id,
            object = %wrap.object,
            native = %native,
            provider = %provider,
            "handle wrapper created"
        );
        Ok(wrap)
    }

    #[inline]
    pub fn id(&self) -> WrapId {
        self.id
    }

    /// Managed object this wrapper is attached to
    #[inline]
    pub fn object(&self) -> ObjectId {
        self.object
    }

    #[inline]
    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    #[inline]
    pub fn state(&self) -> HandleState {
        self.state.get()
    }

    /// Native handle, `None` once the close has completed
    #[inline]
    pub fn native_handle(&self) -> Option<NativeHandleId> {
        self.native.get()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state.get().is_alive()
    }

    pub fn in_registry(&self) -> bool {
        self.registry_key.get().is_some()
    }

    /// Request the asynchronous close of the native handle
    ///
    /// Only the first call from `Initialized` does anything; later calls,
    /// and their callbacks, are ignored. The state is `Closing` on return.
    /// `callback` runs once, after the completion has moved the state to
    /// `Closed`.
    pub fn close(&self, callback: Option<Callback>) {
        let state = self.state.get();
        if state != HandleState::Initialized {
            trace!(wrap = %self.id, state = %state, "close ignored");
            return;
        }

        let Some(env) = self.env.upgrade() else {
            warn!(wrap = %self.id, "close requested after environment teardown");
            return;
        };

        let native = self.require_native();
        let env_ref = Rc::downgrade(&env);
        let wrap_ref = self.this.clone();
        env.event_loop.close(
            native,
            Box::new(move |handle| completion::on_close(&env_ref, &wrap_ref, handle)),
        );
        self.state.set(HandleState::Closing);
        self.close_requested.set(true);

        if let Some(callback) = callback {
            if env.heap.is_held(self.object) {
                env.heap
                    .set_slot(self.object, HANDLE_ONCLOSE_SYMBOL, Value::Function(callback));
            }
        }

        debug!(
            wrap = %self.id,
            native = %native,
            provider = %self.provider,
            "close requested"
        );
    }

    /// Make the native handle keep the loop alive
    pub fn ref_handle(&self) {
        if let Some((env, native)) = self.live_native() {
            env.event_loop.ref_handle(native);
        }
    }

    /// Let the loop exit even while this handle is active
    pub fn unref_handle(&self) {
        if let Some((env, native)) = self.live_native() {
            env.event_loop.unref_handle(native);
        }
    }

    /// Whether the native handle keeps the loop alive; false once closed
    pub fn has_ref(&self) -> bool {
        self.live_native()
            .map(|(env, native)| env.event_loop.has_ref(native))
            .unwrap_or(false)
    }

    /// Whether the native handle has work registered with the loop
    pub fn is_active(&self) -> bool {
        self.live_native()
            .map(|(env, native)| env.event_loop.is_active(native))
            .unwrap_or(false)
    }

    /// True when this handle being open at exit is intentional: its object
    /// is weakly held, or the handle is unreferenced, or it is idle
    pub fn is_not_indicative_of_memory_leak_at_exit(&self) -> bool {
        let Some(env) = self.env.upgrade() else {
            return true;
        };
        if env.heap.is_weak_or_detached(self.object) {
            return true;
        }
        match self.live_native() {
            Some((env, native)) => {
                !env.event_loop.has_ref(native) || !env.event_loop.is_active(native)
            }
            None => true,
        }
    }

    /// Park a wrapper whose native handle never came up
    ///
    /// Removes it from the registry and moves it to `Closed` without a
    /// native close request.
    pub fn mark_as_uninitialized(&self) -> HandleResult<()> {
        let state = self.state.get();
        if state != HandleState::Initialized || self.close_requested.get() {
            return Err(HandleError::InvalidTransition {
                from: state.to_string(),
                to: HandleState::Closed.to_string(),
            });
        }
        let env = self.env.upgrade().ok_or(HandleError::EnvironmentGone)?;

        if let Some(key) = self.registry_key.take() {
            env.registry.borrow_mut().remove(key);
        }
        self.native.set(None);
        self.state.set(HandleState::Closed);

        debug!(wrap = %self.id, "handle wrapper marked uninitialized");
        Ok(())
    }

    /// Bring a parked wrapper up with its native handle
    ///
    /// Only valid for a wrapper parked by [`mark_as_uninitialized`] whose
    /// object the collector has not claimed; a wrapper whose close was ever
    /// requested stays closed.
    ///
    /// [`mark_as_uninitialized`]: HandleWrap::mark_as_uninitialized
    pub fn mark_as_initialized(&self, native: NativeHandleId) -> HandleResult<()> {
        let state = self.state.get();
        if state != HandleState::Closed || self.close_requested.get() {
            return Err(HandleError::InvalidTransition {
                from: state.to_string(),
                to: HandleState::Initialized.to_string(),
            });
        }
        let env = self.env.upgrade().ok_or(HandleError::EnvironmentGone)?;
        if !env.heap.is_held(self.object) {
            return Err(HandleError::ObjectReclaimed(self.object));
        }

        let key = env.registry.borrow_mut().push_back(self.this.clone());
        self.registry_key.set(Some(key));
        self.native.set(Some(native));
        self.state.set(HandleState::Initialized);

        debug!(wrap = %self.id, native = %native, "handle wrapper marked initialized");
        Ok(())
    }

    /// Environment and native handle, while the handle is alive
    fn live_native(&self) -> Option<(Rc<EnvShared>, NativeHandleId)> {
        if !self.is_alive() {
            trace!(wrap = %self.id, "native handle access ignored on closed handle");
            return None;
        }
        let env = self.env.upgrade()?;
        Some((env, self.require_native()))
    }

    fn require_native(&self) -> NativeHandleId {
        match self.native.get() {
            Some(native) => native,
            None => fatal(ProtocolViolation::NullNativeHandle {
                wrap: self.id,
                state: self.state.get().as_str(),
            }),
        }
    }

    pub(super) fn detach_native(&self) -> Option<NativeHandleId> {
        self.native.take()
    }

    pub(super) fn set_state(&self, state: HandleState) {
        debug_assert!(
            self.state.get().can_transition_to(state),
            "{} cannot move from {} to {}",
            self.id,
            self.state.get(),
            state
        );
        self.state.set(state);
    }

    pub(super) fn take_registry_key(&self) -> Option<RegistryKey> {
        self.registry_key.take()
    }

    pub(super) fn run_kind_on_close(&self) {
        self.kind.borrow_mut().on_close();
    }

    pub(super) fn env_alive(&self) -> bool {
        self.env.strong_count() > 0
    }
}

impl fmt::Debug for HandleWrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleWrap")
            .field("id", &self.id)
            .field("object", &self.object)
            .field("provider", &self.provider)
            .field("state", &self.state.get())
            .field("native", &self.native.get())
            .finish()
    }
}
