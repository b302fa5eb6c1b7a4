/*!
 * Close Completion
 *
 * Runs on the event loop's turn once a requested native close finishes.
 *
 * Order is fixed:
 * 1. the wrapper must be `Closing`, anything else aborts
 * 2. a hold keeps the managed object alive until the handler returns
 * 3. the native handle is detached before any user code can run
 * 4. state becomes `Closed`
 * 5. the handle kind's own teardown
 * 6. registry removal
 * 7. the stashed close callback, at most once
 * 8. the hold is released; a detached object is freed right here
 */

use super::state::HandleState;
use super::wrap::HandleWrap;
use crate::config::WeakCallbackPolicy;
use crate::core::errors::{fatal, ProtocolViolation};
use crate::core::guard::ObjectHold;
use crate::core::types::{NativeHandleId, HANDLE_ONCLOSE_SYMBOL};
use crate::env::EnvShared;
use std::rc::Weak;
use tracing::{debug, debug_span};

pub(crate) fn on_close(env: &Weak<EnvShared>, wrap: &Weak<HandleWrap>, native: NativeHandleId) {
    let (Some(env), Some(wrap)) = (env.upgrade(), wrap.upgrade()) else {
        fatal(ProtocolViolation::MissingHandleData { native });
    };

    let _span = debug_span!(
        "handle_close",
        wrap = %wrap.id(),
        native = %native,
        provider = %wrap.provider()
    )
    .entered();

    let state = wrap.state();
    if state != HandleState::Closing {
        fatal(ProtocolViolation::UnexpectedCloseState {
            wrap: wrap.id(),
            observed: state.as_str(),
        });
    }

    let hold = match ObjectHold::acquire(&env.heap, wrap.object()) {
        Ok(hold) => hold,
        Err(_) => fatal(ProtocolViolation::MissingHandleData { native }),
    };

    match wrap.detach_native() {
        Some(attached) if attached == native => {}
        Some(_) => fatal(ProtocolViolation::MissingHandleData { native }),
        None => fatal(ProtocolViolation::NullNativeHandle {
            wrap: wrap.id(),
            state: state.as_str(),
        }),
    }

    wrap.set_state(HandleState::Closed);
    let unregister = Unregister { env: &env, wrap: &wrap };
    wrap.run_kind_on_close();
    drop(unregister);
    debug!("handle closed and unregistered");

    dispatch_close_callback(&env, &wrap);

    drop(hold);
}

/// Removes a `Closed` wrapper from the registry when dropped, including
/// while unwinding out of a panicking kind teardown
struct Unregister<'a> {
    env: &'a EnvShared,
    wrap: &'a HandleWrap,
}

impl Drop for Unregister<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.wrap.take_registry_key() {
            self.env.registry.borrow_mut().remove(key);
        }
    }
}

/// Run the stashed close callback, if one is present and deliverable
///
/// The slot is cleared either way. Whether a callback still runs after the
/// collector has claimed the object is the environment's
/// [`WeakCallbackPolicy`].
fn dispatch_close_callback(env: &EnvShared, wrap: &HandleWrap) {
    let object = wrap.object();
    let Some(callback) = env
        .heap
        .take_slot(object, HANDLE_ONCLOSE_SYMBOL)
        .and_then(|value| value.into_function())
    else {
        return;
    };

    let deliver = env.heap.is_held(object)
        || env.config.weak_callback_policy == WeakCallbackPolicy::Invoke;
    if !deliver {
        debug!("close callback dropped, object already claimed by the collector");
        return;
    }

    env.make_callback(wrap, &callback);
}
