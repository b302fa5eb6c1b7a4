/*!
 * Collector Tests
 * Unreachable objects with open, closing and closed handles
 */

use crate::support::{counting_callback, Fixture};
use handle_wrap::{
    EnvironmentConfig, EventLoop, HandleError, HandleState, ProviderType, WeakCallbackPolicy,
};
use pretty_assertions::assert_eq;
use std::rc::Rc;

#[test]
fn test_collector_closes_open_handle() {
    let fx = Fixture::new();
    let (object, wrap, native) = fx.open(ProviderType::Timer);
    fx.event_loop.start(native);

    let watch = object.downgrade();
    let weak_wrap = Rc::downgrade(&wrap);
    drop(wrap);
    drop(object);

    let collected = fx.env.collect_garbage();
    assert_eq!(collected.examined, 1);
    assert_eq!(collected.deferred, 1);
    assert_eq!(collected.reclaimed, 0);

    // Reclamation waits for the close completion
    let wrap = weak_wrap.upgrade().expect("wrapper survives until close completes");
    assert_eq!(wrap.state(), HandleState::Closing);
    assert!(fx.env.heap().is_detached(watch.id()));
    assert!(!watch.is_reclaimed());
    assert!(watch.upgrade().is_none(), "collected object cannot be resurrected");
    assert!(fx.event_loop.is_closing(native));
    drop(wrap);

    fx.event_loop.run_nowait();

    assert!(watch.is_reclaimed());
    assert!(weak_wrap.upgrade().is_none());
    assert_eq!(fx.env.handle_count(), 0);
    assert_eq!(fx.env.heap().live_count(), 0);
    assert!(!fx.event_loop.contains(native));
}

#[test]
fn test_collector_runs_hook_once() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open(ProviderType::Prepare);
    drop(wrap);
    drop(object);

    assert_eq!(fx.env.collect_garbage().deferred, 1);
    let second = fx.env.collect_garbage();
    assert_eq!(second.examined, 0);
    assert_eq!(fx.event_loop.stats().close_requests, 1);

    fx.event_loop.run();
    assert_eq!(fx.env.heap().live_count(), 0);
}

#[test]
fn test_reachable_object_is_left_alone() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open(ProviderType::TcpWrap);

    let collected = fx.env.collect_garbage();
    assert_eq!(collected.examined, 0);
    assert_eq!(wrap.state(), HandleState::Initialized);
    assert!(fx.env.heap().is_held(object.id()));
    assert_eq!(fx.event_loop.pending_closes(), 0);
}

#[test]
fn test_collector_after_close_reclaims_immediately() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open(ProviderType::PipeWrap);
    wrap.close(None);
    fx.event_loop.run();
    assert_eq!(wrap.state(), HandleState::Closed);

    let watch = object.downgrade();
    let weak_wrap = Rc::downgrade(&wrap);
    drop(wrap);
    drop(object);

    let collected = fx.env.collect_garbage();
    assert_eq!(collected.reclaimed, 1);
    assert_eq!(collected.deferred, 0);
    assert!(watch.is_reclaimed());
    assert!(weak_wrap.upgrade().is_none());
    assert_eq!(fx.event_loop.pending_closes(), 0);
}

#[test]
fn test_object_dropped_while_closing_skips_callback() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open(ProviderType::UdpWrap);
    let (callback, calls) = counting_callback();

    wrap.close(Some(callback));
    let watch = object.downgrade();
    drop(wrap);
    drop(object);

    let collected = fx.env.collect_garbage();
    assert_eq!(collected.deferred, 1);
    assert_eq!(fx.event_loop.stats().close_requests, 1);

    fx.event_loop.run();

    assert_eq!(calls.get(), 0);
    assert!(watch.is_reclaimed());
    assert_eq!(fx.env.handle_count(), 0);
}

#[test]
fn test_invoke_policy_runs_callback_for_collected_object() {
    let fx = Fixture::with_config(
        EnvironmentConfig::default().with_weak_callback_policy(WeakCallbackPolicy::Invoke),
    );
    let (object, wrap, _native) = fx.open(ProviderType::UdpWrap);
    let (callback, calls) = counting_callback();

    wrap.close(Some(callback));
    let watch = object.downgrade();
    drop(wrap);
    drop(object);

    fx.env.collect_garbage();
    fx.event_loop.run();

    assert_eq!(calls.get(), 1);
    assert!(watch.is_reclaimed());
}

#[test]
fn test_close_on_collected_object_drops_callback() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open(ProviderType::SignalWrap);
    let (callback, calls) = counting_callback();

    let watch = object.downgrade();
    drop(object);
    fx.env.collect_garbage();
    assert_eq!(wrap.state(), HandleState::Closing);

    // Already closing: ignored along with its callback
    wrap.close(Some(callback));
    drop(wrap);
    fx.event_loop.run();

    assert_eq!(calls.get(), 0);
    assert!(watch.is_reclaimed());
}

#[test]
fn test_parked_wrapper_is_reclaimed_immediately() {
    let fx = Fixture::new();
    let (object, wrap, native) = fx.open(ProviderType::Check);
    wrap.mark_as_uninitialized().expect("park wrapper");
    assert_eq!(fx.env.handle_count(), 0);

    let watch = object.downgrade();
    drop(wrap);
    drop(object);

    let collected = fx.env.collect_garbage();
    assert_eq!(collected.reclaimed, 1);
    assert!(watch.is_reclaimed());
    // The native handle was never handed to the wrapper's close protocol
    assert!(fx.event_loop.contains(native));
    assert_eq!(fx.event_loop.stats().close_requests, 0);
}

#[test]
fn test_parked_wrapper_cannot_revive_after_collection() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open(ProviderType::Check);
    wrap.mark_as_uninitialized().expect("park wrapper");

    let object_id = object.id();
    drop(object);
    assert_eq!(fx.env.collect_garbage().reclaimed, 1);

    let native = fx.event_loop.init_handle(ProviderType::Check);
    let result = wrap.mark_as_initialized(native);

    assert!(matches!(result, Err(HandleError::ObjectReclaimed(id)) if id == object_id));
    assert_eq!(wrap.state(), HandleState::Closed);
    assert!(!wrap.in_registry());
    assert_eq!(fx.env.handle_count(), 0);

    wrap.close(None);
    assert_eq!(fx.event_loop.stats().close_requests, 0);
}
