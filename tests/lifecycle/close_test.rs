/*!
 * Close Tests
 * Explicit close, completion ordering and callback delivery
 */

use crate::support::{counting_callback, failing_callback, Fixture, RecordingKind};
use handle_wrap::{
    Callback, EventLoop, HandleState, HandleWrap, ObjectRef, ProviderType, HANDLE_ONCLOSE_SYMBOL,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

#[test]
fn test_explicit_close_with_callback() {
    let fx = Fixture::new();
    let (object, wrap, native) = fx.open(ProviderType::TcpWrap);
    let (callback, calls) = counting_callback();

    wrap.close(Some(callback));
    assert_eq!(wrap.state(), HandleState::Closing);
    assert_eq!(calls.get(), 0, "callback must not run before the loop turns");
    assert!(fx.env.heap().has_slot(object.id(), HANDLE_ONCLOSE_SYMBOL));
    assert_eq!(fx.env.handle_count(), 1);

    fx.event_loop.run_nowait();

    assert_eq!(wrap.state(), HandleState::Closed);
    assert_eq!(calls.get(), 1);
    assert_eq!(wrap.native_handle(), None);
    assert!(!wrap.in_registry());
    assert_eq!(fx.env.handle_count(), 0);
    assert!(!fx.event_loop.contains(native));
    assert!(!fx.env.heap().has_slot(object.id(), HANDLE_ONCLOSE_SYMBOL));
}

#[test]
fn test_ref_then_close_sequence() {
    let fx = Fixture::new();
    let (_object, wrap, native) = fx.open(ProviderType::Timer);
    let (callback, calls) = counting_callback();
    fx.event_loop.start(native);

    wrap.ref_handle();
    assert!(wrap.has_ref());
    assert!(wrap.is_active());

    wrap.close(Some(callback));
    assert_eq!(wrap.state(), HandleState::Closing);

    // A closing handle can no longer hold the loop open, whatever its ref flag
    wrap.ref_handle();
    assert!(!wrap.is_active());
    assert!(wrap.is_not_indicative_of_memory_leak_at_exit());
    wrap.unref_handle();

    fx.event_loop.run_nowait();
    assert_eq!(wrap.state(), HandleState::Closed);
    assert_eq!(calls.get(), 1);
    assert_eq!(fx.env.handle_count(), 0);
    assert!(!fx.event_loop.is_alive());
}

#[test]
fn test_close_without_callback() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open(ProviderType::Timer);

    wrap.close(None);
    assert!(!fx.env.heap().has_slot(object.id(), HANDLE_ONCLOSE_SYMBOL));

    fx.event_loop.run();
    assert_eq!(wrap.state(), HandleState::Closed);
    assert_eq!(fx.env.callback_errors(), 0);
}

#[test]
fn test_repeated_close_keeps_first_callback() {
    let fx = Fixture::new();
    let (_object, wrap, _native) = fx.open(ProviderType::PipeWrap);
    let (first, first_calls) = counting_callback();
    let (second, second_calls) = counting_callback();

    wrap.close(Some(first));
    wrap.close(Some(second));
    wrap.close(None);
    assert_eq!(fx.event_loop.stats().close_requests, 1);

    fx.event_loop.run();
    wrap.close(None);

    assert_eq!(first_calls.get(), 1);
    assert_eq!(second_calls.get(), 0);
    assert_eq!(fx.event_loop.stats().close_requests, 1);
    assert_eq!(fx.event_loop.stats().close_completions, 1);
    assert_eq!(wrap.state(), HandleState::Closed);
}

#[test]
fn test_callback_observes_closed_state() {
    let fx = Fixture::new();
    let (_object, wrap, _native) = fx.open(ProviderType::UdpWrap);
    let observed = Rc::new(RefCell::new(None));

    let weak_wrap = Rc::downgrade(&wrap);
    let env = fx.env.clone();
    let seen = observed.clone();
    wrap.close(Some(Callback::new(move |ctx| {
        let wrap = weak_wrap.upgrade().expect("wrapper alive during callback");
        assert_eq!(ctx.wrap, wrap.id());
        assert_eq!(ctx.receiver, wrap.object());
        *seen.borrow_mut() = Some((
            wrap.state(),
            wrap.native_handle(),
            wrap.in_registry(),
            env.handle_count(),
            env.heap().strong_count(ctx.receiver),
        ));
        Ok(())
    })));

    fx.event_loop.run();

    let (state, native, in_registry, registered, strong) =
        observed.borrow_mut().take().expect("callback ran");
    assert_eq!(state, HandleState::Closed);
    assert_eq!(native, None);
    assert!(!in_registry);
    assert_eq!(registered, 0);
    // The test's own reference plus the completion's hold
    assert_eq!(strong, 2);
}

#[test]
fn test_kind_teardown_runs_before_callback() {
    let fx = Fixture::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let (_object, wrap, _native) = fx.open_with(Box::new(RecordingKind {
        provider: ProviderType::SignalWrap,
        log: log.clone(),
        panic_on_close: false,
    }));

    let callback_log = log.clone();
    wrap.close(Some(Callback::new(move |_| {
        callback_log.borrow_mut().push("callback");
        Ok(())
    })));
    fx.event_loop.run();

    assert_eq!(*log.borrow(), vec!["kind_on_close", "callback"]);
}

#[test]
fn test_failing_callback_is_counted() {
    let fx = Fixture::new();
    let (_object, wrap, _native) = fx.open(ProviderType::TtyWrap);

    wrap.close(Some(failing_callback()));
    fx.event_loop.run();

    assert_eq!(wrap.state(), HandleState::Closed);
    assert_eq!(fx.env.callback_errors(), 1);
    assert_eq!(fx.env.handle_count(), 0);
}

#[test]
fn test_reentrant_calls_inside_callback() {
    let fx = Fixture::new();
    let (_object, wrap, _native) = fx.open(ProviderType::Timer);
    let nested: Rc<RefCell<Option<(ObjectRef, Rc<HandleWrap>)>>> = Rc::new(RefCell::new(None));

    let weak_wrap = Rc::downgrade(&wrap);
    let env = fx.env.clone();
    let event_loop = fx.event_loop.clone();
    let nested_slot = nested.clone();
    wrap.close(Some(Callback::new(move |_| {
        let wrap = weak_wrap.upgrade().expect("wrapper alive during callback");
        wrap.close(None);
        wrap.ref_handle();
        wrap.unref_handle();
        assert!(!wrap.has_ref());
        env.collect_garbage();

        // A handle opened and closed from inside a completion
        let object = env.new_object();
        let native = event_loop.init_handle(ProviderType::Check);
        let inner = env
            .wrap_handle(
                &object,
                native,
                Box::new(handle_wrap::BasicHandle::new(ProviderType::Check)),
            )
            .expect("wrap nested handle");
        inner.close(None);
        *nested_slot.borrow_mut() = Some((object, inner));
        Ok(())
    })));

    fx.event_loop.run_nowait();
    assert_eq!(wrap.state(), HandleState::Closed);

    let (_nested_object, inner) = nested.borrow_mut().take().expect("callback ran");
    assert_eq!(inner.state(), HandleState::Closing);
    assert_eq!(fx.env.handle_count(), 1);

    fx.event_loop.run_nowait();
    assert_eq!(inner.state(), HandleState::Closed);
    assert_eq!(fx.env.handle_count(), 0);
}

#[test]
fn test_panicking_kind_releases_hold() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open_with(Box::new(RecordingKind {
        provider: ProviderType::ProcessWrap,
        log: Rc::new(RefCell::new(Vec::new())),
        panic_on_close: true,
    }));
    let id = object.id();
    wrap.close(None);
    assert_eq!(fx.env.heap().strong_count(id), 1);

    let result = catch_unwind(AssertUnwindSafe(|| {
        fx.event_loop.run_nowait();
    }));

    assert!(result.is_err());
    assert_eq!(wrap.state(), HandleState::Closed);
    assert_eq!(fx.env.heap().strong_count(id), 1);
    assert!(!wrap.in_registry());
    assert_eq!(fx.env.handle_count(), 0);
}

#[test]
fn test_panicking_callback_releases_hold() {
    let fx = Fixture::new();
    let (object, wrap, _native) = fx.open(ProviderType::FsEventWrap);
    let id = object.id();

    wrap.close(Some(Callback::new(|_| panic!("listener blew up"))));
    let result = catch_unwind(AssertUnwindSafe(|| {
        fx.event_loop.run_nowait();
    }));

    assert!(result.is_err());
    assert_eq!(wrap.state(), HandleState::Closed);
    assert_eq!(fx.env.heap().strong_count(id), 1);
    assert!(!fx.env.heap().has_slot(id, HANDLE_ONCLOSE_SYMBOL));
}

#[test]
fn test_panicking_callback_does_not_strand_other_closes() {
    let fx = Fixture::new();
    let (_first_obj, first, _) = fx.open(ProviderType::TcpWrap);
    let (_second_obj, second, _) = fx.open(ProviderType::Timer);

    first.close(Some(Callback::new(|_| panic!("listener blew up"))));
    second.close(None);
    let result = catch_unwind(AssertUnwindSafe(|| {
        fx.event_loop.run_nowait();
    }));

    assert!(result.is_err());
    assert_eq!(first.state(), HandleState::Closed);
    assert_eq!(second.state(), HandleState::Closing);

    let stats = fx.env.run_cleanup();
    assert!(stats.is_complete());
    assert_eq!(second.state(), HandleState::Closed);
    assert_eq!(fx.env.handle_count(), 0);
}

#[test]
fn test_unwinding_completion_frees_detached_object() {
    let fx = Fixture::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let (object, wrap, _native) = fx.open_with(Box::new(RecordingKind {
        provider: ProviderType::Idle,
        log: log.clone(),
        panic_on_close: true,
    }));
    let watch = object.downgrade();
    drop(wrap);
    drop(object);

    assert_eq!(fx.env.collect_garbage().deferred, 1);
    assert!(!watch.is_reclaimed());

    let result = catch_unwind(AssertUnwindSafe(|| {
        fx.event_loop.run_nowait();
    }));

    assert!(result.is_err());
    assert_eq!(*log.borrow(), vec!["kind_on_close"]);
    assert!(watch.is_reclaimed());
}
