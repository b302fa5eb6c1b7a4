/*!
 * Reference Gate Tests
 * ref / unref / hasRef forwarding and the exit-time leak predicate
 */

use crate::support::{counting_callback, Fixture};
use handle_wrap::{EventLoop, HandleState, ProviderType};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_ref_state_forwards_to_loop() {
    let fx = Fixture::new();
    let (_object, wrap, native) = fx.open(ProviderType::Timer);

    assert!(wrap.has_ref(), "fresh handles are referenced");
    wrap.unref_handle();
    assert!(!wrap.has_ref());
    assert!(!fx.event_loop.has_ref(native));

    wrap.ref_handle();
    assert!(wrap.has_ref());
    assert!(fx.event_loop.has_ref(native));
}

#[test]
fn test_closing_handle_still_reports_ref() {
    let fx = Fixture::new();
    let (_object, wrap, _native) = fx.open(ProviderType::TcpWrap);

    wrap.close(None);
    assert!(wrap.has_ref());
    wrap.unref_handle();
    assert!(!wrap.has_ref());
}

#[test]
fn test_closed_handle_ignores_ref_calls() {
    let fx = Fixture::new();
    let (_object, wrap, native) = fx.open(ProviderType::TcpWrap);
    wrap.close(None);
    fx.event_loop.run();
    assert!(!fx.event_loop.contains(native));

    // Forwarding any of these to the loop would abort on the freed handle
    wrap.ref_handle();
    wrap.unref_handle();
    assert!(!wrap.has_ref());
    assert!(!wrap.is_active());
}

#[test]
fn test_active_state_follows_loop() {
    let fx = Fixture::new();
    let (_object, wrap, native) = fx.open(ProviderType::Timer);

    assert!(!wrap.is_active());
    fx.event_loop.start(native);
    assert!(wrap.is_active());
    fx.event_loop.stop(native);
    assert!(!wrap.is_active());
}

#[test]
fn test_leak_predicate() {
    let fx = Fixture::new();
    let (object, wrap, native) = fx.open(ProviderType::Timer);

    // Idle handle
    assert!(wrap.is_not_indicative_of_memory_leak_at_exit());

    // Referenced, active, strongly held
    fx.event_loop.start(native);
    assert!(!wrap.is_not_indicative_of_memory_leak_at_exit());

    wrap.unref_handle();
    assert!(wrap.is_not_indicative_of_memory_leak_at_exit());
    wrap.ref_handle();

    // Only weakly reachable
    drop(object);
    assert!(wrap.is_not_indicative_of_memory_leak_at_exit());
}

#[test]
fn test_closed_handle_is_not_a_leak() {
    let fx = Fixture::new();
    let (_object, wrap, native) = fx.open(ProviderType::PipeWrap);
    fx.event_loop.start(native);
    wrap.close(None);
    fx.event_loop.run();

    assert_eq!(wrap.state(), HandleState::Closed);
    assert!(wrap.is_not_indicative_of_memory_leak_at_exit());
}

#[derive(Debug, Clone)]
enum Op {
    Close { with_callback: bool },
    Ref,
    Unref,
    HasRef,
    Turn,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(|with_callback| Op::Close { with_callback }),
        Just(Op::Ref),
        Just(Op::Unref),
        Just(Op::HasRef),
        Just(Op::Turn),
    ]
}

fn rank(state: HandleState) -> u8 {
    match state {
        HandleState::Initialized => 0,
        HandleState::Closing => 1,
        HandleState::Closed => 2,
    }
}

proptest! {
    #[test]
    fn prop_lifecycle_sequences(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let fx = Fixture::new();
        let (_object, wrap, _native) = fx.open(ProviderType::Timer);
        let (callback, calls) = counting_callback();

        let mut referenced = true;
        let mut first_close: Option<bool> = None;
        let mut last_rank = rank(wrap.state());

        for op in &ops {
            match op {
                Op::Close { with_callback } => {
                    if first_close.is_none() {
                        first_close = Some(*with_callback);
                    }
                    wrap.close(with_callback.then(|| callback.clone()));
                }
                Op::Ref => {
                    wrap.ref_handle();
                    if wrap.is_alive() {
                        referenced = true;
                    }
                }
                Op::Unref => {
                    wrap.unref_handle();
                    if wrap.is_alive() {
                        referenced = false;
                    }
                }
                Op::HasRef => {
                    let expected = wrap.is_alive() && referenced;
                    prop_assert_eq!(wrap.has_ref(), expected);
                }
                Op::Turn => {
                    fx.event_loop.run_nowait();
                }
            }

            let current = rank(wrap.state());
            prop_assert!(current >= last_rank, "state went backwards");
            last_rank = current;
            prop_assert!(calls.get() <= 1);
            if calls.get() == 1 {
                prop_assert_eq!(wrap.state(), HandleState::Closed);
            }
        }

        fx.event_loop.run();

        let expected_state = if first_close.is_some() {
            HandleState::Closed
        } else {
            HandleState::Initialized
        };
        prop_assert_eq!(wrap.state(), expected_state);
        prop_assert_eq!(calls.get(), usize::from(first_close == Some(true)));
        prop_assert!(fx.event_loop.stats().close_requests <= 1);
        prop_assert_eq!(fx.env.handle_count(), usize::from(first_close.is_none()));
    }
}
