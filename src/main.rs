/*!
 * Handle Wrap - Demo Entry Point
 *
 * Drives three lifecycles on the local event loop:
 * - explicit close with a callback
 * - an unreachable open handle closed by the collector
 * - close requested, then the object dropped before completion
 */

use anyhow::{Context, Result};
use handle_wrap::{
    init_tracing, register_module_references, BasicHandle, Callback, Environment,
    EnvironmentConfig, LocalLoop, ProviderType,
};
use std::cell::Cell;
use std::rc::Rc;
use tracing::info;

fn main() -> Result<()> {
    init_tracing();

    let config = EnvironmentConfig::from_env().context("invalid handle wrap configuration")?;
    info!(?config, "handle wrap demo starting");
    register_module_references();

    let event_loop = LocalLoop::new();
    let env = Environment::with_config(event_loop.clone(), config);

    explicit_close(&env, &event_loop)?;
    collector_close(&env, &event_loop)?;
    drop_while_closing(&env, &event_loop)?;

    let stats = env.teardown();
    info!(
        handles_closed = stats.handles_closed,
        remaining = stats.remaining,
        "demo finished"
    );
    Ok(())
}

/// Close with a callback and let the loop complete it
fn explicit_close(env: &Environment, event_loop: &Rc<LocalLoop>) -> Result<()> {
    let object = env.new_object();
    let native = event_loop.init_handle(ProviderType::TcpWrap);
    let wrap = env.wrap_handle(&object, native, Box::new(BasicHandle::new(ProviderType::TcpWrap)))?;

    let fired = Rc::new(Cell::new(false));
    let fired_in_callback = Rc::clone(&fired);
    wrap.close(Some(Callback::new(move |ctx| {
        info!(wrap = %ctx.wrap, provider = %ctx.provider, "close callback running");
        fired_in_callback.set(true);
        Ok(())
    })));
    info!(wrap = %wrap.id(), state = %wrap.state(), "close requested");

    event_loop.run();
    info!(
        wrap = %wrap.id(),
        state = %wrap.state(),
        callback_fired = fired.get(),
        registered = env.handle_count(),
        "explicit close finished"
    );
    Ok(())
}

/// Drop every reference to an open handle and run the collector
fn collector_close(env: &Environment, event_loop: &Rc<LocalLoop>) -> Result<()> {
    let object = env.new_object();
    let native = event_loop.init_handle(ProviderType::Timer);
    let wrap = env.wrap_handle(&object, native, Box::new(BasicHandle::new(ProviderType::Timer)))?;
    let wrap_id = wrap.id();
    let watch = object.downgrade();
    drop(wrap);
    drop(object);

    let collected = env.collect_garbage();
    info!(%wrap_id, deferred = collected.deferred, "collector found an open handle");

    event_loop.run();
    info!(
        %wrap_id,
        reclaimed = watch.is_reclaimed(),
        registered = env.handle_count(),
        "collector close finished"
    );
    Ok(())
}

/// Request a close, then lose the object before the completion runs
fn drop_while_closing(env: &Environment, event_loop: &Rc<LocalLoop>) -> Result<()> {
    let object = env.new_object();
    let native = event_loop.init_handle(ProviderType::PipeWrap);
    let wrap = env.wrap_handle(&object, native, Box::new(BasicHandle::new(ProviderType::PipeWrap)))?;
    let wrap_id = wrap.id();

    wrap.close(Some(Callback::new(move |ctx| {
        info!(wrap = %ctx.wrap, "close callback delivered to a collected object");
        Ok(())
    })));
    let watch = object.downgrade();
    drop(wrap);
    drop(object);

    env.collect_garbage();
    event_loop.run();
    info!(
        %wrap_id,
        reclaimed = watch.is_reclaimed(),
        policy = ?env.config().weak_callback_policy,
        "drop while closing finished"
    );
    Ok(())
}
