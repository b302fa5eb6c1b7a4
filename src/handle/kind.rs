/*!
 * Handle Kinds
 * Extension point for concrete handle types built on the wrapper
 */

use crate::core::types::ProviderType;

/// Per-kind behaviour of a wrapped native handle
///
/// Concrete handle types (timers, sockets, pipes) implement this to release
/// kind-specific state once the native close has completed.
pub trait HandleKind {
    /// Provider tag used in logs and reports
    fn provider(&self) -> ProviderType;

    /// Kind-specific teardown.
    ///
    /// Runs inside the close completion after the native handle has been
    /// detached and the state is `Closed`, before the user callback.
    fn on_close(&mut self) {}
}

/// Kind with no teardown of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicHandle {
    provider: ProviderType,
}

impl BasicHandle {
    pub fn new(provider: ProviderType) -> Self {
        Self { provider }
    }
}

impl HandleKind for BasicHandle {
    fn provider(&self) -> ProviderType {
        self.provider
    }
}
