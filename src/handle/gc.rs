/*!
 * Collector Hook
 *
 * When the collector finds a wrapper's object unreachable, an open native
 * handle is closed first and reclamation waits for the close completion.
 */

use super::state::HandleState;
use super::wrap::HandleWrap;
use crate::runtime::{Finalizer, Reclaim};
use tracing::{debug, warn};

impl Finalizer for HandleWrap {
    fn on_gc_collect(&self) -> Reclaim {
        if self.state() == HandleState::Closed {
            return Reclaim::Now;
        }

        if !self.env_alive() {
            // Loop is gone with the environment; the native handle is left to its owner
            warn!(wrap = %self.id(), state = %self.state(), "unreachable handle outlived its environment");
            return Reclaim::Now;
        }

        // No-op when already closing
        self.close(None);
        debug!(
            wrap = %self.id(),
            object = %self.object(),
            provider = %self.provider(),
            "unreachable handle closed by collector, reclamation deferred"
        );
        Reclaim::Deferred
    }
}
