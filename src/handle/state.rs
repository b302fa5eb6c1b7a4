/*!
 * Handle State
 * Three-state close lifecycle carried by every wrapper
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a handle wrapper
///
/// | State | Native handle valid | In registry |
/// |---|---|---|
/// | Initialized | yes | yes |
/// | Closing | yes | yes |
/// | Closed | no | no |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleState {
    Initialized,
    Closing,
    Closed,
}

impl HandleState {
    /// Native handle still owned by the wrapper
    #[inline]
    pub fn is_alive(self) -> bool {
        self != HandleState::Closed
    }

    /// Forward transitions of the close protocol
    ///
    /// `Initialized -> Closed` is only taken when a wrapper is parked before
    /// its native handle ever came up.
    pub fn can_transition_to(self, next: HandleState) -> bool {
        matches!(
            (self, next),
            (HandleState::Initialized, HandleState::Closing)
                | (HandleState::Closing, HandleState::Closed)
                | (HandleState::Initialized, HandleState::Closed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandleState::Initialized => "initialized",
            HandleState::Closing => "closing",
            HandleState::Closed => "closed",
        }
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
