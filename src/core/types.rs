/*!
 * Core Types
 * Identifiers and small value types shared by the handle lifecycle
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wrapper identifier, unique within one environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WrapId(pub u64);

impl fmt::Display for WrapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wrap#{}", self.0)
    }
}

/// Managed object identifier
///
/// Slots in the object heap are reused; the generation tells a reclaimed
/// object apart from whatever later occupies the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}.{}", self.index, self.generation)
    }
}

/// Opaque native handle identifier issued by the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeHandleId(pub u64);

impl fmt::Display for NativeHandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native#{}", self.0)
    }
}

/// Kind of native resource behind a wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Timer,
    TcpWrap,
    PipeWrap,
    UdpWrap,
    TtyWrap,
    SignalWrap,
    ProcessWrap,
    FsEventWrap,
    Check,
    Idle,
    Prepare,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Timer => "timer",
            ProviderType::TcpWrap => "tcp_wrap",
            ProviderType::PipeWrap => "pipe_wrap",
            ProviderType::UdpWrap => "udp_wrap",
            ProviderType::TtyWrap => "tty_wrap",
            ProviderType::SignalWrap => "signal_wrap",
            ProviderType::ProcessWrap => "process_wrap",
            ProviderType::FsEventWrap => "fs_event_wrap",
            ProviderType::Check => "check",
            ProviderType::Idle => "idle",
            ProviderType::Prepare => "prepare",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named slot key on a managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(&'static str);

impl Symbol {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// Slot that holds a pending close callback
pub const HANDLE_ONCLOSE_SYMBOL: Symbol = Symbol::new("handle_onclose");

/// Common result type for handle operations
pub type HandleResult<T> = Result<T, super::errors::HandleError>;
