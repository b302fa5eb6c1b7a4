/*!
 * Core Module
 * Fundamental types, error handling and guards
 */

pub mod errors;
pub mod guard;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use guard::{HoldError, HoldResult, ObjectHold};
pub use types::*;
