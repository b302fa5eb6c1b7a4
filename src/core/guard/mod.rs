/*!
 * Scoped Holds
 *
 * RAII ownership used while native code runs against a managed object.
 *
 * - **ObjectHold**: temporary strong reference that outlives collector
 *   detachment and is released on every exit path, unwinding included
 *
 * ```ignore
 * let hold = ObjectHold::acquire(&heap, object)?;
 * // object cannot be reclaimed here, even if it was detached
 * drop(hold); // may free a detached object immediately
 * ```
 */

mod hold;

pub use hold::ObjectHold;

use crate::core::types::ObjectId;

pub type HoldResult<T> = Result<T, HoldError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoldError {
    #[error("hold on {0} already released")]
    AlreadyReleased(ObjectId),

    #[error("{0} was reclaimed before it could be held")]
    ObjectGone(ObjectId),
}
