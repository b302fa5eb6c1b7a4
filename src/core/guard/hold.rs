/*!
 * Object Hold
 * Temporary strong reference on a managed object
 */

use super::{HoldError, HoldResult};
use crate::core::types::ObjectId;
use crate::runtime::ObjectHeap;
use std::rc::Rc;
use std::time::Instant;
use tracing::trace;

/// Scoped strong reference on a managed object
///
/// Unlike [`ObjectRef`](crate::runtime::ObjectRef) a hold can be taken on an
/// object the collector has already detached. Releasing the last hold on a
/// detached object frees it on the spot.
pub struct ObjectHold {
    heap: Rc<ObjectHeap>,
    object: ObjectId,
    acquired_at: Instant,
    active: bool,
}

impl ObjectHold {
    pub fn acquire(heap: &Rc<ObjectHeap>, object: ObjectId) -> HoldResult<Self> {
        if !heap.retain(object) {
            return Err(HoldError::ObjectGone(object));
        }
        trace!(object = %object, "object hold acquired");
        Ok(Self {
            heap: Rc::clone(heap),
            object,
            acquired_at: Instant::now(),
            active: true,
        })
    }

    #[inline]
    pub fn object(&self) -> ObjectId {
        self.object
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Release ahead of drop. Fails if already released.
    pub fn release(&mut self) -> HoldResult<()> {
        if !self.active {
            return Err(HoldError::AlreadyReleased(self.object));
        }
        self.active = false;
        self.heap.release(self.object);
        trace!(
            object = %self.object,
            held_micros = self.acquired_at.elapsed().as_micros() as u64,
            "object hold released"
        );
        Ok(())
    }
}

impl Drop for ObjectHold {
    fn drop(&mut self) {
        if self.active {
            let _ = self.release();
        }
    }
}
