/*!
 * Managed Object Heap
 *
 * Reference-counted stand-in for a garbage-collected object model.
 *
 * # Reachability
 *
 * - **Strong**: every live [`ObjectRef`] and every scoped hold counts as one
 *   strong reference
 * - **Weakly held**: strong count is zero; the object lingers until the next
 *   [`ObjectHeap::collect`] pass
 * - **Detached**: the collector offered the object for reclamation and its
 *   [`Finalizer`] deferred; the collector no longer owns it and it is freed
 *   the moment its strong count next drops to zero
 *
 * The pre-reclamation hook fires at most once per object.
 */

use crate::core::errors::HandleError;
use crate::core::limits::DEFAULT_HEAP_CAPACITY;
use crate::core::types::{HandleResult, ObjectId, Symbol};
use crate::runtime::value::Value;
use ahash::AHashMap;
use serde::Serialize;
use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Decision returned by the pre-reclamation hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    /// Free the object now
    Now,
    /// Keep the storage; the object is freed once its last hold drops
    Deferred,
}

/// Pre-reclamation hook attached to an object's internal field
pub trait Finalizer {
    /// Called once, when the collector finds the object unreachable
    fn on_gc_collect(&self) -> Reclaim;
}

/// Heap counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub allocated: u64,
    pub reclaimed: u64,
    pub deferred: u64,
    pub live: usize,
}

/// Result of one collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    pub examined: usize,
    pub reclaimed: usize,
    pub deferred: usize,
}

struct InternalField {
    value: Rc<dyn Any>,
    finalizer: Option<Rc<dyn Finalizer>>,
}

struct ManagedObject {
    strong: usize,
    detached: bool,
    finalized: bool,
    slots: AHashMap<Symbol, Value>,
    internal: Option<InternalField>,
}

impl ManagedObject {
    fn new() -> Self {
        Self {
            strong: 1,
            detached: false,
            finalized: false,
            slots: AHashMap::new(),
            internal: None,
        }
    }
}

struct Entry {
    generation: u32,
    object: Option<ManagedObject>,
}

struct HeapInner {
    entries: Vec<Entry>,
    free: Vec<u32>,
    stats: HeapStats,
}

impl HeapInner {
    fn get(&self, id: ObjectId) -> Option<&ManagedObject> {
        self.entries
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.object.as_ref())
    }

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut ManagedObject> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.object.as_mut())
    }

    /// Vacate the slot and hand the object back so it drops outside the borrow
    fn remove(&mut self, id: ObjectId) -> Option<ManagedObject> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let object = entry.object.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.stats.reclaimed += 1;
        self.stats.live -= 1;
        Some(object)
    }
}

/// Managed object heap for one environment
pub struct ObjectHeap {
    inner: RefCell<HeapInner>,
}

impl ObjectHeap {
    pub fn new() -> Rc<Self> {
        Self::with_capacity(DEFAULT_HEAP_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Rc<Self> {
        Rc::new(Self {
            inner: RefCell::new(HeapInner {
                entries: Vec::with_capacity(capacity),
                free: Vec::new(),
                stats: HeapStats::default(),
            }),
        })
    }

    /// Allocate an object; the returned reference is its only strong one
    pub fn allocate(self: &Rc<Self>) -> ObjectRef {
        let mut inner = self.inner.borrow_mut();
        let id = match inner.free.pop() {
            Some(index) => {
                let entry = &mut inner.entries[index as usize];
                entry.object = Some(ManagedObject::new());
                ObjectId {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                let index = inner.entries.len() as u32;
                inner.entries.push(Entry {
                    generation: 0,
                    object: Some(ManagedObject::new()),
                });
                ObjectId {
                    index,
                    generation: 0,
                }
            }
        };
        inner.stats.allocated += 1;
        inner.stats.live += 1;
        drop(inner);

        trace!(object = %id, "allocated managed object");
        ObjectRef {
            heap: Rc::clone(self),
            id,
        }
    }

    /// Object storage still exists
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.inner.borrow().get(id).is_some()
    }

    /// Object is alive and still owned by the collector (not detached)
    pub fn is_held(&self, id: ObjectId) -> bool {
        self.inner
            .borrow()
            .get(id)
            .map(|o| !o.detached)
            .unwrap_or(false)
    }

    /// Object is only weakly reachable, already detached, or gone
    pub fn is_weak_or_detached(&self, id: ObjectId) -> bool {
        self.inner
            .borrow()
            .get(id)
            .map(|o| o.strong == 0 || o.detached)
            .unwrap_or(true)
    }

    pub fn is_detached(&self, id: ObjectId) -> bool {
        self.inner
            .borrow()
            .get(id)
            .map(|o| o.detached)
            .unwrap_or(false)
    }

    pub fn strong_count(&self, id: ObjectId) -> usize {
        self.inner.borrow().get(id).map(|o| o.strong).unwrap_or(0)
    }

    /// Attach native state and its pre-reclamation hook to an object
    pub fn set_internal(
        &self,
        id: ObjectId,
        value: Rc<dyn Any>,
        finalizer: Option<Rc<dyn Finalizer>>,
    ) -> HandleResult<()> {
        let mut inner = self.inner.borrow_mut();
        let object = inner.get_mut(id).ok_or(HandleError::ObjectReclaimed(id))?;
        if object.internal.is_some() {
            return Err(HandleError::AlreadyWrapped(id));
        }
        object.internal = Some(InternalField { value, finalizer });
        Ok(())
    }

    /// Internal field of a live object
    pub fn internal(&self, id: ObjectId) -> Option<Rc<dyn Any>> {
        self.inner
            .borrow()
            .get(id)
            .and_then(|o| o.internal.as_ref())
            .map(|f| Rc::clone(&f.value))
    }

    /// Store a value in a named slot. Returns false if the object is gone.
    pub fn set_slot(&self, id: ObjectId, key: Symbol, value: Value) -> bool {
        let previous = {
            let mut inner = self.inner.borrow_mut();
            match inner.get_mut(id) {
                Some(object) => object.slots.insert(key, value),
                None => return false,
            }
        };
        drop(previous);
        true
    }

    pub fn has_slot(&self, id: ObjectId, key: Symbol) -> bool {
        self.inner
            .borrow()
            .get(id)
            .map(|o| o.slots.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn get_slot(&self, id: ObjectId, key: Symbol) -> Option<Value> {
        self.inner
            .borrow()
            .get(id)
            .and_then(|o| o.slots.get(&key).cloned())
    }

    /// Remove and return a slot's value
    pub fn take_slot(&self, id: ObjectId, key: Symbol) -> Option<Value> {
        self.inner
            .borrow_mut()
            .get_mut(id)
            .and_then(|o| o.slots.remove(&key))
    }

    /// Add a strong reference. Succeeds on detached objects too.
    pub(crate) fn retain(&self, id: ObjectId) -> bool {
        match self.inner.borrow_mut().get_mut(id) {
            Some(object) => {
                object.strong += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a strong reference; a detached object with no references left
    /// is freed immediately
    pub(crate) fn release(&self, id: ObjectId) {
        let freed = {
            let mut inner = self.inner.borrow_mut();
            let Some(object) = inner.get_mut(id) else {
                return;
            };
            object.strong = object.strong.saturating_sub(1);
            let unreferenced = object.strong == 0 && object.detached;
            if unreferenced {
                inner.remove(id)
            } else {
                None
            }
        };

        if freed.is_some() {
            debug!(object = %id, "reclaimed detached object");
        }
        drop(freed);
    }

    /// Run one collection pass over every unreachable object
    ///
    /// Each candidate's hook runs with no heap borrow held, so hooks may
    /// re-enter the heap.
    pub fn collect(&self) -> CollectStats {
        let candidates: Vec<(ObjectId, Option<Rc<dyn Finalizer>>)> = {
            let mut inner = self.inner.borrow_mut();
            let mut found = Vec::new();
            for (index, entry) in inner.entries.iter_mut().enumerate() {
                let generation = entry.generation;
                if let Some(object) = entry.object.as_mut() {
                    if object.strong == 0 && !object.detached && !object.finalized {
                        object.finalized = true;
                        let finalizer = object
                            .internal
                            .as_ref()
                            .and_then(|f| f.finalizer.clone());
                        found.push((
                            ObjectId {
                                index: index as u32,
                                generation,
                            },
                            finalizer,
                        ));
                    }
                }
            }
            found
        };

        let mut stats = CollectStats {
            examined: candidates.len(),
            ..Default::default()
        };

        for (id, finalizer) in candidates {
            let decision = finalizer
                .map(|f| f.on_gc_collect())
                .unwrap_or(Reclaim::Now);

            match decision {
                Reclaim::Now => {
                    // The hook never fires twice, so an object it resurrected is
                    // detached and freed by its last release instead
                    let freed = {
                        let mut inner = self.inner.borrow_mut();
                        let unreferenced = match inner.get_mut(id) {
                            Some(object) if object.strong > 0 => {
                                object.detached = true;
                                false
                            }
                            Some(_) => true,
                            None => false,
                        };
                        if unreferenced {
                            inner.remove(id)
                        } else {
                            None
                        }
                    };
                    if freed.is_some() {
                        stats.reclaimed += 1;
                        trace!(object = %id, "collector reclaimed object");
                    }
                    drop(freed);
                }
                Reclaim::Deferred => {
                    // Whoever deferred takes a hold later; its release frees the object
                    {
                        let mut inner = self.inner.borrow_mut();
                        inner.stats.deferred += 1;
                        if let Some(object) = inner.get_mut(id) {
                            object.detached = true;
                        }
                    }
                    stats.deferred += 1;
                    debug!(object = %id, "collector deferred reclamation");
                }
            }
        }

        stats
    }

    pub fn stats(&self) -> HeapStats {
        self.inner.borrow().stats
    }

    pub fn live_count(&self) -> usize {
        self.inner.borrow().stats.live
    }
}

/// Strong reference to a managed object
pub struct ObjectRef {
    heap: Rc<ObjectHeap>,
    id: ObjectId,
}

impl ObjectRef {
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn heap(&self) -> &Rc<ObjectHeap> {
        &self.heap
    }

    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef {
            heap: Rc::downgrade(&self.heap),
            id: self.id,
        }
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        self.heap.retain(self.id);
        Self {
            heap: Rc::clone(&self.heap),
            id: self.id,
        }
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        self.heap.release(self.id);
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectRef").field(&self.id).finish()
    }
}

/// Weak reference to a managed object
#[derive(Clone)]
pub struct WeakObjectRef {
    heap: Weak<ObjectHeap>,
    id: ObjectId,
}

impl WeakObjectRef {
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Strong reference, unless the collector has already claimed the object
    pub fn upgrade(&self) -> Option<ObjectRef> {
        let heap = self.heap.upgrade()?;
        if !heap.is_held(self.id) || !heap.retain(self.id) {
            return None;
        }
        Some(ObjectRef { heap, id: self.id })
    }

    pub fn is_reclaimed(&self) -> bool {
        self.heap
            .upgrade()
            .map(|heap| !heap.is_alive(self.id))
            .unwrap_or(true)
    }
}
