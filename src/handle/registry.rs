/*!
 * Handle Registry
 *
 * Insertion-ordered collection of live wrappers for one environment.
 *
 * Backed by an index-stable arena threaded with a doubly-linked list:
 * - **push_back**: O(1), reuses vacated nodes before growing
 * - **remove**: O(1) by key
 * - **iteration**: insertion order
 *
 * Keys carry a generation so a stale key never removes a later occupant.
 */

use crate::core::limits::DEFAULT_REGISTRY_CAPACITY;

/// Position of an entry in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    index: u32,
    generation: u32,
}

struct Node<T> {
    generation: u32,
    value: Option<T>,
    prev: Option<u32>,
    /// Next live node, or next vacant node while on the free list
    next: Option<u32>,
}

/// Intrusive ordered registry
pub struct HandleRegistry<T> {
    nodes: Vec<Node<T>>,
    head: Option<u32>,
    tail: Option<u32>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REGISTRY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_head: None,
            len: 0,
        }
    }

    /// Append an entry at the tail
    pub fn push_back(&mut self, value: T) -> RegistryKey {
        let index = match self.free_head {
            Some(index) => {
                let node = &mut self.nodes[index as usize];
                self.free_head = node.next;
                node.value = Some(value);
                node.prev = self.tail;
                node.next = None;
                index
            }
            None => {
                let index = self.nodes.len() as u32;
                self.nodes.push(Node {
                    generation: 0,
                    value: Some(value),
                    prev: self.tail,
                    next: None,
                });
                index
            }
        };

        match self.tail {
            Some(tail) => self.nodes[tail as usize].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        RegistryKey {
            index,
            generation: self.nodes[index as usize].generation,
        }
    }

    /// Unlink an entry. Stale keys return `None`.
    pub fn remove(&mut self, key: RegistryKey) -> Option<T> {
        if !self.contains(key) {
            return None;
        }

        let (prev, next, value) = {
            let node = &mut self.nodes[key.index as usize];
            let value = node.value.take();
            node.generation = node.generation.wrapping_add(1);
            (node.prev.take(), node.next.take(), value)
        };

        match prev {
            Some(p) => self.nodes[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n as usize].prev = prev,
            None => self.tail = prev,
        }

        self.nodes[key.index as usize].next = self.free_head;
        self.free_head = Some(key.index);
        self.len -= 1;
        value
    }

    pub fn contains(&self, key: RegistryKey) -> bool {
        self.nodes
            .get(key.index as usize)
            .map(|n| n.generation == key.generation && n.value.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, key: RegistryKey) -> Option<&T> {
        self.nodes
            .get(key.index as usize)
            .filter(|n| n.generation == key.generation)
            .and_then(|n| n.value.as_ref())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries in insertion order
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            registry: self,
            cursor: self.head,
            remaining: self.len,
        }
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Insertion-order iterator over a registry
pub struct Iter<'a, T> {
    registry: &'a HandleRegistry<T>,
    cursor: Option<u32>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (RegistryKey, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = &self.registry.nodes[index as usize];
        self.cursor = node.next;
        self.remaining -= 1;
        let key = RegistryKey {
            index,
            generation: node.generation,
        };
        node.value.as_ref().map(|v| (key, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> IntoIterator for &'a HandleRegistry<T> {
    type Item = (RegistryKey, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
