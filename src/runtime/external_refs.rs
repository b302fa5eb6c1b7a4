/*!
 * External References
 *
 * Addresses of native entry points, collected for snapshot tooling that has
 * to map function pointers back to stable indices.
 */

use crate::runtime::template::MethodFn;
use parking_lot::Mutex;
use std::sync::OnceLock;

/// A registered native entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalReference {
    pub name: &'static str,
    pub address: usize,
}

/// Ordered set of native entry points
#[derive(Debug, Default)]
pub struct ExternalReferenceRegistry {
    entries: Vec<ExternalReference>,
}

impl ExternalReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry point. Returns false if it was already present.
    pub fn register(&mut self, name: &'static str, func: MethodFn) -> bool {
        let address = func as usize;
        if self.entries.iter().any(|e| e.address == address) {
            return false;
        }
        self.entries.push(ExternalReference { name, address });
        true
    }

    pub fn contains(&self, func: MethodFn) -> bool {
        let address = func as usize;
        self.entries.iter().any(|e| e.address == address)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Stable index of an entry point, in registration order
    pub fn index_of(&self, func: MethodFn) -> Option<usize> {
        let address = func as usize;
        self.entries.iter().position(|e| e.address == address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ExternalReference] {
        &self.entries
    }
}

/// Process-wide registry used by snapshot tooling
pub fn global() -> &'static Mutex<ExternalReferenceRegistry> {
    static GLOBAL: OnceLock<Mutex<ExternalReferenceRegistry>> = OnceLock::new();
    GLOBAL.get_or_init(|| Mutex::new(ExternalReferenceRegistry::new()))
}
