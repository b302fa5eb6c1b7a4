/*!
 * Managed Runtime
 *
 * Object model the wrappers pair with: a collected heap with named slots and
 * a pre-reclamation hook, callable values, and prototype method templates.
 */

pub mod external_refs;
pub mod heap;
pub mod template;
pub mod value;

pub use external_refs::{ExternalReference, ExternalReferenceRegistry};
pub use heap::{CollectStats, Finalizer, HeapStats, ObjectHeap, ObjectRef, Reclaim, WeakObjectRef};
pub use template::{ConstructorTemplate, MethodCall, MethodEntry, MethodFn};
pub use value::{Callback, CallbackContext, Value};
