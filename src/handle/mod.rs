/*!
 * Handle Lifecycle
 *
 * Wrapper around a native event-loop handle that is closed exactly once,
 * through the loop, whether user code or the collector asks first.
 *
 * # Architecture
 *
 * - **State**: Initialized → Closing → Closed, never backwards
 * - **Registry**: every wrapper that is not `Closed`, in creation order
 * - **Close**: request goes to the loop; the completion finishes the job
 * - **Collector hook**: an unreachable open handle is closed before it is freed
 */

mod completion;
mod gc;
pub mod kind;
pub mod methods;
pub mod registry;
pub mod state;
pub mod wrap;

pub use kind::{BasicHandle, HandleKind};
pub use methods::{register_external_references, register_module_references};
pub use registry::{HandleRegistry, RegistryKey};
pub use state::HandleState;
pub use wrap::HandleWrap;
