/*!
 * Limits and Constants
 *
 * Defaults shared by the environment, registry and shutdown path.
 */

// =============================================================================
// REGISTRY
// =============================================================================

/// Registry slots preallocated per environment
/// Growth past this amortizes like a Vec; removal never shrinks
pub const DEFAULT_REGISTRY_CAPACITY: usize = 64;

// =============================================================================
// SHUTDOWN
// =============================================================================

/// Loop turns spent draining close completions during shutdown cleanup
pub const DEFAULT_CLEANUP_MAX_ITERATIONS: usize = 1024;

// =============================================================================
// HEAP
// =============================================================================

/// Object slots preallocated by the managed heap
pub const DEFAULT_HEAP_CAPACITY: usize = 128;
