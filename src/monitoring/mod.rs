/*!
 * Monitoring
 * Structured logging setup
 */

mod tracer;

pub use tracer::{init_tracing, init_tracing_with, TraceFormat, TRACE_JSON_ENV};
