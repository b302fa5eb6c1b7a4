/*!
 * Tracing Setup
 * Subscriber installation for the handle lifecycle's structured logs
 *
 * Lifecycle events are emitted under the `handle_wrap` target:
 * - `handle_close` spans around every close completion
 * - debug events for registration, collector deferrals and callback drops
 * - warnings for failing callbacks and handles left open at teardown
 */

use tracing::info;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Env var switching the output to JSON lines
pub const TRACE_JSON_ENV: &str = "HANDLE_WRAP_TRACE_JSON";

/// Output format picked at initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Compact,
    Json,
}

impl TraceFormat {
    /// Read the format from [`TRACE_JSON_ENV`]
    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(TRACE_JSON_ENV).ok().as_deref())
    }

    fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("1") | Some("true") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - HANDLE_WRAP_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false when a global subscriber was already installed.
pub fn init_tracing() -> bool {
    init_tracing_with(TraceFormat::from_env())
}

pub fn init_tracing_with(format: TraceFormat) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match format {
        TraceFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok(),
        TraceFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok(),
    };

    if installed {
        info!(format = ?format, "tracing initialized");
    }
    installed
}
