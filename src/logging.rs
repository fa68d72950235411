// src/logging.rs

use chrono::Utc;
use tracing::{info_span, Span};
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process subscriber. Only binaries call this; library code
/// logs through a [`LogContext`] handed to it.
pub fn init_subscriber(default_filter: &str) {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .try_init();
}

/// Explicit logging context threaded through the pipeline.
///
/// Holds the root span for one analysis run; every component emits its
/// events as children of this span so a run can be followed end to end.
#[derive(Debug, Clone)]
pub struct LogContext {
    run_id: String,
    span: Span,
}

impl LogContext {
    /// Create a context for a run of `kind` ("temporal", "spatial", ...).
    pub fn new(kind: &str) -> Self {
        let run_id = Utc::now().format("%Y%m%dT%H%M%S%.3f").to_string();
        let span = info_span!("analysis", kind, run_id = %run_id);
        Self { run_id, span }
    }

    /// A context whose events go nowhere, for callers that don't care.
    pub fn disabled() -> Self {
        Self {
            run_id: String::new(),
            span: Span::none(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
