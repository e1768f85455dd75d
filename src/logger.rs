pub use tracing::{debug, error, info, instrument, trace, warn};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` level;
/// at debug level span close events carry step timings.
pub fn init() {
    init_with_default("info");
}

pub fn init_with_default(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let span_events = match env_filter.max_level_hint() {
        Some(level) if level >= LevelFilter::DEBUG => FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(span_events);

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
