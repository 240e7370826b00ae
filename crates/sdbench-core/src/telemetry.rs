//! Tracing setup for the `sdbench` binary.
//!
//! Benchmark progress (encounter spans, degraded-call warnings, the final
//! metrics flush) goes to stderr so that summaries printed on stdout can be
//! piped. Call [`init_tracing`] once at program start; later calls are
//! ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "SDBENCH_LOG";

/// Directives used when neither `SDBENCH_LOG` nor `RUST_LOG` is set.
///
/// Our own crates log at `level`; dependencies only surface warnings, so a
/// verbose run is not drowned in HTTP client chatter.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,sdbench_core={level},sdbench={level}")
}

fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber, JSON lines when `json` is set.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = build_filter(level);
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}
