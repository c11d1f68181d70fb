//! Log subscriber setup.
//!
//! Quiet by default (`warn`). Each `-v` raises the level for the
//! `filing_rag` crates one step; `RUST_LOG` overrides both.

use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: Once = Once::new();

/// Filter directive for the given `-v` count.
pub fn filter_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => return "warn".to_string(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,filing_rag={level},filing_rag_cli={level}")
}

/// Install the global subscriber. Only the first call has any effect.
///
/// Logs go to stderr so answers on stdout stay pipeable.
pub fn init(verbosity: u8, json: bool) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directive(verbosity))
        };

        let layer = if json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(filter)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(filter)
                .boxed()
        };

        // A subscriber installed by an embedding process wins.
        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
}
