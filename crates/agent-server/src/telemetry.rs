//! Telemetry Bootstrap
//!
//! Process-wide tracing setup: lazily initialized once, idempotent on
//! repeat calls, resettable only for tests.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global tracing subscriber. Safe to call any number of
/// times; only the first call does work.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    // try_init: another subscriber may already be installed (tests);
    // the init flag is what keeps our own bootstrap single-shot.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Reset the initialization flag so a test can exercise `init` again.
/// The global subscriber itself cannot be uninstalled.
#[cfg(test)]
pub fn reset() {
    INITIALIZED.store(false, Ordering::SeqCst);
}
