//! Logging setup for `posix_rwlock`.
//!
//! The lock itself only talks to the `log` facade (target `posix_rwlock`). This crate installs
//! a `tracing` fmt subscriber that also picks up those `log` records, filtered through
//! `RUST_LOG`, e.g. `RUST_LOG=posix_rwlock=trace`.
pub use tracing::{self, debug, error, info, trace, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Sets up the logging for any crate, exiting the process on panic
pub fn setup_log() {
    std::panic::set_hook(Box::new(|info| {
        error!(target: "posix_rwlock", "Panic occurred: {}", info);
        std::process::exit(1);
    }));

    setup_log_no_panic_hook()
}

/// Sets up the logging without touching the panic hook. Safe to call more than once
pub fn setup_log_no_panic_hook() {
    let _ = SubscriberBuilder::default()
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::NONE)
        .with_env_filter(EnvFilter::from_default_env())
        .finish()
        .try_init();
}
