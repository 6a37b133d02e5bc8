//! Logging setup
//!
//! Logs go to stderr so stdout stays free for recorder output.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_DIRECTIVE: &str = "status_relay=info";

/// Install the global tracing subscriber
///
/// `verbose` raises the fallback filter to debug. Calling this twice is
/// harmless; the second call is ignored.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "status_relay=debug"
    } else {
        DEFAULT_DIRECTIVE
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
