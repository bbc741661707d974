//! Log output setup for host binaries.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set; otherwise `debug` or `info` depending on `verbose`.
fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects `debug` over
/// `info`. Output goes to stderr in the compact format.
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();
}

/// Like [`init_logging`], but a no-op when a subscriber is already
/// installed (tests install one per binary).
pub fn try_init_logging(verbose: bool) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init()
        .is_ok()
}
