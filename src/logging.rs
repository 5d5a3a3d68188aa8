//! Structured logging setup for providers.
//!
//! Providers log through the `tracing` ecosystem. Output goes to
//! **stderr**: stdout belongs to the engine's rendered plans and machine
//! output, and provider logs must never interleave with it.
//!
//! Filtering follows the `RUST_LOG` environment variable:
//!
//! ```bash
//! RUST_LOG=debug my-provider
//! RUST_LOG=lattice_provider_sdk=trace my-provider
//! ```

use tracing_subscriber::EnvFilter;

/// Install the default log subscriber.
///
/// Reads `RUST_LOG` for filtering and falls back to `info`. Writes a
/// compact human-readable format to stderr.
///
/// # Panics
///
/// Panics if a global subscriber is already installed; use
/// [`try_init_logging`] when that is a possibility.
pub fn init_logging() {
    init_with_filter(default_filter("info"));
}

/// Install the default subscriber with a custom fallback level used when
/// `RUST_LOG` is not set (e.g. `"debug"`).
pub fn init_logging_with_default(default_level: &str) {
    init_with_filter(default_filter(default_level));
}

/// Install the default subscriber if none is installed yet.
///
/// Returns `false` when a subscriber was already set, which makes this
/// safe to call from tests and from providers that may be initialized
/// more than once in a process.
pub fn try_init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter("info"))
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .is_ok()
}

fn init_with_filter(filter: EnvFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn default_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be installed once per process, so
    // only the fallible entry point is exercised here.

    use super::*;

    #[test]
    fn test_filter_syntax_accepted() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("warn,lattice_provider_sdk=debug").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        // Whatever the first call returns, the second must not panic and
        // must report that a subscriber is already present.
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
