//! Diagnostic output for the command-line client.

use tracing_subscriber::EnvFilter;

const QUIET_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "charchat=debug,warn";

/// `RUST_LOG` wins when set; otherwise warnings only, or debug output for
/// this crate with `verbose`.
pub fn filter_directives(rust_log: Option<&str>, verbose: bool) -> String {
    match rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => directives.to_string(),
        None if verbose => VERBOSE_FILTER.to_string(),
        None => QUIET_FILTER.to_string(),
    }
}

/// Install the global subscriber. Logs go to stderr so replies on stdout
/// stay pipeable.
pub fn init_tracing(verbose: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::try_new(filter_directives(rust_log.as_deref(), verbose))
        .unwrap_or_else(|_| EnvFilter::new(QUIET_FILTER));

    // A subscriber may already be installed (tests, embedding callers).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_overrides_verbosity() {
        assert_eq!(filter_directives(Some("trace"), false), "trace");
        assert_eq!(filter_directives(Some("  "), true), VERBOSE_FILTER);
        assert_eq!(filter_directives(None, false), QUIET_FILTER);
    }
}
