//! Tracing setup for test runs.

use tracing_subscriber::EnvFilter;

use tether_types::HarnessConfig;

/// Filter used when `TETHER_DEBUG` is on and `RUST_LOG` is unset.
const DEBUG_FILTER: &str = "tether_pilot=debug,tether_harness=debug";
const DEFAULT_FILTER: &str = "warn";

/// Install a fmt subscriber routed through the test output capture.
///
/// `RUST_LOG` takes precedence; otherwise the filter follows
/// `config.debug`. Safe to call from every test: only the first call
/// installs a subscriber, later calls return `false`.
pub fn init_logging(config: &HarnessConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(false)
        .with_test_writer()
        .try_init()
        .is_ok()
}

fn env_filter(config: &HarnessConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_directives(config)))
}

fn fallback_directives(config: &HarnessConfig) -> &'static str {
    if config.debug {
        DEBUG_FILTER
    } else {
        DEFAULT_FILTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_follows_debug_flag() {
        let mut config = HarnessConfig::default();
        assert_eq!(fallback_directives(&config), "warn");
        config.debug = true;
        assert!(fallback_directives(&config).contains("tether_pilot=debug"));
    }

    #[test]
    fn repeated_init_does_not_panic() {
        let config = HarnessConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
