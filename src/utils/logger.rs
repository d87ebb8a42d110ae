//! Process-wide logging.
//!
//! Everything in the crate logs through `tracing`. Timing lines go to the
//! [`PERF_TARGET`] target so they can be filtered separately
//! (`RUST_LOG=ganglia::perf=info`).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::utils::console::{Console, Speaker};

pub const PERF_TARGET: &str = "ganglia::perf";

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "ganglia_common=debug,ganglia::perf=info,info"
    } else {
        "ganglia_common=info,ganglia::perf=info,warn"
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Installs the interactive logger. Debug output is only shown when `verbose`.
pub fn init_cli_logger(verbose: bool, timestamps: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let registry = tracing_subscriber::registry().with(default_filter(verbose));
    if timestamps {
        registry.with(layer).init();
    } else {
        registry.with(layer.without_time()).init();
    }
}

pub fn init_json_logger() {
    tracing_subscriber::registry()
        .with(default_filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}

/// Like [`init_cli_logger`] but does not panic when a subscriber is already
/// installed, which is the normal case for a library embedded in a host app.
pub fn try_init_cli_logger(verbose: bool) -> bool {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .compact(),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(true),
            "ganglia_common=debug,ganglia::perf=info,info"
        );
        assert_eq!(
            default_directives(false),
            "ganglia_common=info,ganglia::perf=info,warn"
        );
        for verbose in [true, false] {
            assert!(default_directives(verbose)
                .parse::<EnvFilter>()
                .is_ok());
        }
    }
}
