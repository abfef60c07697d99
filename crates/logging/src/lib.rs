#![warn(missing_docs)]

//! Shared logging helpers and CLI argument definitions for the pin workspace.
//!
//! Consolidates tracing-filter construction so every entry point resolves log
//! levels the same way: explicit filter > level flags > `RUST_LOG` > default.

use std::env;

use clap::Args;
use tracing_subscriber::EnvFilter;

/// Crate targets included in default logging directives.
const OUR_CRATES: &[&str] = &[
    "pin",
    "pin_dispatch",
    "pin_engine",
    "pin_protocol",
    "mac_capture",
    "mac_frontmost",
    "mac_overlay",
    "mac_winlist",
    "permissions",
    "logging",
];

/// Logging controls for CLI apps.
#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Set global log level to trace (our crates only)
    #[arg(long, conflicts_with_all = ["debug", "log_level", "log_filter"])]
    pub trace: bool,

    /// Set global log level to debug (our crates only)
    #[arg(long, conflicts_with_all = ["trace", "log_level", "log_filter"])]
    pub debug: bool,

    /// Set a single global log level for our crates (error|warn|info|debug|trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Set an explicit tracing filter directive (overrides other flags)
    /// e.g. "pin_engine=trace,mac_capture=debug"
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl LogArgs {
    /// Resolve these arguments to a final filter spec.
    pub fn spec(&self) -> String {
        compute_spec(
            self.trace,
            self.debug,
            self.log_level.as_deref(),
            self.log_filter.as_deref(),
        )
    }
}

/// Build crate-scoped directives for the given level.
fn crate_specs(level: &str) -> Vec<String> {
    let lvl = level.to_ascii_lowercase();
    OUR_CRATES.iter().map(|t| format!("{t}={lvl}")).collect()
}

/// Add suppression of per-frame capture noise to the provided directives.
fn join_with_capture_quiet(mut parts: Vec<String>) -> String {
    parts.push("screencapturekit=warn".to_string());
    parts.join(",")
}

/// Build a filter directive string that sets the same `level` for all of our
/// crates, with capture-delivery noise suppressed.
pub fn level_spec_for(level: &str) -> String {
    join_with_capture_quiet(crate_specs(level))
}

/// Compute the final filter spec string with precedence:
/// - `log_filter`
/// - `trace`/`debug`/`log_level` (crate-scoped)
/// - `RUST_LOG` env (plus capture suppression if not present)
/// - default to crate-scoped `info`
pub fn compute_spec(
    trace: bool,
    debug: bool,
    log_level: Option<&str>,
    log_filter: Option<&str>,
) -> String {
    if let Some(spec) = log_filter {
        return spec.to_string();
    }
    if trace {
        return level_spec_for("trace");
    }
    if debug {
        return level_spec_for("debug");
    }
    if let Some(lvl) = log_level {
        return level_spec_for(lvl);
    }
    if let Ok(spec) = env::var("RUST_LOG") {
        if spec.contains("screencapturekit") {
            spec
        } else {
            join_with_capture_quiet(vec![spec])
        }
    } else {
        level_spec_for("info")
    }
}

/// Create an `EnvFilter` from a spec string.
pub fn env_filter_from_spec(spec: &str) -> EnvFilter {
    EnvFilter::new(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        assert_eq!(
            compute_spec(true, false, Some("warn"), Some("pin_engine=trace")),
            "pin_engine=trace"
        );
    }

    #[test]
    fn level_spec_scopes_our_crates() {
        let spec = level_spec_for("debug");
        assert!(spec.contains("pin_engine=debug"));
        assert!(spec.contains("mac_winlist=debug"));
        assert!(spec.ends_with("screencapturekit=warn"));
    }
}
