//! Logging setup shared by the `sr-*` binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Error, Result};

/// Crates whose events follow `--verbose`; everything else logs at warn.
const WORKSPACE_TARGETS: [&str; 6] = [
    "sr_core",
    "sr_dataset",
    "sr_training",
    "sr_train",
    "sr_demo",
    "sr_evaluate",
];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    std::iter::once("warn".to_string())
        .chain(WORKSPACE_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the tracing subscriber. `RUST_LOG` takes precedence over `verbose`.
pub fn setup_cli_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(verbose)))
        .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbose))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Logger already initialized: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(false),
            "warn,sr_core=info,sr_dataset=info,sr_training=info,sr_train=info,sr_demo=info,sr_evaluate=info"
        );
        assert!(default_directives(true).ends_with("sr_evaluate=debug"));
        assert!(EnvFilter::try_new(default_directives(true)).is_ok());
    }
}
