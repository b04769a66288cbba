use std::io::IsTerminal;

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the stderr subscriber; `RUST_LOG` overrides `default_level`.
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(default_level: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
