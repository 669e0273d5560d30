//! Logging setup. Everything goes to stderr; stdout carries the palette.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Level for a count of `-v` flags. Default: WARN.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// A non-empty, parseable `rust_log` wins over `verbosity`.
fn build_filter(verbosity: u8, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level_for(verbosity).to_string()))
}

/// Install the stderr subscriber. `RUST_LOG`, when set, wins over `verbosity`.
pub fn init(verbosity: u8) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(verbosity, rust_log.as_deref());

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
