#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "trendline=info";
pub const LOG_FORMAT_ENV: &str = "RUST_LOG_FORMAT";

/// Installs the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` overrides the default filter; `RUST_LOG_FORMAT=json` switches to
/// JSON lines. Later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    if json_requested() {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

fn json_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
