use std::env;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Level comes from `FFL_LOG` (then `RUST_LOG`,
/// then `ffl_auction=info`); `FFL_LOG_FORMAT=json` switches to JSON lines.
/// Logs go to stderr so report binaries keep stdout clean.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("FFL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn,ffl_auction=info"));

    let json = env::var("FFL_LOG_FORMAT").is_ok_and(|v| v.trim().eq_ignore_ascii_case("json"));

    // a second call (tests, embedding callers) keeps the first subscriber
    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
}
