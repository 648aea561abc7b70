//! Tracing setup for kunitgen binaries.
//!
//! Log lines go to stderr in both formats. Stdout is left to command output.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set.
///
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    log_subscriber(json, level, std::io::stderr).try_init().ok();
}

fn log_subscriber<W>(json: bool, level: Level, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(false).with_writer(writer);

    if json {
        Box::new(registry.with(layer.json()))
    } else {
        Box::new(registry.with(layer))
    }
}
