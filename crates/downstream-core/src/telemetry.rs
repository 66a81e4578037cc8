//! Log output for the `downstream` binary.
//!
//! stdout belongs to the progress lines a pipeline step shows its user
//! ("Restarting build ...", parameter echo, "Waiting for build ..."). The
//! structured events from [`crate::obs`] and every other log line go to
//! stderr, so both streams can be captured separately.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr subscriber. `RUST_LOG` overrides `level`; `json`
/// switches to one JSON object per line for log collectors. Only the first
/// call has an effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}
