//! Tracing subscriber setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use vouch_core::{VouchError, VouchResult};

/// Install the global subscriber. `RUST_LOG` takes precedence over `filter`.
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_tracing(filter: &str, json: bool) -> VouchResult<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter).map_err(|e| {
            VouchError::InvalidConfig(format!("invalid log filter '{}': {}", filter, e))
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    installed.map_err(|e| VouchError::InvalidConfig(format!("tracing init failed: {}", e)))
}
