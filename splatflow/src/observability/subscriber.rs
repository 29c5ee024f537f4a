//! Global `tracing` subscriber installation.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::errors::{Result, SplatflowError};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "splatflow=info,tower_http=info";

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]. With `json` set, each event
/// is written as one JSON object per line.
///
/// # Errors
///
/// Returns [`SplatflowError::Config`] if the filter does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(DEFAULT_LOG_FILTER),
    }
    .map_err(|e| SplatflowError::config(format!("invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    installed.map_err(|e| SplatflowError::config(format!("tracing already initialised: {e}")))
}
