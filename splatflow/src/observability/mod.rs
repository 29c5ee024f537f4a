//! Logging setup and timing helpers.

mod subscriber;
mod timing;

pub use subscriber::{init_tracing, DEFAULT_LOG_FILTER};
pub use timing::SpanTimer;
