//! UUID generation.

use uuid::Uuid;

/// Generates a time-ordered identifier for one pipeline run.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}
