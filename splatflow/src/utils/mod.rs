//! Utility functions for identifiers, timestamps and input validation.

pub mod timestamps;
mod uuid_utils;
pub mod validation;

pub use timestamps::{iso_timestamp, now_utc, Timestamp};
pub use uuid_utils::generate_run_id;
pub use validation::{validate_model_variant, validate_path_segment, KNOWN_MODEL_VARIANTS};
