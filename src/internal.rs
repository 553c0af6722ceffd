//! Exports intended for internal use only.
//!
//! These need to be exported for access from the main CLI and the `devtools`
//! binaries, but they are not intended for use by external code. This
//! module's API may change without semantic versioning!

pub use crate::profile::PROFILE_VERSION;

pub mod report {
    pub use crate::report::{duration_label, total_seconds, validation_report, workout_report};
}

/// The profile version as `major.minor`, the way the FIT SDK numbers its
/// releases.
pub fn profile_version_str() -> String {
    format!("{}.{}", PROFILE_VERSION / 1000, PROFILE_VERSION % 1000)
}
