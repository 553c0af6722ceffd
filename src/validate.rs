//! Checks a workout for values a watch will refuse.
//!
//! The one rule enforced is the exercise category range: a category the
//! profile has no name for, outside `0..=32`, makes devices reject or blank
//! the step. Validation never fails; problems with the file itself come back
//! as issues.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::decode::decode;
use crate::interpret::{WorkoutStep, interpret_file};
use crate::profile::{CategoryValue, EnumValue, MAX_EXERCISE_CATEGORY};
use crate::workout::{DisplayStep, WorkoutModel};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<String>,
    pub invalid_categories: BTreeSet<u32>,
}

impl ValidationResult {
    fn from_categories<I>(categories: I) -> Self
    where
        I: IntoIterator<Item = CategoryValue>,
    {
        let invalid_categories: BTreeSet<u32> = categories
            .into_iter()
            .filter_map(|c| match c {
                EnumValue::Unknown(raw) if raw > u32::from(MAX_EXERCISE_CATEGORY) => Some(raw),
                _ => None,
            })
            .collect();

        let mut issues = Vec::new();
        if !invalid_categories.is_empty() {
            let list = invalid_categories
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            issues.push(format!("Invalid exercise categories found: {list}"));
            issues.push(format!(
                "Exercise categories must be between 0 and {MAX_EXERCISE_CATEGORY}; the watch \
                 may reject or fail to display this workout."
            ));
        }

        Self {
            valid: issues.is_empty(),
            issues,
            invalid_categories,
        }
    }

    fn failed(issue: String) -> Self {
        Self {
            valid: false,
            issues: vec![issue],
            invalid_categories: BTreeSet::new(),
        }
    }
}

pub fn validate_steps(steps: &[WorkoutStep]) -> ValidationResult {
    ValidationResult::from_categories(steps.iter().filter_map(|s| s.category))
}

/// Validates the categories carried by an already built model.
pub fn validate_model(model: &WorkoutModel) -> ValidationResult {
    ValidationResult::from_categories(model.flat_steps().into_iter().filter_map(|s| match s {
        DisplayStep::Exercise(e) | DisplayStep::Warmup(e) | DisplayStep::Cooldown(e) => e.category,
        _ => None,
    }))
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn validate_bytes(bytes: &[u8]) -> ValidationResult {
    match decode(bytes) {
        Ok(file) => {
            let result = validate_steps(&interpret_file(&file).steps);
            debug!("Validation result: {:?}", result);
            result
        }
        Err(err) => {
            warn!("Validation could not decode file: {}", err);
            ValidationResult::failed(format!("Could not parse FIT file: {err}"))
        }
    }
}

pub fn validate_fit_file<P: AsRef<Path>>(path: P) -> ValidationResult {
    match std::fs::read(path.as_ref()) {
        Ok(bytes) => validate_bytes(&bytes),
        Err(e) => ValidationResult::failed(format!("Could not read FIT file: {e}")),
    }
}
