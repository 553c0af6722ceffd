//! A CLI tool and library for reading, checking and repairing Garmin FIT
//! workout files.
//!
//! Workouts exported by planning apps sometimes carry exercise categories a
//! watch does not know, and the watch then refuses or blanks the workout.
//! This crate decodes a workout into a [`WorkoutModel`] for previewing,
//! reports such values with [`validate_fit_bytes`], and writes a clean
//! replacement with [`repair_fit_bytes`] or [`repair_fit_file`]. New workouts
//! can be written from a simplified [`WorkoutPlan`] with [`build_workout`].
//!
//! # Feature flags
//!
//! - `cli` enables the additional dependencies needed by the CLI
//! - `rayon` (default) validates batches of files in parallel
//! - `serde` derives serialization for plans, profile enums and decoded
//!   messages

mod crc;
pub mod decode;
mod display;
pub mod encode;
mod exercise;
pub mod internal;
pub mod interpret;
pub mod measure;
pub mod parse;
pub mod plan;
pub mod profile;
mod report;
pub mod testonly;
pub mod types;
mod validate;
pub mod workout;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub use decode::FormatError;
pub use display::{format_distance, format_duration, get_sport_color, get_sport_display};
pub use encode::{BuildError, FitWorkoutOptions, build_workout};
pub use exercise::{ExerciseCode, lookup_exercise};
pub use plan::{PlanBlock, PlanExercise, Reps, WorkoutPlan};
pub use profile::{ExerciseCategory, Intensity, Sport, SubSport};
use thiserror::Error;
use tracing::{debug, info, warn};
pub use types::TypeError;
pub use validate::{ValidationResult, validate_fit_file};
pub use workout::{DisplayStep, Fidelity, WorkoutModel};

use crate::decode::decode;
use crate::interpret::interpret_file;
use crate::parse::{default_strategies, first_success};

#[derive(Error, Debug)]
pub enum WorkoutFitError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("FIT decoding error")]
    Format(#[from] FormatError),
    #[error("FIT encoding error")]
    Build(#[from] BuildError),
    #[error("Core type error")]
    Type(#[from] TypeError),
}

pub type Result<T> = std::result::Result<T, WorkoutFitError>;

/// Parses a workout, falling back to a placeholder model when the file
/// cannot be fully decoded.
///
/// Returns `None` only when no parser can make anything of the bytes.
pub fn parse_fit_bytes(bytes: &[u8]) -> Option<WorkoutModel> {
    first_success(&default_strategies(), bytes)
}

/// Reads and parses a workout file. See [`parse_fit_bytes`].
pub fn parse_fit_file<P: AsRef<Path>>(path: P) -> Option<WorkoutModel> {
    match std::fs::read(path.as_ref()) {
        Ok(bytes) => parse_fit_bytes(&bytes),
        Err(e) => {
            warn!("Unable to read {:?}: {}", path.as_ref(), e);
            None
        }
    }
}

/// Decodes a workout without any fallback.
pub fn decode_workout(bytes: &[u8]) -> Result<WorkoutModel> {
    let file = decode(bytes)?;
    Ok(WorkoutModel::from_decoded(&interpret_file(&file)))
}

/// Checks a workout for values a watch will refuse. Never fails; problems
/// reading the file are reported as issues.
pub fn validate_fit_bytes(bytes: &[u8]) -> ValidationResult {
    validate::validate_bytes(bytes)
}

/// Validates several files, in parallel when the `rayon` feature is on.
///
/// Results are in the order of `paths`.
#[cfg(feature = "rayon")]
pub fn validate_fit_files<P: AsRef<Path> + Sync>(paths: &[P]) -> Vec<ValidationResult> {
    use rayon::prelude::*;

    paths.par_iter().map(validate_fit_file).collect()
}

/// Validates several files. Results are in the order of `paths`.
#[cfg(not(feature = "rayon"))]
pub fn validate_fit_files<P: AsRef<Path>>(paths: &[P]) -> Vec<ValidationResult> {
    paths.iter().map(validate_fit_file).collect()
}

/// Decodes a workout and writes it again from its rebuilt model.
///
/// Category codes a watch would reject are replaced by ones looked up from
/// each step's name. Fails if the input cannot be decoded.
#[tracing::instrument(level = "debug", skip_all)]
pub fn repair_fit_bytes(bytes: &[u8], options: FitWorkoutOptions) -> Result<Vec<u8>> {
    let model = decode_workout(bytes)?;
    let plan = WorkoutPlan::from_model(&model);
    debug!(
        "Rebuilding {:?} from {} exercises",
        plan.title,
        plan.exercise_count()
    );
    Ok(build_workout(&plan, options)?)
}

/// Where [`repair_fit_file`] writes its output: `<stem>_repaired.fit` beside
/// the input.
pub fn repaired_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workout".to_owned());
    path.with_file_name(format!("{stem}_repaired.fit"))
}

/// Writes `model` as a new FIT file beside `path`, returning the new file's
/// path. The input file itself is never modified, but an earlier repaired
/// file is replaced.
pub fn repair_fit_file<P: AsRef<Path>>(
    path: P,
    model: &WorkoutModel,
    options: FitWorkoutOptions,
) -> Result<PathBuf> {
    let bytes = build_workout(&WorkoutPlan::from_model(model), options)?;
    let output = repaired_path(path);
    let mut w = BufWriter::new(File::create(&output)?);
    w.write_all(&bytes)?;
    w.flush()?;
    info!("Wrote repaired workout to {:?}", output);
    Ok(output)
}
