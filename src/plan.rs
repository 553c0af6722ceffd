//! The simplified workout description the encoder consumes.
//!
//! A [`WorkoutPlan`] is a list of blocks, each a run of exercises sharing one
//! rest interval. It is what the `build` command reads from JSON, and what a
//! decoded [`WorkoutModel`] is flattened into for repair.

use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::encode::BuildError;
use crate::interpret::StepDuration;
use crate::measure::{
    Centimeters, Hours, IntoUnit, Kilometers, Meters, Miles, Milliseconds, Minutes, Seconds, Yards,
};
use crate::profile::{CategoryValue, ExerciseCategory, Intensity, Sport, SubSport};
use crate::workout::{DisplayStep, ExerciseStep, WorkoutModel};

/// How many reps, or how long, an exercise lasts.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Reps {
    Count(u32),
    /// `"12"`, `"30s"`, `"1.5 min"`, `"400m"`, `"1.0km"`...
    Text(String),
}

/// A parsed [`Reps`] value in FIT storage units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RepsTarget {
    Count(u32),
    Time(Milliseconds<f64>),
    Distance(Centimeters<f64>),
}

static REPS_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>[a-z]*)\s*$")
});

impl Reps {
    pub fn parse(&self) -> Result<RepsTarget, BuildError> {
        let text = match self {
            Self::Count(n) => return Ok(RepsTarget::Count(*n)),
            Self::Text(text) => text,
        };
        let unrecognized = || BuildError::UnrecognizedReps(text.clone());

        let pattern = REPS_PATTERN.as_ref().map_err(|_| unrecognized())?;
        let caps = pattern.captures(text).ok_or_else(unrecognized)?;
        let value: f64 = caps["value"].parse().map_err(|_| unrecognized())?;
        let unit = caps["unit"].to_lowercase();

        let target = match unit.as_str() {
            "" | "x" | "rep" | "reps" => {
                if value.fract() != 0.0 || value > f64::from(u32::MAX) {
                    return Err(unrecognized());
                }
                RepsTarget::Count(value as u32)
            }
            "s" | "sec" | "secs" | "second" | "seconds" => {
                RepsTarget::Time(Seconds(value).into_unit())
            }
            "min" | "mins" | "minute" | "minutes" => RepsTarget::Time(Minutes(value).into_unit()),
            "h" | "hr" | "hrs" | "hour" | "hours" => RepsTarget::Time(Hours(value).into_unit()),
            "m" | "meter" | "meters" => RepsTarget::Distance(Meters(value).into_unit()),
            "km" => RepsTarget::Distance(Kilometers(value).into_unit()),
            "mi" | "mile" | "miles" => RepsTarget::Distance(Miles(value).into_unit()),
            "yd" | "yds" | "yard" | "yards" => RepsTarget::Distance(Yards(value).into_unit()),
            _ => return Err(unrecognized()),
        };
        Ok(target)
    }
}

impl Display for Reps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

fn default_sets() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanExercise {
    pub name: String,
    /// `None` means the step runs until the lap button is pressed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub reps: Option<Reps>,
    #[cfg_attr(feature = "serde", serde(default = "default_sets"))]
    pub sets: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub intensity: Option<Intensity>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub category: Option<ExerciseCategory>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub exercise_id: Option<u16>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub notes: Option<String>,
}

impl PlanExercise {
    pub fn new<S: Into<String>>(name: S, reps: Option<Reps>, sets: u32) -> Self {
        Self {
            name: name.into(),
            reps,
            sets,
            intensity: None,
            category: None,
            exercise_id: None,
            notes: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanBlock {
    #[cfg_attr(feature = "serde", serde(default))]
    pub exercises: Vec<PlanExercise>,
    /// Rest after each exercise; `Some(0)` waits for the lap button.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rest_between_sec: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkoutPlan {
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sport: Option<Sport>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sub_sport: Option<SubSport>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub blocks: Vec<PlanBlock>,
}

impl WorkoutPlan {
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            sport: None,
            sub_sport: None,
            blocks: Vec::new(),
        }
    }

    /// Flattens a decoded model back into blocks.
    ///
    /// A repeat block becomes one block whose exercises carry the repeat count
    /// as their sets, with the block's rest as `rest_between_sec`. A rest
    /// outside a repeat becomes the rest of the block before it when that
    /// block is a single pass with no rest yet, and a block of its own
    /// otherwise. Unknown category codes are dropped so the encoder picks a
    /// valid one. Cardio exercise names are kept as notes, which is where
    /// cardio steps are named from.
    pub fn from_model(model: &WorkoutModel) -> Self {
        let cardio = model.is_cardio();
        let mut plan = Self {
            title: model.name.clone(),
            sport: model.sport.and_then(|s| s.known()),
            sub_sport: model.sub_sport.and_then(|s| s.known()),
            blocks: Vec::new(),
        };

        for step in &model.steps {
            match step {
                DisplayStep::Exercise(e) => {
                    plan.blocks.push(PlanBlock {
                        exercises: vec![plan_exercise(e, e.sets, cardio)],
                        rest_between_sec: None,
                    });
                }
                DisplayStep::Warmup(e) | DisplayStep::Cooldown(e) => {
                    plan.blocks.push(PlanBlock {
                        exercises: vec![plan_exercise(e, e.sets, false)],
                        rest_between_sec: None,
                    });
                }
                DisplayStep::Rest(rest) => {
                    let seconds = rest.rest.seconds().unwrap_or(0);
                    match plan.blocks.last_mut() {
                        Some(block)
                            if block.rest_between_sec.is_none()
                                && !block.exercises.is_empty()
                                && block.exercises.iter().all(|e| e.sets == 1) =>
                        {
                            block.rest_between_sec = Some(seconds)
                        }
                        _ => plan.blocks.push(PlanBlock {
                            exercises: Vec::new(),
                            rest_between_sec: Some(seconds),
                        }),
                    }
                }
                DisplayStep::RepeatBlock { count, steps } => {
                    let mut block = PlanBlock::default();
                    for inner in steps {
                        match inner {
                            DisplayStep::Rest(rest) => {
                                block.rest_between_sec = Some(rest.rest.seconds().unwrap_or(0));
                            }
                            DisplayStep::Exercise(e) => {
                                block.exercises.push(plan_exercise(e, *count, cardio));
                            }
                            DisplayStep::Warmup(e) | DisplayStep::Cooldown(e) => {
                                block.exercises.push(plan_exercise(e, *count, false));
                            }
                            DisplayStep::RepeatBlock { .. } => {
                                debug!("Skipping nested repeat block while flattening")
                            }
                        }
                    }
                    plan.blocks.push(block);
                }
            }
        }
        plan
    }

    /// The number of `workout_step` messages this plan encodes to.
    pub fn exercise_count(&self) -> usize {
        self.blocks.iter().map(|b| b.exercises.len()).sum()
    }
}

fn plan_exercise(step: &ExerciseStep, sets: u32, name_as_notes: bool) -> PlanExercise {
    let notes = match &step.subtitle {
        None if name_as_notes => Some(step.name.clone()),
        subtitle => subtitle.clone(),
    };
    PlanExercise {
        name: step.name.clone(),
        reps: reps_from_duration(&step.duration),
        sets: sets.max(1),
        intensity: step.intensity.and_then(|i| i.known()),
        category: step.category.and_then(valid_category),
        exercise_id: step.exercise_id,
        notes,
    }
}

fn valid_category(category: CategoryValue) -> Option<ExerciseCategory> {
    category
        .known()
        .filter(|c| *c != ExerciseCategory::Unknown)
}

fn reps_from_duration(duration: &StepDuration) -> Option<Reps> {
    match duration {
        StepDuration::Reps(n) => Some(Reps::Count(*n)),
        StepDuration::Time(s) if s.0 > 0.0 => Some(Reps::Text(format!("{}s", trim_float(s.0)))),
        StepDuration::Distance(m) if m.0 > 0.0 => {
            Some(Reps::Text(format!("{}m", trim_float(m.0))))
        }
        _ => None,
    }
}

/// Formats without a trailing `.0`, keeping up to three decimals.
fn trim_float(v: f64) -> String {
    let s = format!("{:.3}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_owned()
}

impl From<&WorkoutModel> for WorkoutPlan {
    fn from(model: &WorkoutModel) -> Self {
        Self::from_model(model)
    }
}
