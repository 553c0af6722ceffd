//! Rebuilds the structure of a workout from its flat step list.
//!
//! FIT stores a workout as a flat run of steps where a repeat is a marker step
//! that points back at earlier ones. [`WorkoutBuilder`] folds the common
//! `exercise, rest, repeat` pattern into a [`DisplayStep::RepeatBlock`], turns
//! any other repeat marker into a set count on the step before it, and names
//! every step for display.

use chrono::{DateTime, Utc};
use phf::phf_set;
use tracing::debug;

use crate::display::titleize;
use crate::interpret::{
    DecodedWorkout, ExerciseTitleIndex, StepDuration, StepRole, StepWeight, WorkoutStep,
};
use crate::profile::{CategoryValue, DurationType, EnumValue, Intensity, Sport, SubSport};

static CARDIO_SPORTS: phf::Set<&'static str> = phf_set! {
    "running",
    "cycling",
    "swimming",
    "walking",
    "hiking",
    "run",
    "bike",
    "swim",
    "walk",
    "hike",
    "cardio",
    "trail_running",
    "treadmill",
};

/// Whether steps of this sport are named by intensity rather than by
/// exercise. Sport strings vary across firmware versions, so anything that
/// mentions running also counts.
pub fn is_cardio(sport: Option<&str>, sub_sport: Option<&str>) -> bool {
    [sport, sub_sport].into_iter().flatten().any(|s| {
        let s = s.to_lowercase();
        CARDIO_SPORTS.contains(s.as_str()) || s.contains("run")
    })
}

/// How a rest step ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestDuration {
    /// The athlete presses the lap button to move on.
    LapButton,
    Seconds(u32),
}

impl RestDuration {
    fn from_step(duration: &StepDuration) -> Self {
        match duration {
            StepDuration::Time(s) if s.0 >= 0.5 => Self::Seconds(s.0.round() as u32),
            _ => Self::LapButton,
        }
    }

    pub fn seconds(&self) -> Option<u32> {
        match self {
            Self::LapButton => None,
            Self::Seconds(s) => Some(*s),
        }
    }
}

/// An exercise, warmup or cooldown as displayed.
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseStep {
    pub name: String,
    /// The step's notes, when they were not already used as its name.
    pub subtitle: Option<String>,
    pub duration: StepDuration,
    pub sets: u32,
    pub intensity: Option<EnumValue<Intensity>>,
    pub category: Option<CategoryValue>,
    pub exercise_id: Option<u16>,
    pub weight: Option<StepWeight>,
    pub target: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RestStep {
    pub name: String,
    pub duration_type: Option<EnumValue<DurationType>>,
    pub rest: RestDuration,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DisplayStep {
    Exercise(ExerciseStep),
    Rest(RestStep),
    Warmup(ExerciseStep),
    Cooldown(ExerciseStep),
    /// `steps` performed `count` times in total.
    RepeatBlock { count: u32, steps: Vec<DisplayStep> },
}

impl DisplayStep {
    pub fn step_type(&self) -> &'static str {
        match self {
            Self::Exercise(_) => "exercise",
            Self::Rest(_) => "rest",
            Self::Warmup(_) => "warmup",
            Self::Cooldown(_) => "cooldown",
            Self::RepeatBlock { .. } => "repeat",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Exercise(e) | Self::Warmup(e) | Self::Cooldown(e) => &e.name,
            Self::Rest(r) => &r.name,
            Self::RepeatBlock { .. } => "Repeat",
        }
    }

    fn as_exercise_mut(&mut self) -> Option<&mut ExerciseStep> {
        match self {
            Self::Exercise(e) | Self::Warmup(e) | Self::Cooldown(e) => Some(e),
            _ => None,
        }
    }
}

/// Where the model came from.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Fidelity {
    /// Decoded from the FIT records.
    #[default]
    Full,
    /// Only printable strings could be recovered from a file of `size` bytes.
    Basic { size: usize, strings: Vec<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkoutModel {
    pub name: String,
    pub sport: Option<EnumValue<Sport>>,
    pub sub_sport: Option<EnumValue<SubSport>>,
    pub created: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub manufacturer: Option<String>,
    pub steps: Vec<DisplayStep>,
    pub fidelity: Fidelity,
}

pub const DEFAULT_WORKOUT_NAME: &str = "Workout";

impl Default for WorkoutModel {
    fn default() -> Self {
        Self {
            name: DEFAULT_WORKOUT_NAME.to_owned(),
            sport: None,
            sub_sport: None,
            created: None,
            source: None,
            manufacturer: None,
            steps: Vec::new(),
            fidelity: Fidelity::Full,
        }
    }
}

impl WorkoutModel {
    pub fn from_decoded(decoded: &DecodedWorkout) -> Self {
        let workout = decoded.workout.clone().unwrap_or_default();
        let file_id = decoded.file_id.clone().unwrap_or_default();
        let sport_tag = workout.sport.map(|s| s.to_string());
        let sub_sport_tag = workout.sub_sport.map(|s| s.to_string());

        let steps = WorkoutBuilder::new(
            sport_tag.as_deref(),
            sub_sport_tag.as_deref(),
            &decoded.titles,
        )
        .build(&decoded.steps);

        Self {
            name: workout
                .name
                .unwrap_or_else(|| DEFAULT_WORKOUT_NAME.to_owned()),
            sport: workout.sport,
            sub_sport: workout.sub_sport,
            created: file_id.time_created.and_then(|t| t.to_utc()),
            source: file_id.source(),
            manufacturer: file_id.manufacturer.map(|m| titleize(&m.to_string())),
            steps,
            fidelity: Fidelity::Full,
        }
    }

    pub fn sport_tag(&self) -> Option<String> {
        self.sport.map(|s| s.to_string())
    }

    pub fn sub_sport_tag(&self) -> Option<String> {
        self.sub_sport.map(|s| s.to_string())
    }

    pub fn is_cardio(&self) -> bool {
        is_cardio(self.sport_tag().as_deref(), self.sub_sport_tag().as_deref())
    }

    /// Every step, with repeat blocks expanded in place after the block.
    pub fn flat_steps(&self) -> Vec<&DisplayStep> {
        fn walk<'a>(steps: &'a [DisplayStep], out: &mut Vec<&'a DisplayStep>) {
            for step in steps {
                out.push(step);
                if let DisplayStep::RepeatBlock { steps, .. } = step {
                    walk(steps, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.steps, &mut out);
        out
    }

    /// Sets across all exercises, counting repeat blocks once per pass.
    pub fn total_sets(&self) -> u32 {
        fn sets(steps: &[DisplayStep]) -> u32 {
            steps
                .iter()
                .map(|s| match s {
                    DisplayStep::Exercise(e) => e.sets,
                    DisplayStep::RepeatBlock { count, steps } => count.saturating_mul(sets(steps)),
                    _ => 0,
                })
                .fold(0u32, u32::saturating_add)
        }
        sets(&self.steps)
    }
}

/// Builds display steps for one workout.
pub struct WorkoutBuilder<'a> {
    cardio: bool,
    sport_name: String,
    titles: &'a ExerciseTitleIndex,
}

impl<'a> WorkoutBuilder<'a> {
    pub fn new(
        sport: Option<&str>,
        sub_sport: Option<&str>,
        titles: &'a ExerciseTitleIndex,
    ) -> Self {
        Self {
            cardio: is_cardio(sport, sub_sport),
            sport_name: sport.map(titleize).unwrap_or_else(|| "Workout".to_owned()),
            titles,
        }
    }

    pub fn build(&self, steps: &[WorkoutStep]) -> Vec<DisplayStep> {
        let mut out: Vec<DisplayStep> = Vec::new();
        let mut i = 0;
        while i < steps.len() {
            let step = &steps[i];

            if let [first, rest, marker] = &steps[i..steps.len().min(i + 3)] {
                if !matches!(first.role(), StepRole::Rest | StepRole::Repeat)
                    && rest.role() == StepRole::Rest
                    && marker.role() == StepRole::Repeat
                {
                    out.push(DisplayStep::RepeatBlock {
                        count: marker.repeat_count.unwrap_or(0).saturating_add(1),
                        steps: vec![self.display(first), self.display(rest)],
                    });
                    i += 3;
                    continue;
                }
            }

            if step.role() == StepRole::Repeat {
                Self::apply_lone_marker(&mut out, step);
            } else {
                out.push(self.display(step));
            }
            i += 1;
        }
        out
    }

    fn apply_lone_marker(out: &mut [DisplayStep], marker: &WorkoutStep) {
        let Some(count) = marker.repeat_count.filter(|&c| c > 0) else {
            debug!("Dropping repeat marker {:?} without a count", marker.message_index);
            return;
        };
        // Applies to the most recent non-rest step, never past a repeat block.
        let last = out
            .iter_mut()
            .rev()
            .find(|s| !matches!(s, DisplayStep::Rest(_)));
        match last.and_then(DisplayStep::as_exercise_mut) {
            Some(target) => target.sets = count.saturating_add(1),
            None => debug!("Repeat marker {:?} has no step to apply to", marker.message_index),
        }
    }

    fn display(&self, step: &WorkoutStep) -> DisplayStep {
        let role = step.role();
        if role == StepRole::Rest {
            return DisplayStep::Rest(RestStep {
                name: if self.cardio { "Recovery" } else { "Rest" }.to_owned(),
                duration_type: step.duration_type,
                rest: RestDuration::from_step(&step.duration),
            });
        }

        let (name, subtitle) = if self.cardio {
            self.cardio_name(step, role)
        } else {
            (self.strength_name(step), step.notes.clone())
        };
        let exercise = ExerciseStep {
            name,
            subtitle,
            duration: step.duration,
            sets: 1,
            intensity: step.intensity,
            category: step.category,
            exercise_id: step.exercise_id,
            weight: step.weight,
            target: step.target.and_then(|t| t.zone_label()),
        };
        match role {
            StepRole::Warmup => DisplayStep::Warmup(exercise),
            StepRole::Cooldown => DisplayStep::Cooldown(exercise),
            _ => DisplayStep::Exercise(exercise),
        }
    }

    fn cardio_name(&self, step: &WorkoutStep, role: StepRole) -> (String, Option<String>) {
        let fixed = match role {
            StepRole::Warmup => Some("Warm Up"),
            StepRole::Cooldown => Some("Cool Down"),
            StepRole::Rest => Some("Recovery"),
            _ => None,
        };
        match (fixed, &step.notes) {
            (Some(name), notes) => (name.to_owned(), notes.clone()),
            (None, Some(notes)) => (notes.clone(), None),
            (None, None) => (self.sport_name.clone(), None),
        }
    }

    fn strength_name(&self, step: &WorkoutStep) -> String {
        if let Some(name) = &step.name {
            return name.clone();
        }
        let Some(category) = step.category else {
            return "Exercise".to_owned();
        };
        step.exercise_id
            .and_then(|id| self.titles.by_exercise(category, id))
            .or_else(|| self.titles.by_category(category))
            .map(str::to_owned)
            .unwrap_or_else(|| titleize(&category.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::decode::decode;
    use crate::interpret::interpret_file;
    use crate::measure::Seconds;
    use crate::testonly::{StepFixture, workout_fixture};

    fn model(
        sport: u8,
        sub_sport: u8,
        steps: &[StepFixture],
        titles: &[(u16, u16, &str)],
    ) -> Result<WorkoutModel> {
        let bytes = workout_fixture("Test Workout", sport, sub_sport, steps, titles);
        Ok(WorkoutModel::from_decoded(&interpret_file(&decode(&bytes)?)))
    }

    fn exercise(step: &DisplayStep) -> &ExerciseStep {
        match step {
            DisplayStep::Exercise(e) | DisplayStep::Warmup(e) | DisplayStep::Cooldown(e) => e,
            other => panic!("expected an exercise, got {other:?}"),
        }
    }

    #[test]
    fn test_cardio_classification() {
        assert!(is_cardio(Some("running"), None));
        assert!(is_cardio(Some("training"), Some("treadmill")));
        assert!(is_cardio(Some("Cycling"), None));
        assert!(is_cardio(None, Some("indoor_running")));
        assert!(is_cardio(Some("trail_run"), None));
        assert!(!is_cardio(Some("training"), Some("strength_training")));
        assert!(!is_cardio(None, None));
    }

    #[test]
    fn test_repeat_block_folding() -> Result<()> {
        let m = model(
            10,
            20,
            &[
                StepFixture::exercise("A", 28).with_reps(10),
                StepFixture::rest(Some(10)),
                StepFixture::repeat(0, 2),
            ],
            &[],
        )?;

        assert_eq!(m.steps.len(), 1);
        let DisplayStep::RepeatBlock { count, steps } = &m.steps[0] else {
            panic!("expected a repeat block, got {:?}", m.steps[0]);
        };
        assert_eq!(*count, 3);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name(), "A");
        assert_eq!(exercise(&steps[0]).duration, StepDuration::Reps(10));
        assert_eq!(
            steps[1],
            DisplayStep::Rest(RestStep {
                name: "Rest".to_owned(),
                duration_type: Some(EnumValue::Known(DurationType::Time)),
                rest: RestDuration::Seconds(10),
            })
        );
        assert_eq!(m.total_sets(), 3);
        Ok(())
    }

    #[test]
    fn test_lone_marker_sets_count() -> Result<()> {
        let m = model(
            10,
            20,
            &[
                StepFixture::exercise("A", 28),
                StepFixture::exercise("B", 0),
                StepFixture::repeat(0, 3),
                StepFixture::rest(Some(60)),
            ],
            &[],
        )?;

        // Two exercises before one marker do not match the folding window.
        let types: Vec<_> = m.steps.iter().map(DisplayStep::step_type).collect();
        assert_eq!(types, vec!["exercise", "exercise", "rest"]);
        assert_eq!(exercise(&m.steps[0]).sets, 1);
        assert_eq!(exercise(&m.steps[1]).sets, 4);
        Ok(())
    }

    #[test]
    fn test_lone_marker_after_block_is_dropped() -> Result<()> {
        let m = model(
            10,
            20,
            &[
                StepFixture::exercise("A", 28),
                StepFixture::exercise("B", 0),
                StepFixture::rest(Some(30)),
                StepFixture::repeat(1, 2),
                StepFixture::repeat(0, 4),
            ],
            &[],
        )?;

        let types: Vec<_> = m.steps.iter().map(DisplayStep::step_type).collect();
        assert_eq!(types, vec!["exercise", "repeat"]);
        assert_eq!(exercise(&m.steps[0]).sets, 1);
        assert_eq!(m.total_sets(), 4);
        Ok(())
    }

    #[test]
    fn test_lone_marker_skips_rest() -> Result<()> {
        let m = model(
            10,
            20,
            &[
                StepFixture::exercise("A", 28),
                StepFixture::exercise("B", 0),
                StepFixture::rest(None),
                StepFixture::rest(Some(30)),
                StepFixture::repeat(1, 1),
            ],
            &[],
        )?;

        let types: Vec<_> = m.steps.iter().map(DisplayStep::step_type).collect();
        assert_eq!(types, vec!["exercise", "exercise", "rest", "rest"]);
        assert_eq!(exercise(&m.steps[1]).sets, 2);
        Ok(())
    }

    #[test]
    fn test_lone_marker_without_count_is_dropped() -> Result<()> {
        let m = model(
            10,
            20,
            &[StepFixture::exercise("A", 28), StepFixture::repeat(0, 0)],
            &[],
        )?;
        assert_eq!(m.steps.len(), 1);
        assert_eq!(exercise(&m.steps[0]).sets, 1);
        Ok(())
    }

    #[test]
    fn test_cardio_warmup_named_by_intensity() -> Result<()> {
        let m = model(
            1,
            0,
            &[
                StepFixture {
                    intensity: Some(2),
                    notes: Some("Easy jog"),
                    duration_type: Some(0),
                    duration_value: Some(600_000),
                    ..StepFixture::default()
                },
                StepFixture {
                    intensity: Some(0),
                    notes: Some("Tempo"),
                    ..StepFixture::default()
                },
                StepFixture {
                    intensity: Some(0),
                    ..StepFixture::default()
                },
                StepFixture::rest(None),
                StepFixture {
                    intensity: Some(3),
                    ..StepFixture::default()
                },
            ],
            &[],
        )?;

        assert_eq!(m.steps[0].step_type(), "warmup");
        assert_eq!(m.steps[0].name(), "Warm Up");
        assert_eq!(exercise(&m.steps[0]).subtitle.as_deref(), Some("Easy jog"));
        assert_eq!(
            exercise(&m.steps[0]).duration,
            StepDuration::Time(Seconds(600.0))
        );
        assert_eq!(m.steps[1].name(), "Tempo");
        assert_eq!(exercise(&m.steps[1]).subtitle, None);
        assert_eq!(m.steps[2].name(), "Running");
        assert_eq!(m.steps[3].name(), "Recovery");
        assert_eq!(m.steps[4].name(), "Cool Down");
        assert_eq!(m.steps[4].step_type(), "cooldown");
        Ok(())
    }

    #[test]
    fn test_strength_name_resolution() -> Result<()> {
        let m = model(
            10,
            20,
            &[
                StepFixture::exercise("Own Name", 28),
                StepFixture {
                    category: Some(28),
                    exercise_name: Some(2),
                    ..StepFixture::default()
                },
                StepFixture {
                    category: Some(0),
                    exercise_name: Some(9),
                    ..StepFixture::default()
                },
                StepFixture {
                    category: Some(23),
                    ..StepFixture::default()
                },
                StepFixture {
                    category: Some(45),
                    ..StepFixture::default()
                },
                StepFixture::default(),
            ],
            &[(28, 2, "Back Squat"), (0, 1, "Flat Bench")],
        )?;

        let names: Vec<_> = m.steps.iter().map(DisplayStep::name).collect();
        assert_eq!(
            names,
            vec!["Own Name", "Back Squat", "Flat Bench", "Row", "45", "Exercise"]
        );
        Ok(())
    }

    #[test]
    fn test_rest_durations() -> Result<()> {
        let m = model(
            10,
            20,
            &[
                StepFixture::rest(Some(45)),
                StepFixture::rest(Some(0)),
                StepFixture::rest(None),
                StepFixture {
                    intensity: Some(1),
                    ..StepFixture::default()
                },
            ],
            &[],
        )?;
        let rests: Vec<_> = m
            .steps
            .iter()
            .map(|s| match s {
                DisplayStep::Rest(r) => r.rest,
                other => panic!("expected a rest, got {other:?}"),
            })
            .collect();
        assert_eq!(
            rests,
            vec![
                RestDuration::Seconds(45),
                RestDuration::LapButton,
                RestDuration::LapButton,
                RestDuration::LapButton,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_model_metadata() -> Result<()> {
        let m = model(10, 20, &[], &[])?;
        assert_eq!(m.name, "Test Workout");
        assert_eq!(m.sport, Some(EnumValue::Known(Sport::Training)));
        assert_eq!(m.source.as_deref(), Some("Connect"));
        assert_eq!(m.manufacturer.as_deref(), Some("Garmin"));
        assert!(m.created.is_some());
        assert_eq!(m.fidelity, Fidelity::Full);
        assert!(!m.is_cardio());
        Ok(())
    }
}
