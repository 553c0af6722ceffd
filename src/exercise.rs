//! Maps free-form exercise names onto FIT exercise codes.
//!
//! Exercise ids are only given where the code is certain; for everything else
//! the category alone is written and the step name carries the detail.

use phf::phf_map;
use strum::IntoEnumIterator;

use crate::profile::ExerciseCategory;

/// A category and, when known, the `exercise_name` code within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExerciseCode {
    pub category: ExerciseCategory,
    pub exercise_id: Option<u16>,
}

impl ExerciseCode {
    const fn new(category: ExerciseCategory, exercise_id: Option<u16>) -> Self {
        Self {
            category,
            exercise_id,
        }
    }
}

use ExerciseCategory as C;

static EXERCISES: phf::Map<&'static str, ExerciseCode> = phf_map! {
    "bench press" => ExerciseCode::new(C::BenchPress, Some(1)),
    "barbell bench press" => ExerciseCode::new(C::BenchPress, Some(1)),
    "dumbbell bench press" => ExerciseCode::new(C::BenchPress, Some(6)),
    "incline bench press" => ExerciseCode::new(C::BenchPress, None),
    "calf raise" => ExerciseCode::new(C::CalfRaise, None),
    "farmers walk" => ExerciseCode::new(C::Carry, None),
    "farmer carry" => ExerciseCode::new(C::Carry, None),
    "woodchop" => ExerciseCode::new(C::Chop, None),
    "dead bug" => ExerciseCode::new(C::Core, None),
    "bicycle crunch" => ExerciseCode::new(C::Crunch, None),
    "bicep curl" => ExerciseCode::new(C::Curl, None),
    "biceps curl" => ExerciseCode::new(C::Curl, None),
    "hammer curl" => ExerciseCode::new(C::Curl, None),
    "deadlift" => ExerciseCode::new(C::Deadlift, Some(0)),
    "barbell deadlift" => ExerciseCode::new(C::Deadlift, Some(0)),
    "romanian deadlift" => ExerciseCode::new(C::Deadlift, None),
    "rdl" => ExerciseCode::new(C::Deadlift, None),
    "chest fly" => ExerciseCode::new(C::Flye, None),
    "glute bridge" => ExerciseCode::new(C::HipRaise, None),
    "hip thrust" => ExerciseCode::new(C::HipRaise, None),
    "clamshell" => ExerciseCode::new(C::HipStability, None),
    "kettlebell swing" => ExerciseCode::new(C::HipSwing, None),
    "back extension" => ExerciseCode::new(C::Hyperextension, None),
    "lateral raise" => ExerciseCode::new(C::LateralRaise, None),
    "hamstring curl" => ExerciseCode::new(C::LegCurl, None),
    "hanging leg raise" => ExerciseCode::new(C::LegRaise, None),
    "walking lunge" => ExerciseCode::new(C::Lunge, None),
    "split squat" => ExerciseCode::new(C::Lunge, None),
    "bulgarian split squat" => ExerciseCode::new(C::Lunge, None),
    "power clean" => ExerciseCode::new(C::OlympicLift, None),
    "clean and jerk" => ExerciseCode::new(C::OlympicLift, None),
    "snatch" => ExerciseCode::new(C::OlympicLift, None),
    "side plank" => ExerciseCode::new(C::Plank, None),
    "box jump" => ExerciseCode::new(C::Plyo, None),
    "burpee" => ExerciseCode::new(C::TotalBody, None),
    "chin up" => ExerciseCode::new(C::PullUp, None),
    "lat pulldown" => ExerciseCode::new(C::PullUp, None),
    "pushup" => ExerciseCode::new(C::PushUp, None),
    "bent over row" => ExerciseCode::new(C::Row, None),
    "dumbbell row" => ExerciseCode::new(C::Row, None),
    "overhead press" => ExerciseCode::new(C::ShoulderPress, None),
    "military press" => ExerciseCode::new(C::ShoulderPress, None),
    "face pull" => ExerciseCode::new(C::ShoulderStability, None),
    "situp" => ExerciseCode::new(C::SitUp, None),
    "back squat" => ExerciseCode::new(C::Squat, None),
    "front squat" => ExerciseCode::new(C::Squat, None),
    "goblet squat" => ExerciseCode::new(C::Squat, None),
    "skull crusher" => ExerciseCode::new(C::TricepsExtension, None),
    "tricep extension" => ExerciseCode::new(C::TricepsExtension, None),
    "dip" => ExerciseCode::new(C::TricepsExtension, None),
    "jumping jack" => ExerciseCode::new(C::WarmUp, None),
    "jumping jacks" => ExerciseCode::new(C::WarmUp, None),
    "treadmill run" => ExerciseCode::new(C::Run, None),
};

/// Lowercases and turns `_` and `-` into spaces, collapsing runs of spaces.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Looks a name up in the canonical table, then falls back to the category
/// whose name appears in it (the longest match wins), and finally to
/// `total_body`.
pub fn lookup_exercise(name: &str) -> ExerciseCode {
    let normalized = normalize_name(name);
    if let Some(code) = EXERCISES.get(normalized.as_str()) {
        return *code;
    }

    ExerciseCategory::iter()
        .filter(|c| *c != ExerciseCategory::Unknown)
        .filter_map(|c| {
            let words = normalize_name(c.into());
            normalized.contains(&words).then_some((words.len(), c))
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, category)| ExerciseCode::new(category, None))
        .unwrap_or(ExerciseCode::new(ExerciseCategory::TotalBody, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Bench_Press "), "bench press");
        assert_eq!(normalize_name("Pull-Up"), "pull up");
        assert_eq!(normalize_name("Back   Squat"), "back squat");
    }

    #[test]
    fn test_table_lookup() {
        assert_eq!(
            lookup_exercise("Bench Press"),
            ExerciseCode::new(ExerciseCategory::BenchPress, Some(1))
        );
        assert_eq!(
            lookup_exercise("dumbbell-bench-press"),
            ExerciseCode::new(ExerciseCategory::BenchPress, Some(6))
        );
        assert_eq!(
            lookup_exercise("Barbell Deadlift"),
            ExerciseCode::new(ExerciseCategory::Deadlift, Some(0))
        );
        assert_eq!(
            lookup_exercise("Goblet Squat"),
            ExerciseCode::new(ExerciseCategory::Squat, None)
        );
    }

    #[test]
    fn test_keyword_fallback() {
        assert_eq!(
            lookup_exercise("Pause Squat").category,
            ExerciseCategory::Squat
        );
        // "leg curl" beats "curl".
        assert_eq!(
            lookup_exercise("Seated Leg Curl").category,
            ExerciseCategory::LegCurl
        );
        assert_eq!(
            lookup_exercise("Weighted Pull Up").category,
            ExerciseCategory::PullUp
        );
        assert_eq!(lookup_exercise("Weighted Pull Up").exercise_id, None);
    }

    #[test]
    fn test_default_category() {
        assert_eq!(
            lookup_exercise("Turkish get up"),
            ExerciseCode::new(ExerciseCategory::TotalBody, None)
        );
        assert_eq!(lookup_exercise("").category, ExerciseCategory::TotalBody);
    }

    #[test]
    fn test_every_code_is_in_range() {
        for (name, code) in EXERCISES.entries() {
            assert!(
                u16::from(code.category) <= crate::profile::MAX_EXERCISE_CATEGORY,
                "{name}"
            );
        }
    }
}
