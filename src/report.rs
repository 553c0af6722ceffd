//! Plain-text previews of workouts and validation results.

use std::fmt::Write;

use crate::display::{format_distance, format_duration, get_sport_color, get_sport_display};
use crate::interpret::StepDuration;
use crate::validate::ValidationResult;
use crate::workout::{DisplayStep, ExerciseStep, Fidelity, RestDuration, WorkoutModel};

const INDENT: &str = "    ";

/// A short label for how long a step lasts.
pub fn duration_label(duration: &StepDuration) -> Option<String> {
    match duration {
        StepDuration::Time(s) => Some(format_duration(s.0)),
        StepDuration::Distance(m) => Some(format_distance(m.0)),
        StepDuration::Reps(n) => Some(format!("{n} reps")),
        StepDuration::Calories(n) => Some(format!("{n} kcal")),
        StepDuration::Open => Some("Lap button".to_owned()),
        StepDuration::RepeatFrom(_) | StepDuration::Other { .. } => None,
    }
}

fn rest_label(rest: &RestDuration) -> String {
    match rest {
        RestDuration::LapButton => "Lap button".to_owned(),
        RestDuration::Seconds(s) => format_duration(f64::from(*s)),
    }
}

/// Seconds of timed work and rest, counting each pass of a repeat block.
pub fn total_seconds(steps: &[DisplayStep]) -> f64 {
    steps
        .iter()
        .map(|step| match step {
            DisplayStep::Exercise(e) | DisplayStep::Warmup(e) | DisplayStep::Cooldown(e) => {
                match e.duration {
                    StepDuration::Time(s) => s.0 * f64::from(e.sets),
                    _ => 0.0,
                }
            }
            DisplayStep::Rest(r) => r.rest.seconds().map(f64::from).unwrap_or(0.0),
            DisplayStep::RepeatBlock { count, steps } => f64::from(*count) * total_seconds(steps),
        })
        .sum()
}

fn exercise_badges(e: &ExerciseStep) -> Vec<String> {
    let mut badges = Vec::new();
    badges.extend(e.target.clone());
    badges.extend(duration_label(&e.duration));
    if e.sets > 1 {
        badges.push(format!("{} sets", e.sets));
    }
    badges.extend(e.weight.map(|w| w.label()));
    badges
}

fn write_step(out: &mut String, step: &DisplayStep, depth: usize) -> std::fmt::Result {
    let pad = INDENT.repeat(depth);
    match step {
        DisplayStep::Exercise(e) | DisplayStep::Warmup(e) | DisplayStep::Cooldown(e) => {
            let badges = exercise_badges(e);
            write!(out, "{pad}- {}", e.name)?;
            if !badges.is_empty() {
                write!(out, " [{}]", badges.join(" | "))?;
            }
            if !matches!(step, DisplayStep::Exercise(_)) {
                write!(out, " ({})", step.step_type())?;
            }
            writeln!(out)?;
            if let Some(subtitle) = &e.subtitle {
                writeln!(out, "{pad}  {subtitle}")?;
            }
        }
        DisplayStep::Rest(r) => {
            writeln!(out, "{pad}- {} [{}]", r.name, rest_label(&r.rest))?;
        }
        DisplayStep::RepeatBlock { count, steps } => {
            writeln!(out, "{pad}- Repeat {count}x")?;
            for inner in steps {
                write_step(out, inner, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn render_workout(model: &WorkoutModel) -> Result<String, std::fmt::Error> {
    let sport = model.sport_tag();
    let sub_sport = model.sub_sport_tag();
    let mut out = String::new();

    writeln!(out, "{}", model.name)?;
    writeln!(
        out,
        "{} ({})",
        get_sport_display(sport.as_deref(), sub_sport.as_deref()),
        get_sport_color(sport.as_deref(), sub_sport.as_deref())
    )?;

    let mut meta = Vec::new();
    meta.extend(model.source.clone());
    meta.extend(model.created.map(|c| c.format("%Y-%m-%d").to_string()));
    let seconds = total_seconds(&model.steps);
    if seconds > 0.0 {
        meta.push(format_duration(seconds));
    }
    if !meta.is_empty() {
        writeln!(out, "{}", meta.join(" • "))?;
    }
    writeln!(out)?;

    if let Fidelity::Basic { size, strings } = &model.fidelity {
        writeln!(
            out,
            "Only basic information could be read from this {size} byte file."
        )?;
        for s in strings {
            writeln!(out, "{INDENT}{s}")?;
        }
        return Ok(out);
    }

    for step in &model.steps {
        write_step(&mut out, step, 0)?;
    }

    let n = model.steps.len();
    let total_sets = model.total_sets();
    writeln!(out)?;
    if total_sets as usize > n {
        writeln!(out, "{n} steps • {total_sets} total sets")?;
    } else {
        writeln!(out, "{n} steps")?;
    }
    Ok(out)
}

/// Renders a workout the way a watch would list it.
pub fn workout_report(model: &WorkoutModel) -> String {
    // Writing into a String does not fail.
    render_workout(model).unwrap_or_default()
}

/// One status line for a file, followed by its issues.
pub fn validation_report(label: &str, result: &ValidationResult) -> String {
    let mut out = if result.valid {
        format!("{label}: OK\n")
    } else {
        format!("{label}: INVALID\n")
    };
    for issue in &result.issues {
        out.push_str(INDENT);
        out.push_str(issue);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use anyhow::Result;

    use super::*;
    use crate::decode::decode;
    use crate::interpret::interpret_file;
    use crate::measure::{Meters, Seconds};
    use crate::testonly::{StepFixture, workout_fixture};

    fn model(sport: u8, sub_sport: u8, steps: &[StepFixture]) -> Result<WorkoutModel> {
        let bytes = workout_fixture("Report Test", sport, sub_sport, steps, &[]);
        Ok(WorkoutModel::from_decoded(&interpret_file(&decode(&bytes)?)))
    }

    #[test]
    fn test_duration_labels() {
        assert_eq!(
            duration_label(&StepDuration::Time(Seconds(90.0))).as_deref(),
            Some("1:30")
        );
        assert_eq!(
            duration_label(&StepDuration::Distance(Meters(1500.0))).as_deref(),
            Some("1.5km")
        );
        assert_eq!(
            duration_label(&StepDuration::Reps(12)).as_deref(),
            Some("12 reps")
        );
        assert_eq!(duration_label(&StepDuration::RepeatFrom(0)), None);
    }

    #[test]
    fn test_strength_report() -> Result<()> {
        let m = model(
            10,
            20,
            &[
                StepFixture::exercise("Bench Press", 0).with_reps(8),
                StepFixture::rest(Some(60)),
                StepFixture::repeat(0, 2),
                StepFixture::exercise("Curl", 7).with_reps(12),
                StepFixture::repeat(3, 1),
            ],
        )?;
        let report = workout_report(&m);
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "Report Test");
        assert_eq!(lines[1], "Strength Training (#AF52DE)");
        assert!(lines[2].ends_with("3min"), "{}", lines[2]);
        assert!(report.contains("- Repeat 3x\n"));
        assert!(report.contains("    - Bench Press [8 reps]\n"));
        assert!(report.contains("    - Rest [1min]\n"));
        assert!(report.contains("- Curl [12 reps | 2 sets]\n"));
        assert_eq!(lines.last(), Some(&"2 steps • 5 total sets"));
        Ok(())
    }

    #[test]
    fn test_footer_without_extra_sets() -> Result<()> {
        let m = model(1, 0, &[StepFixture::rest(None)])?;
        let report = workout_report(&m);
        assert!(report.contains("- Recovery [Lap button]\n"));
        assert!(report.ends_with("\n1 steps\n"));
        Ok(())
    }

    #[test]
    fn test_basic_report() {
        let m = WorkoutModel {
            fidelity: Fidelity::Basic {
                size: 42,
                strings: vec!["Leg Day".to_owned()],
            },
            ..WorkoutModel::default()
        };
        let report = workout_report(&m);
        assert!(report.starts_with("Workout\nWorkout (#8E8E93)\n"));
        assert!(report.contains("this 42 byte file"));
        assert!(report.ends_with("    Leg Day\n"));
    }

    #[test]
    fn test_validation_report() {
        let ok = ValidationResult {
            valid: true,
            issues: vec![],
            invalid_categories: BTreeSet::new(),
        };
        assert_eq!(validation_report("a.fit", &ok), "a.fit: OK\n");

        let bad = ValidationResult {
            valid: false,
            issues: vec!["first".to_owned(), "second".to_owned()],
            invalid_categories: BTreeSet::from([45]),
        };
        assert_eq!(
            validation_report("b.fit", &bad),
            "b.fit: INVALID\n    first\n    second\n"
        );
    }
}
