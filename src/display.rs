//! Text formatting for durations, distances and sports.

use phf::phf_map;

/// Formats a step duration: `"45s"`, `"1:30"`, `"5min"`, `"1h 30m"`, `"2h"`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };

    if total < 60 {
        format!("{total}s")
    } else if total < 3600 {
        let (m, s) = (total / 60, total % 60);
        if s == 0 {
            format!("{m}min")
        } else {
            format!("{m}:{s:02}")
        }
    } else {
        let (h, m) = (total / 3600, (total % 3600) / 60);
        if m == 0 {
            format!("{h}h")
        } else {
            format!("{h}h {m}m")
        }
    }
}

/// Formats a distance in meters: `"400m"` below a kilometer, `"1.5km"` above.
pub fn format_distance(meters: f64) -> String {
    let meters = if meters.is_finite() { meters.max(0.0) } else { 0.0 };
    if meters < 1000.0 {
        format!("{}m", meters.trunc() as u64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Turns a profile tag such as `strength_training` into `Strength Training`.
pub fn titleize(tag: &str) -> String {
    tag.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// The heading shown for a workout's sport. A specific sub sport reads better
/// than its parent sport, so it wins unless it is `generic` or `all`.
pub fn get_sport_display(sport: Option<&str>, sub_sport: Option<&str>) -> String {
    match (sport, sub_sport) {
        (_, Some(sub)) if !matches!(sub, "generic" | "all" | "") => titleize(sub),
        (Some(sport), _) if !sport.is_empty() => titleize(sport),
        _ => "Workout".to_owned(),
    }
}

static SPORT_COLORS: phf::Map<&'static str, &'static str> = phf_map! {
    "running" => "#FF9500",
    "trail" => "#A2845E",
    "treadmill" => "#FF9500",
    "cycling" => "#34C759",
    "indoor_cycling" => "#34C759",
    "swimming" => "#5AC8FA",
    "lap_swimming" => "#5AC8FA",
    "walking" => "#30B0C7",
    "hiking" => "#A2845E",
    "training" => "#AF52DE",
    "strength_training" => "#AF52DE",
    "cardio_training" => "#FF3B30",
    "hiit" => "#FF3B30",
    "yoga" => "#5856D6",
    "pilates" => "#5856D6",
    "flexibility_training" => "#5856D6",
    "rowing" => "#007AFF",
    "indoor_rowing" => "#007AFF",
};

const DEFAULT_SPORT_COLOR: &str = "#8E8E93";

/// An accent color for the sport, as a `#RRGGBB` string. The sub sport is
/// looked up first.
pub fn get_sport_color(sport: Option<&str>, sub_sport: Option<&str>) -> &'static str {
    sub_sport
        .and_then(|s| SPORT_COLORS.get(s))
        .or_else(|| sport.and_then(|s| SPORT_COLORS.get(s)))
        .copied()
        .unwrap_or(DEFAULT_SPORT_COLOR)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::Result;
    use paste::paste;
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct FormatDatum {
        input: f64,
        expected: String,
    }

    fn read_cases(name: &str) -> Result<Vec<FormatDatum>> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("testdata")
            .join(name);
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let mut cases = Vec::new();
        for case in rdr.deserialize() {
            cases.push(case?);
        }
        Ok(cases)
    }

    #[test]
    fn test_format_duration_table() -> Result<()> {
        for case in read_cases("durations.csv")? {
            assert_eq!(format_duration(case.input), case.expected, "{}", case.input);
        }
        Ok(())
    }

    #[test]
    fn test_format_distance_table() -> Result<()> {
        for case in read_cases("distances.csv")? {
            assert_eq!(format_distance(case.input), case.expected, "{}", case.input);
        }
        Ok(())
    }

    macro_rules! titleize_case {
        ($name:ident, $input:expr, $expected:expr) => {
            paste! {
                #[test]
                fn [<test_titleize_ $name>]() {
                    assert_eq!(titleize($input), $expected);
                }
            }
        };
    }

    titleize_case!(snake, "strength_training", "Strength Training");
    titleize_case!(single, "squat", "Squat");
    titleize_case!(mixed_case, "HIIT", "Hiit");
    titleize_case!(numeric, "45", "45");
    titleize_case!(empty, "", "");
    titleize_case!(doubled_separator, "bench__press", "Bench Press");

    #[test]
    fn test_sport_display() {
        assert_eq!(
            get_sport_display(Some("training"), Some("strength_training")),
            "Strength Training"
        );
        assert_eq!(get_sport_display(Some("running"), Some("generic")), "Running");
        assert_eq!(get_sport_display(Some("running"), None), "Running");
        assert_eq!(get_sport_display(None, None), "Workout");
    }

    #[test]
    fn test_sport_color() {
        assert_eq!(get_sport_color(Some("running"), None), "#FF9500");
        assert_eq!(get_sport_color(Some("training"), Some("yoga")), "#5856D6");
        assert_eq!(get_sport_color(Some("golf"), Some("generic")), DEFAULT_SPORT_COLOR);
        assert_eq!(get_sport_color(None, None), DEFAULT_SPORT_COLOR);
    }
}
