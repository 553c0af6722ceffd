//! Names and types the fields of workout-related messages.
//!
//! [`field_spec`] is the one table mapping `(global message, field number)` to
//! a [`FieldKey`] and the [`FieldCodec`] that reads it. [`interpret`] applies
//! it to a [`FitMessage`], resolves the dynamic sub-fields the FIT profile
//! defines (`duration_time`, `repeat_steps`, `garmin_product`, ...), and the
//! typed records below are read from the result.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use strum::{Display, IntoStaticStr};
use tracing::debug;

use crate::decode::{FitFile, FitMessage, Value};
use crate::display::titleize;
use crate::measure::{Meters, Seconds};
use crate::profile::{
    CategoryValue, DurationType, EnumValue, ExerciseCategory, FileType, GarminProduct,
    GlobalMessage, Intensity, Manufacturer, ProfileEnum, Sport, SubSport, TargetType, WeightUnit,
    common_field, exercise_title_field, file_id_field, workout_field, workout_step_field,
};
use crate::types::FitDateTime;

/// Every field this crate reads, named as in the FIT profile.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FieldKey {
    #[strum(serialize = "type")]
    FileType,
    Manufacturer,
    Product,
    GarminProduct,
    SerialNumber,
    TimeCreated,
    Number,
    ProductName,
    WktName,
    Sport,
    SubSport,
    NumValidSteps,
    Capabilities,
    PoolLength,
    PoolLengthUnit,
    MessageIndex,
    WktStepName,
    DurationType,
    DurationValue,
    DurationTime,
    DurationDistance,
    DurationReps,
    DurationStep,
    TargetType,
    TargetValue,
    RepeatSteps,
    CustomTargetValueLow,
    CustomTargetValueHigh,
    Intensity,
    Notes,
    Equipment,
    ExerciseCategory,
    ExerciseName,
    ExerciseWeight,
    WeightDisplayUnit,
    Timestamp,
}

/// The enumerations a field can be typed as.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EnumKind {
    FileType,
    Manufacturer,
    GarminProduct,
    Sport,
    SubSport,
    Intensity,
    DurationType,
    TargetType,
    WeightUnit,
    ExerciseCategory,
}

impl EnumKind {
    /// The profile tag for `raw`, or the integer as text for unknown codes.
    pub fn tag(self, raw: u32) -> String {
        fn tag_of<T: ProfileEnum + Display>(raw: u32) -> String {
            EnumValue::<T>::from_raw(raw).to_string()
        }

        match self {
            Self::FileType => tag_of::<FileType>(raw),
            Self::Manufacturer => tag_of::<Manufacturer>(raw),
            Self::GarminProduct => tag_of::<GarminProduct>(raw),
            Self::Sport => tag_of::<Sport>(raw),
            Self::SubSport => tag_of::<SubSport>(raw),
            Self::Intensity => tag_of::<Intensity>(raw),
            Self::DurationType => tag_of::<DurationType>(raw),
            Self::TargetType => tag_of::<TargetType>(raw),
            Self::WeightUnit => tag_of::<WeightUnit>(raw),
            Self::ExerciseCategory => tag_of::<ExerciseCategory>(raw),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum FieldCodec {
    Text,
    Enum(EnumKind),
    Integer,
    DateTime,
    /// Stored as an integer, meaning `raw / scale - offset`.
    Scaled { scale: f64, offset: f64 },
}

/// Looks up how to read field `number` of global message `global`.
pub fn field_spec(global: u16, number: u8) -> Option<(FieldKey, FieldCodec)> {
    use FieldCodec::{DateTime, Enum, Integer, Scaled, Text};
    use GlobalMessage as G;

    let message = GlobalMessage::try_from(global).ok()?;
    let spec = match (message, number) {
        (_, common_field::TIMESTAMP) => (FieldKey::Timestamp, DateTime),
        (_, common_field::MESSAGE_INDEX) => (FieldKey::MessageIndex, Integer),

        (G::FileId, file_id_field::TYPE) => (FieldKey::FileType, Enum(EnumKind::FileType)),
        (G::FileId, file_id_field::MANUFACTURER) => {
            (FieldKey::Manufacturer, Enum(EnumKind::Manufacturer))
        }
        (G::FileId, file_id_field::PRODUCT) => (FieldKey::Product, Integer),
        (G::FileId, file_id_field::SERIAL_NUMBER) => (FieldKey::SerialNumber, Integer),
        (G::FileId, file_id_field::TIME_CREATED) => (FieldKey::TimeCreated, DateTime),
        (G::FileId, file_id_field::NUMBER) => (FieldKey::Number, Integer),
        (G::FileId, file_id_field::PRODUCT_NAME) => (FieldKey::ProductName, Text),

        (G::Workout, workout_field::SPORT) => (FieldKey::Sport, Enum(EnumKind::Sport)),
        (G::Workout, workout_field::CAPABILITIES) => (FieldKey::Capabilities, Integer),
        (G::Workout, workout_field::NUM_VALID_STEPS) => (FieldKey::NumValidSteps, Integer),
        (G::Workout, workout_field::WKT_NAME) => (FieldKey::WktName, Text),
        (G::Workout, workout_field::SUB_SPORT) => (FieldKey::SubSport, Enum(EnumKind::SubSport)),
        (G::Workout, workout_field::POOL_LENGTH) => (
            FieldKey::PoolLength,
            Scaled {
                scale: 100.0,
                offset: 0.0,
            },
        ),
        (G::Workout, workout_field::POOL_LENGTH_UNIT) => (FieldKey::PoolLengthUnit, Integer),

        (G::WorkoutStep, workout_step_field::WKT_STEP_NAME) => (FieldKey::WktStepName, Text),
        (G::WorkoutStep, workout_step_field::DURATION_TYPE) => {
            (FieldKey::DurationType, Enum(EnumKind::DurationType))
        }
        (G::WorkoutStep, workout_step_field::DURATION_VALUE) => (FieldKey::DurationValue, Integer),
        (G::WorkoutStep, workout_step_field::TARGET_TYPE) => {
            (FieldKey::TargetType, Enum(EnumKind::TargetType))
        }
        (G::WorkoutStep, workout_step_field::TARGET_VALUE) => (FieldKey::TargetValue, Integer),
        (G::WorkoutStep, workout_step_field::CUSTOM_TARGET_VALUE_LOW) => {
            (FieldKey::CustomTargetValueLow, Integer)
        }
        (G::WorkoutStep, workout_step_field::CUSTOM_TARGET_VALUE_HIGH) => {
            (FieldKey::CustomTargetValueHigh, Integer)
        }
        (G::WorkoutStep, workout_step_field::INTENSITY) => {
            (FieldKey::Intensity, Enum(EnumKind::Intensity))
        }
        (G::WorkoutStep, workout_step_field::NOTES) => (FieldKey::Notes, Text),
        (G::WorkoutStep, workout_step_field::EQUIPMENT) => (FieldKey::Equipment, Integer),
        (G::WorkoutStep, workout_step_field::EXERCISE_CATEGORY) => {
            (FieldKey::ExerciseCategory, Enum(EnumKind::ExerciseCategory))
        }
        (G::WorkoutStep, workout_step_field::EXERCISE_NAME) => (FieldKey::ExerciseName, Integer),
        (G::WorkoutStep, workout_step_field::EXERCISE_WEIGHT) => (
            FieldKey::ExerciseWeight,
            Scaled {
                scale: 100.0,
                offset: 0.0,
            },
        ),
        (G::WorkoutStep, workout_step_field::WEIGHT_DISPLAY_UNIT) => {
            (FieldKey::WeightDisplayUnit, Enum(EnumKind::WeightUnit))
        }

        (G::ExerciseTitle, exercise_title_field::EXERCISE_CATEGORY) => {
            (FieldKey::ExerciseCategory, Enum(EnumKind::ExerciseCategory))
        }
        (G::ExerciseTitle, exercise_title_field::EXERCISE_NAME) => {
            (FieldKey::ExerciseName, Integer)
        }
        (G::ExerciseTitle, exercise_title_field::WKT_STEP_NAME) => (FieldKey::WktStepName, Text),

        _ => return None,
    };
    Some(spec)
}

/// A field value read through its codec.
#[derive(Clone, Debug, PartialEq)]
pub enum Reading {
    Text(String),
    Enum { kind: EnumKind, raw: u32 },
    Integer(u64),
    Time(FitDateTime),
    Scaled { raw: u64, scale: f64, offset: f64 },
}

impl Reading {
    fn read(codec: FieldCodec, value: &Value) -> Option<Self> {
        match codec {
            FieldCodec::Text => value.as_str().map(|s| Self::Text(s.to_owned())),
            FieldCodec::Enum(kind) => value.as_u32().map(|raw| Self::Enum { kind, raw }),
            FieldCodec::Integer => value.as_u64().map(Self::Integer),
            FieldCodec::DateTime => value.as_u32().map(|v| Self::Time(FitDateTime::from_raw(v))),
            FieldCodec::Scaled { scale, offset } => {
                value.as_u64().map(|raw| Self::Scaled { raw, scale, offset })
            }
        }
    }

    pub fn real(&self) -> Option<f64> {
        match self {
            Self::Scaled { raw, scale, offset } => Some(*raw as f64 / scale - offset),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl Display for Reading {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Enum { kind, raw } => write!(f, "{}", kind.tag(*raw)),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Time(t) => match t.to_utc() {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "+{}s", t.raw()),
            },
            Self::Scaled { .. } => write!(f, "{}", self.real().unwrap_or_default()),
        }
    }
}

/// The named fields of one message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamedFields(BTreeMap<FieldKey, Reading>);

impl NamedFields {
    pub fn get(&self, key: FieldKey) -> Option<&Reading> {
        self.0.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &Reading)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn text(&self, key: FieldKey) -> Option<&str> {
        match self.get(key)? {
            Reading::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, key: FieldKey) -> Option<u64> {
        match self.get(key)? {
            Reading::Integer(v) => Some(*v),
            Reading::Scaled { raw, .. } => Some(*raw),
            Reading::Enum { raw, .. } => Some(u64::from(*raw)),
            _ => None,
        }
    }

    pub fn real(&self, key: FieldKey) -> Option<f64> {
        self.get(key)?.real()
    }

    pub fn time(&self, key: FieldKey) -> Option<FitDateTime> {
        match self.get(key)? {
            Reading::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn enum_value<T: ProfileEnum>(&self, key: FieldKey) -> Option<EnumValue<T>> {
        match self.get(key)? {
            Reading::Enum { raw, .. } => Some(EnumValue::from_raw(*raw)),
            _ => None,
        }
    }

    fn u16(&self, key: FieldKey) -> Option<u16> {
        self.integer(key).and_then(|v| u16::try_from(v).ok())
    }

    fn u32(&self, key: FieldKey) -> Option<u32> {
        self.integer(key).and_then(|v| u32::try_from(v).ok())
    }

    fn insert(&mut self, key: FieldKey, reading: Reading) {
        self.0.insert(key, reading);
    }
}

/// Reads the named fields of a message. Fields this crate has no name for are
/// skipped; an unknown message yields an empty mapping.
pub fn interpret(message: &FitMessage) -> NamedFields {
    let mut fields = NamedFields::default();
    for field in &message.fields {
        let Some(value) = &field.value else {
            continue;
        };
        let Some((key, codec)) = field_spec(message.global_message_number, field.number) else {
            continue;
        };
        match Reading::read(codec, value) {
            Some(reading) => fields.insert(key, reading),
            None => debug!(
                "Field {key} of global message {} has unexpected value {value:?}",
                message.global_message_number
            ),
        }
    }

    match message.kind() {
        Some(GlobalMessage::FileId) => resolve_product(&mut fields),
        Some(GlobalMessage::WorkoutStep) => resolve_step_subfields(&mut fields),
        _ => (),
    }
    fields
}

fn resolve_product(fields: &mut NamedFields) {
    let garmin = fields
        .enum_value::<Manufacturer>(FieldKey::Manufacturer)
        .and_then(|m| m.known())
        .is_some_and(Manufacturer::uses_garmin_products);
    if let (true, Some(product)) = (garmin, fields.u32(FieldKey::Product)) {
        fields.insert(
            FieldKey::GarminProduct,
            Reading::Enum {
                kind: EnumKind::GarminProduct,
                raw: product,
            },
        );
    }
}

fn resolve_step_subfields(fields: &mut NamedFields) {
    let duration_type = fields
        .enum_value::<DurationType>(FieldKey::DurationType)
        .and_then(|d| d.known());

    if let (Some(duration_type), Some(raw)) = (duration_type, fields.integer(FieldKey::DurationValue))
    {
        let resolved = match duration_type {
            DurationType::Time | DurationType::RepetitionTime => Some((
                FieldKey::DurationTime,
                Reading::Scaled {
                    raw,
                    scale: 1000.0,
                    offset: 0.0,
                },
            )),
            DurationType::Distance => Some((
                FieldKey::DurationDistance,
                Reading::Scaled {
                    raw,
                    scale: 100.0,
                    offset: 0.0,
                },
            )),
            DurationType::Reps => Some((FieldKey::DurationReps, Reading::Integer(raw))),
            d if d.is_repeat() => Some((FieldKey::DurationStep, Reading::Integer(raw))),
            _ => None,
        };
        if let Some((key, reading)) = resolved {
            fields.insert(key, reading);
        }
    }

    if duration_type == Some(DurationType::RepeatUntilStepsCmplt) {
        if let Some(raw) = fields.integer(FieldKey::TargetValue) {
            fields.insert(FieldKey::RepeatSteps, Reading::Integer(raw));
        }
    }
}

/// `file_id`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileIdRecord {
    pub file_type: Option<EnumValue<FileType>>,
    pub manufacturer: Option<EnumValue<Manufacturer>>,
    pub product: Option<u16>,
    pub garmin_product: Option<EnumValue<GarminProduct>>,
    pub serial_number: Option<u32>,
    pub product_name: Option<String>,
    pub time_created: Option<FitDateTime>,
}

impl FileIdRecord {
    pub fn from_fields(fields: &NamedFields) -> Self {
        Self {
            file_type: fields.enum_value(FieldKey::FileType),
            manufacturer: fields.enum_value(FieldKey::Manufacturer),
            product: fields.u16(FieldKey::Product),
            garmin_product: fields.enum_value(FieldKey::GarminProduct),
            serial_number: fields.u32(FieldKey::SerialNumber),
            product_name: fields.text(FieldKey::ProductName).map(str::to_owned),
            time_created: fields.time(FieldKey::TimeCreated),
        }
    }

    /// A human-readable name for the program or device that wrote the file.
    pub fn source(&self) -> Option<String> {
        match (&self.garmin_product, &self.product_name) {
            (Some(product), _) => Some(titleize(&product.to_string())),
            (None, Some(name)) => Some(name.clone()),
            (None, None) => None,
        }
    }
}

/// `workout`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkoutRecord {
    pub name: Option<String>,
    pub sport: Option<EnumValue<Sport>>,
    pub sub_sport: Option<EnumValue<SubSport>>,
    pub num_valid_steps: Option<u16>,
}

impl WorkoutRecord {
    pub fn from_fields(fields: &NamedFields) -> Self {
        Self {
            name: fields.text(FieldKey::WktName).map(str::to_owned),
            sport: fields.enum_value(FieldKey::Sport),
            sub_sport: fields.enum_value(FieldKey::SubSport),
            num_valid_steps: fields.u16(FieldKey::NumValidSteps),
        }
    }
}

/// How long a step lasts, with the FIT storage units already applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepDuration {
    Time(Seconds<f64>),
    Distance(Meters<f64>),
    Reps(u32),
    Calories(u32),
    /// Until the lap button is pressed.
    Open,
    /// A repeat marker pointing back at this step index.
    RepeatFrom(u32),
    /// Heart rate, power and other conditions, kept as found.
    Other {
        duration_type: EnumValue<DurationType>,
        value: Option<u32>,
    },
}

/// A step's intensity target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepTarget {
    pub target_type: EnumValue<TargetType>,
    pub value: u32,
}

impl StepTarget {
    /// A short label for the target zone, for the target types that have one.
    pub fn zone_label(&self) -> Option<String> {
        if self.value == 0 {
            return None;
        }
        match self.target_type.known()? {
            TargetType::HeartRate | TargetType::HeartRateLap => {
                Some(format!("HR Zone {}", self.value))
            }
            TargetType::Speed | TargetType::SpeedLap => Some(format!("Pace {}", self.value)),
            TargetType::Power
            | TargetType::Power3s
            | TargetType::Power10s
            | TargetType::Power30s
            | TargetType::PowerLap => Some(format!("{}W", self.value)),
            _ => None,
        }
    }
}

/// An exercise weight as it should be shown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepWeight {
    pub value: f64,
    pub unit: Option<EnumValue<WeightUnit>>,
}

impl StepWeight {
    fn from_fields(fields: &NamedFields) -> Option<Self> {
        let unit = fields.enum_value::<WeightUnit>(FieldKey::WeightDisplayUnit);
        // Pound weights are shown as the stored integer, without the x100
        // scale that kilogram weights get.
        let value = if unit.is_some_and(|u| u.is(WeightUnit::Pound)) {
            fields.integer(FieldKey::ExerciseWeight)? as f64
        } else {
            fields.real(FieldKey::ExerciseWeight)?
        };
        Some(Self { value, unit })
    }

    pub fn label(&self) -> String {
        let whole = self.value.trunc() as i64;
        if self.unit.is_some_and(|u| u.is(WeightUnit::Pound)) {
            format!("{whole}")
        } else {
            format!("{whole} kg")
        }
    }
}

/// The semantic role of a raw step. Exactly one applies to every step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StepRole {
    Repeat,
    Rest,
    Warmup,
    Cooldown,
    Exercise,
}

/// `workout_step`, before any grouping.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkoutStep {
    pub message_index: Option<u16>,
    pub name: Option<String>,
    pub category: Option<CategoryValue>,
    pub exercise_id: Option<u16>,
    pub duration_type: Option<EnumValue<DurationType>>,
    pub duration_value: Option<u32>,
    pub duration: StepDuration,
    pub intensity: Option<EnumValue<Intensity>>,
    /// Extra passes for a `repeat_until_steps_cmplt` marker.
    pub repeat_count: Option<u32>,
    pub target: Option<StepTarget>,
    pub weight: Option<StepWeight>,
    pub notes: Option<String>,
}

impl WorkoutStep {
    pub fn from_fields(fields: &NamedFields) -> Self {
        Self {
            message_index: fields.u16(FieldKey::MessageIndex),
            name: fields.text(FieldKey::WktStepName).map(str::to_owned),
            category: fields.enum_value(FieldKey::ExerciseCategory),
            exercise_id: fields.u16(FieldKey::ExerciseName),
            duration_type: fields.enum_value(FieldKey::DurationType),
            duration_value: fields.u32(FieldKey::DurationValue),
            duration: Self::resolve_duration(fields),
            intensity: fields.enum_value(FieldKey::Intensity),
            repeat_count: fields.u32(FieldKey::RepeatSteps),
            target: fields
                .enum_value::<TargetType>(FieldKey::TargetType)
                .zip(fields.u32(FieldKey::TargetValue))
                .map(|(target_type, value)| StepTarget { target_type, value }),
            weight: StepWeight::from_fields(fields),
            notes: fields.text(FieldKey::Notes).map(str::to_owned),
        }
    }

    fn resolve_duration(fields: &NamedFields) -> StepDuration {
        if let Some(s) = fields.real(FieldKey::DurationTime) {
            return StepDuration::Time(Seconds(s));
        }
        if let Some(m) = fields.real(FieldKey::DurationDistance) {
            return StepDuration::Distance(Meters(m));
        }
        if let Some(reps) = fields.u32(FieldKey::DurationReps) {
            return StepDuration::Reps(reps);
        }
        if let Some(step) = fields.u32(FieldKey::DurationStep) {
            return StepDuration::RepeatFrom(step);
        }

        let value = fields.u32(FieldKey::DurationValue);
        match fields.enum_value::<DurationType>(FieldKey::DurationType) {
            None => StepDuration::Open,
            Some(d) => match (d.known(), value) {
                (Some(DurationType::Open), _) => StepDuration::Open,
                (Some(DurationType::Calories), Some(kcal)) => StepDuration::Calories(kcal),
                // A time, distance or reps step without its value.
                (
                    Some(DurationType::Time | DurationType::Distance | DurationType::Reps),
                    None,
                ) => StepDuration::Open,
                _ => StepDuration::Other {
                    duration_type: d,
                    value,
                },
            },
        }
    }

    pub fn is_repeat(&self) -> bool {
        self.duration_type
            .and_then(|d| d.known())
            .is_some_and(DurationType::is_repeat)
    }

    pub fn role(&self) -> StepRole {
        if self.is_repeat() {
            return StepRole::Repeat;
        }
        match self.intensity.and_then(|i| i.known()) {
            Some(Intensity::Rest) => StepRole::Rest,
            Some(Intensity::Warmup) => StepRole::Warmup,
            Some(Intensity::Cooldown) => StepRole::Cooldown,
            _ => StepRole::Exercise,
        }
    }
}

/// `exercise_title`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExerciseTitle {
    pub message_index: Option<u16>,
    pub category: Option<CategoryValue>,
    pub exercise_id: Option<u16>,
    pub name: Option<String>,
}

impl ExerciseTitle {
    pub fn from_fields(fields: &NamedFields) -> Self {
        Self {
            message_index: fields.u16(FieldKey::MessageIndex),
            category: fields.enum_value(FieldKey::ExerciseCategory),
            exercise_id: fields.u16(FieldKey::ExerciseName),
            name: fields.text(FieldKey::WktStepName).map(str::to_owned),
        }
    }
}

/// Display names from `exercise_title` messages, by exact exercise and by
/// category. A later title replaces an earlier one for the same key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExerciseTitleIndex {
    by_exercise: HashMap<(CategoryValue, u16), String>,
    by_category: HashMap<CategoryValue, String>,
}

impl ExerciseTitleIndex {
    pub fn insert(&mut self, title: &ExerciseTitle) {
        let (Some(category), Some(name)) = (title.category, &title.name) else {
            return;
        };
        if let Some(id) = title.exercise_id {
            self.by_exercise.insert((category, id), name.clone());
        }
        self.by_category.insert(category, name.clone());
    }

    pub fn by_exercise(&self, category: CategoryValue, exercise_id: u16) -> Option<&str> {
        self.by_exercise
            .get(&(category, exercise_id))
            .map(String::as_str)
    }

    pub fn by_category(&self, category: CategoryValue) -> Option<&str> {
        self.by_category.get(&category).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }
}

/// The workout-related content of a decoded file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedWorkout {
    pub file_id: Option<FileIdRecord>,
    pub workout: Option<WorkoutRecord>,
    pub steps: Vec<WorkoutStep>,
    pub titles: ExerciseTitleIndex,
    /// Messages with a global number outside the workout profile.
    pub other_messages: usize,
}

/// Interprets every message of a decoded file.
///
/// Titles are indexed in a pass of their own first, so step naming never
/// depends on where the `exercise_title` messages sit in the file.
pub fn interpret_file(file: &FitFile) -> DecodedWorkout {
    let mut decoded = DecodedWorkout::default();

    for message in &file.messages {
        if message.kind() == Some(GlobalMessage::ExerciseTitle) {
            decoded
                .titles
                .insert(&ExerciseTitle::from_fields(&interpret(message)));
        }
    }

    for message in &file.messages {
        match message.kind() {
            Some(GlobalMessage::FileId) => {
                if decoded.file_id.is_none() {
                    decoded.file_id = Some(FileIdRecord::from_fields(&interpret(message)));
                }
            }
            Some(GlobalMessage::Workout) => {
                if decoded.workout.is_none() {
                    decoded.workout = Some(WorkoutRecord::from_fields(&interpret(message)));
                } else {
                    debug!("Ignoring additional workout message");
                }
            }
            Some(GlobalMessage::WorkoutStep) => {
                decoded
                    .steps
                    .push(WorkoutStep::from_fields(&interpret(message)));
            }
            Some(GlobalMessage::ExerciseTitle | GlobalMessage::FileCreator) => (),
            None => decoded.other_messages += 1,
        }
    }

    debug!(
        "Interpreted {} workout steps, {} other messages",
        decoded.steps.len(),
        decoded.other_messages
    );
    decoded
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use approx::assert_relative_eq;

    use super::*;
    use crate::decode::decode;
    use crate::testonly::{StepFixture, workout_fixture};

    fn decode_fixture(steps: &[StepFixture], titles: &[(u16, u16, &str)]) -> Result<DecodedWorkout> {
        let bytes = workout_fixture("Leg Day", 10, 20, steps, titles);
        Ok(interpret_file(&decode(&bytes)?))
    }

    #[test]
    fn test_field_names() {
        assert_eq!(FieldKey::FileType.to_string(), "type");
        assert_eq!(FieldKey::WktStepName.to_string(), "wkt_step_name");
        assert_eq!(FieldKey::RepeatSteps.to_string(), "repeat_steps");
        assert_eq!(
            field_spec(27, 10),
            Some((
                FieldKey::ExerciseCategory,
                FieldCodec::Enum(EnumKind::ExerciseCategory)
            ))
        );
        assert_eq!(field_spec(27, 200), None);
        assert_eq!(field_spec(20, 3), None);
    }

    #[test]
    fn test_file_and_workout_records() -> Result<()> {
        let decoded = decode_fixture(&[], &[])?;

        let file_id = decoded.file_id.unwrap_or_default();
        assert_eq!(file_id.file_type, Some(EnumValue::Known(FileType::Workout)));
        assert_eq!(
            file_id.manufacturer,
            Some(EnumValue::Known(Manufacturer::Garmin))
        );
        assert_eq!(
            file_id.garmin_product,
            Some(EnumValue::Known(GarminProduct::Connect))
        );
        assert_eq!(file_id.source().as_deref(), Some("Connect"));
        assert!(file_id.time_created.is_some_and(|t| t.is_absolute()));

        let workout = decoded.workout.unwrap_or_default();
        assert_eq!(workout.name.as_deref(), Some("Leg Day"));
        assert_eq!(workout.sport, Some(EnumValue::Known(Sport::Training)));
        assert_eq!(
            workout.sub_sport,
            Some(EnumValue::Known(SubSport::StrengthTraining))
        );
        assert_eq!(workout.num_valid_steps, Some(0));
        Ok(())
    }

    #[test]
    fn test_step_durations() -> Result<()> {
        let decoded = decode_fixture(
            &[
                StepFixture::exercise("Squat", 28).with_reps(12),
                StepFixture::rest(Some(90)),
                StepFixture::rest(None),
                StepFixture {
                    duration_type: Some(1),
                    duration_value: Some(40_000),
                    ..StepFixture::default()
                },
                StepFixture::repeat(0, 2),
            ],
            &[],
        )?;
        let durations: Vec<_> = decoded.steps.iter().map(|s| s.duration).collect();

        assert_eq!(durations[0], StepDuration::Reps(12));
        match durations[1] {
            StepDuration::Time(s) => assert_relative_eq!(s, Seconds(90.0)),
            other => panic!("expected a time duration, got {other:?}"),
        }
        assert_eq!(durations[2], StepDuration::Open);
        match durations[3] {
            StepDuration::Distance(m) => assert_relative_eq!(m, Meters(400.0)),
            other => panic!("expected a distance duration, got {other:?}"),
        }
        assert_eq!(durations[4], StepDuration::RepeatFrom(0));
        assert_eq!(decoded.steps[4].repeat_count, Some(2));
        assert_eq!(decoded.steps[0].repeat_count, None);
        Ok(())
    }

    #[test]
    fn test_roles() -> Result<()> {
        let decoded = decode_fixture(
            &[
                StepFixture {
                    intensity: Some(2),
                    ..StepFixture::default()
                },
                StepFixture::exercise("Squat", 28),
                StepFixture::rest(Some(30)),
                // A repeat marker with rest intensity is still a repeat.
                StepFixture {
                    intensity: Some(1),
                    ..StepFixture::repeat(1, 2)
                },
                StepFixture {
                    intensity: Some(3),
                    ..StepFixture::default()
                },
                StepFixture::default(),
            ],
            &[],
        )?;
        let roles: Vec<_> = decoded.steps.iter().map(WorkoutStep::role).collect();
        assert_eq!(
            roles,
            vec![
                StepRole::Warmup,
                StepRole::Exercise,
                StepRole::Rest,
                StepRole::Repeat,
                StepRole::Cooldown,
                StepRole::Exercise,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unknown_category_passes_through() -> Result<()> {
        let decoded = decode_fixture(&[StepFixture::exercise("Mystery", 45)], &[])?;
        let step = &decoded.steps[0];
        assert_eq!(step.category, Some(EnumValue::Unknown(45)));
        assert_eq!(step.category.map(|c| c.to_string()).as_deref(), Some("45"));
        Ok(())
    }

    #[test]
    fn test_kilogram_weight() -> Result<()> {
        let decoded = decode_fixture(
            &[StepFixture {
                weight: Some(6000),
                weight_unit: Some(1),
                ..StepFixture::exercise("Bench Press", 0)
            }],
            &[],
        )?;
        let weight = decoded.steps[0].weight.map(|w| w.label());
        assert_eq!(weight.as_deref(), Some("60 kg"));
        Ok(())
    }

    /// Pound weights come through as the unscaled stored integer and without
    /// a unit label, unlike kilograms.
    #[test]
    fn test_pound_weight_is_unscaled() -> Result<()> {
        let decoded = decode_fixture(
            &[StepFixture {
                weight: Some(135),
                weight_unit: Some(2),
                ..StepFixture::exercise("Bench Press", 0)
            }],
            &[],
        )?;
        let weight = decoded.steps[0].weight.unwrap_or(StepWeight {
            value: 0.0,
            unit: None,
        });
        assert_relative_eq!(weight.value, 135.0);
        assert_eq!(weight.label(), "135");
        Ok(())
    }

    #[test]
    fn test_zone_labels() {
        let target = |target_type: TargetType, value| StepTarget {
            target_type: EnumValue::Known(target_type),
            value,
        };
        assert_eq!(
            target(TargetType::HeartRate, 3).zone_label().as_deref(),
            Some("HR Zone 3")
        );
        assert_eq!(
            target(TargetType::Speed, 5).zone_label().as_deref(),
            Some("Pace 5")
        );
        assert_eq!(
            target(TargetType::Power, 250).zone_label().as_deref(),
            Some("250W")
        );
        assert_eq!(target(TargetType::Open, 2).zone_label(), None);
        assert_eq!(target(TargetType::HeartRate, 0).zone_label(), None);
    }

    #[test]
    fn test_title_index() -> Result<()> {
        let decoded = decode_fixture(
            &[],
            &[
                (28, 2, "Back Squat"),
                (28, 7, "Goblet Squat"),
                (0, 1, "Bench"),
            ],
        )?;
        let squat = EnumValue::Known(ExerciseCategory::Squat);
        assert_eq!(decoded.titles.by_exercise(squat, 2), Some("Back Squat"));
        assert_eq!(decoded.titles.by_exercise(squat, 7), Some("Goblet Squat"));
        assert_eq!(decoded.titles.by_category(squat), Some("Goblet Squat"));
        assert_eq!(decoded.titles.by_exercise(squat, 3), None);
        Ok(())
    }

    #[test]
    fn test_interpret_named_fields() -> Result<()> {
        let bytes = workout_fixture(
            "Intervals",
            1,
            0,
            &[StepFixture::exercise("Squat", 28).with_reps(10)],
            &[],
        );
        let file = decode(&bytes)?;
        let step = file
            .messages
            .iter()
            .find(|m| m.kind() == Some(GlobalMessage::WorkoutStep))
            .map(interpret)
            .unwrap_or_default();

        assert_eq!(step.text(FieldKey::WktStepName), Some("Squat"));
        assert_eq!(step.integer(FieldKey::DurationReps), Some(10));
        assert_eq!(
            step.get(FieldKey::ExerciseCategory).map(Reading::to_string).as_deref(),
            Some("squat")
        );
        assert_eq!(
            step.get(FieldKey::DurationType).map(Reading::to_string).as_deref(),
            Some("reps")
        );
        assert_eq!(step.get(FieldKey::Notes), None);
        Ok(())
    }
}
