//! Writes a [`WorkoutPlan`] as a FIT workout file.
//!
//! The plan is first lowered into the flat step list FIT expects: one
//! `workout_step` per exercise, a rest step after it when its block has a
//! rest interval, and a `repeat_until_steps_cmplt` marker pointing back at the
//! exercise when it has more than one set. The file is then written as a
//! header, one definition and data message per message type, and the CRC.

use std::collections::BTreeMap;
use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::crc::CheckSummingWrite;
use crate::exercise::lookup_exercise;
use crate::measure::{CastUnitInto, Centimeters, Milliseconds};
use crate::plan::{PlanExercise, Reps, RepsTarget, WorkoutPlan};
use crate::profile::{
    BaseType, DurationType, ExerciseCategory, FileType, GlobalMessage, Intensity, Manufacturer,
    PROFILE_VERSION, Sport, SubSport, common_field, exercise_title_field, file_creator_field,
    file_id_field, workout_field, workout_step_field,
};
use crate::types::{FitDateTime, TypeError};
use crate::workout::is_cardio;

/// An error when building a FIT workout
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BuildError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("Error encoding integer")]
    IntegerEncoding(#[from] std::num::TryFromIntError),
    #[error(
        "Unrecognized reps value {0:?}: expected a count, a time such as \"30s\" or a distance \
         such as \"400m\""
    )]
    UnrecognizedReps(String),
    #[error("Exercise {0:?} has zero sets")]
    ZeroSets(String),
    #[error("Duration of {0:?} is too long to encode")]
    DurationOutOfRange(String),
    #[error("Error encoding date_time")]
    DateTimeEncoding(#[from] TypeError),
    #[error("Workout has {0} steps, more than a FIT workout can hold")]
    TooManySteps(usize),
}

type Result<T> = std::result::Result<T, BuildError>;

const WKT_NAME_SIZE: u8 = 32;
const STEP_NAME_SIZE: u8 = 32;
const NOTES_SIZE: u8 = 50;
const PRODUCT_NAME_SIZE: u8 = 20;
/// A field definition stores its size in one byte.
const MAX_STRING_SIZE: u8 = u8::MAX;

/// `message_index` is a u16 whose all-ones value means invalid.
const MAX_STEPS: usize = u16::MAX as usize;

fn write_string_field<W: Write>(s: &str, field_size: u8, w: &mut W) -> Result<()> {
    let field_size = usize::from(field_size);
    let st = truncate_to_char_boundary(s, field_size - 1);
    if st.len() < s.len() {
        warn!("Truncating {s:?} to {} bytes", st.len());
    }
    w.write_all(st.as_bytes())?;
    for _ in 0..(field_size - st.len()) {
        w.write_u8(0)?;
    }
    Ok(())
}

/// Room for the longest string plus its NUL terminator, at least `min`.
fn string_field_size<'s, I>(strings: I, min: u8) -> u8
where
    I: IntoIterator<Item = &'s str>,
{
    let longest = strings.into_iter().map(str::len).max().unwrap_or(0);
    u8::try_from(longest.saturating_add(1))
        .unwrap_or(MAX_STRING_SIZE)
        .max(min)
}

/// Declared sizes of the variable-length string fields.
#[derive(Clone, Copy, Debug, PartialEq)]
struct StringSizes {
    wkt_name: u8,
    step_name: u8,
    notes: u8,
}

impl StringSizes {
    fn for_plan(title: &str, steps: &[StepMessage]) -> Self {
        Self {
            wkt_name: string_field_size([title], WKT_NAME_SIZE),
            step_name: string_field_size(
                steps.iter().map(|s| s.name.as_str()),
                STEP_NAME_SIZE,
            ),
            notes: string_field_size(
                steps.iter().filter_map(|s| s.notes.as_deref()),
                NOTES_SIZE,
            ),
        }
    }
}

fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[repr(u8)]
#[derive(Clone, Copy, Debug)]
enum ProtocolVersion {
    V10 = 0x10,
}

pub struct FileHeader {
    protocol_version: ProtocolVersion,
    data_size: u32,
}

impl FileHeader {
    pub fn new(data_size: usize) -> Result<Self> {
        let data_size_u32 = u32::try_from(data_size)?;
        Ok(Self {
            protocol_version: ProtocolVersion::V10,
            data_size: data_size_u32,
        })
    }

    /// Writes the first 12 header bytes; the header CRC is appended by the
    /// checksumming writer around it.
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(14)?;
        w.write_u8(self.protocol_version as u8)?;
        w.write_u16::<byteorder::LittleEndian>(PROFILE_VERSION)?;
        w.write_u32::<byteorder::LittleEndian>(self.data_size)?;
        write!(w, ".FIT")?;
        Ok(())
    }
}

struct FieldDefinition {
    field_number: u8,
    size: u8,
    base_type: BaseType,
}

impl FieldDefinition {
    fn new(field_number: u8, size: u8, base_type: BaseType) -> Self {
        Self {
            field_number,
            size,
            base_type,
        }
    }

    fn scalar(field_number: u8, base_type: BaseType) -> Self {
        Self::new(field_number, base_type.size() as u8, base_type)
    }

    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(self.field_number)?;
        w.write_u8(self.size)?;
        w.write_u8(self.base_type.wire())?;
        Ok(())
    }
}

struct DefinitionFrame {
    global_message: GlobalMessage,
    local_message_type: u8,
    field_definitions: Vec<FieldDefinition>,
}

impl DefinitionFrame {
    fn new(
        global_message: GlobalMessage,
        local_message_type: u8,
        field_definitions: Vec<FieldDefinition>,
    ) -> Self {
        Self {
            global_message,
            local_message_type,
            field_definitions,
        }
    }

    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(0b01000000 | (self.local_message_type & 0b00001111))?;
        w.write_u8(0x00)?; // reserved
        w.write_u8(0x01)?; // architecture = big endian
        w.write_u16::<BigEndian>(self.global_message.into())?;
        w.write_u8(u8::try_from(self.field_definitions.len())?)?;

        for def in &self.field_definitions {
            def.encode(w)?;
        }
        debug!(
            "Wrote definition frame for {:?} with local type {}",
            self.global_message, self.local_message_type
        );
        Ok(())
    }
}

fn write_enum_u8<W: Write, T: Into<u8>>(value: Option<T>, w: &mut W) -> Result<()> {
    w.write_u8(value.map(Into::into).unwrap_or(0xFF))?;
    Ok(())
}

fn write_opt_u16<W: Write>(value: Option<u16>, w: &mut W) -> Result<()> {
    w.write_u16::<BigEndian>(value.unwrap_or(0xFFFF))?;
    Ok(())
}

fn write_opt_u32<W: Write>(value: Option<u32>, w: &mut W) -> Result<()> {
    w.write_u32::<BigEndian>(value.unwrap_or(0xFFFF_FFFF))?;
    Ok(())
}

struct FileIdMessage<'a> {
    time_created: FitDateTime,
    product_name: &'a str,
}

impl FileIdMessage<'_> {
    fn field_definitions() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::scalar(file_id_field::TYPE, BaseType::Enum),
            FieldDefinition::scalar(file_id_field::MANUFACTURER, BaseType::Uint16),
            FieldDefinition::scalar(file_id_field::TIME_CREATED, BaseType::Uint32),
            FieldDefinition::new(
                file_id_field::PRODUCT_NAME,
                PRODUCT_NAME_SIZE,
                BaseType::String,
            ),
        ]
    }

    fn encode<W: Write>(&self, local_message_id: u8, w: &mut W) -> Result<()> {
        w.write_u8(local_message_id & 0x0F)?;
        w.write_u8(FileType::Workout.into())?;
        w.write_u16::<BigEndian>(Manufacturer::Development.into())?;
        w.write_u32::<BigEndian>(self.time_created.raw())?;
        write_string_field(self.product_name, PRODUCT_NAME_SIZE, w)?;
        Ok(())
    }
}

struct FileCreatorMessage {
    software_version: u16,
    hardware_version: u8,
}

impl FileCreatorMessage {
    fn field_definitions() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::scalar(file_creator_field::SOFTWARE_VERSION, BaseType::Uint16),
            FieldDefinition::scalar(file_creator_field::HARDWARE_VERSION, BaseType::Uint8),
        ]
    }

    fn encode<W: Write>(&self, local_message_id: u8, w: &mut W) -> Result<()> {
        w.write_u8(local_message_id & 0x0F)?;
        w.write_u16::<BigEndian>(self.software_version)?;
        w.write_u8(self.hardware_version)?;
        Ok(())
    }
}

struct WorkoutMessage<'a> {
    name: &'a str,
    sport: Sport,
    sub_sport: SubSport,
    num_valid_steps: u16,
}

impl WorkoutMessage<'_> {
    fn field_definitions(sizes: &StringSizes) -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new(workout_field::WKT_NAME, sizes.wkt_name, BaseType::String),
            FieldDefinition::scalar(workout_field::SPORT, BaseType::Enum),
            FieldDefinition::scalar(workout_field::SUB_SPORT, BaseType::Enum),
            FieldDefinition::scalar(workout_field::NUM_VALID_STEPS, BaseType::Uint16),
        ]
    }

    fn encode<W: Write>(
        &self,
        sizes: &StringSizes,
        local_message_id: u8,
        w: &mut W,
    ) -> Result<()> {
        w.write_u8(local_message_id & 0x0F)?;
        write_string_field(self.name, sizes.wkt_name, w)?;
        w.write_u8(self.sport.into())?;
        w.write_u8(self.sub_sport.into())?;
        w.write_u16::<BigEndian>(self.num_valid_steps)?;
        Ok(())
    }
}

/// One lowered `workout_step`. `None` fields are written as invalid.
#[derive(Clone, Debug, PartialEq)]
struct StepMessage {
    name: String,
    duration_type: DurationType,
    duration_value: Option<u32>,
    target_value: Option<u32>,
    intensity: Option<Intensity>,
    notes: Option<String>,
    category: Option<ExerciseCategory>,
    exercise_name: Option<u16>,
}

impl StepMessage {
    fn field_definitions(sizes: &StringSizes) -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::scalar(common_field::MESSAGE_INDEX, BaseType::Uint16),
            FieldDefinition::new(
                workout_step_field::WKT_STEP_NAME,
                sizes.step_name,
                BaseType::String,
            ),
            FieldDefinition::scalar(workout_step_field::DURATION_TYPE, BaseType::Enum),
            FieldDefinition::scalar(workout_step_field::DURATION_VALUE, BaseType::Uint32),
            FieldDefinition::scalar(workout_step_field::TARGET_TYPE, BaseType::Enum),
            FieldDefinition::scalar(workout_step_field::TARGET_VALUE, BaseType::Uint32),
            FieldDefinition::scalar(workout_step_field::INTENSITY, BaseType::Enum),
            FieldDefinition::new(workout_step_field::NOTES, sizes.notes, BaseType::String),
            FieldDefinition::scalar(workout_step_field::EXERCISE_CATEGORY, BaseType::Uint16),
            FieldDefinition::scalar(workout_step_field::EXERCISE_NAME, BaseType::Uint16),
        ]
    }

    fn encode<W: Write>(
        &self,
        sizes: &StringSizes,
        message_index: u16,
        local_message_id: u8,
        w: &mut W,
    ) -> Result<()> {
        w.write_u8(local_message_id & 0x0F)?;
        w.write_u16::<BigEndian>(message_index)?;
        write_string_field(&self.name, sizes.step_name, w)?;
        w.write_u8(self.duration_type.into())?;
        write_opt_u32(self.duration_value, w)?;
        // Target type open (2) for performed steps; repeat markers leave it
        // unset and carry their count in target_value.
        let target_type = (!self.duration_type.is_repeat()).then_some(2u8);
        write_enum_u8(target_type, w)?;
        write_opt_u32(self.target_value, w)?;
        write_enum_u8(self.intensity, w)?;
        write_string_field(self.notes.as_deref().unwrap_or(""), sizes.notes, w)?;
        write_opt_u16(self.category.map(Into::into), w)?;
        write_opt_u16(self.exercise_name, w)?;
        Ok(())
    }
}

struct ExerciseTitleMessage<'a> {
    category: ExerciseCategory,
    exercise_name: u16,
    name: &'a str,
}

impl ExerciseTitleMessage<'_> {
    fn field_definitions(sizes: &StringSizes) -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::scalar(common_field::MESSAGE_INDEX, BaseType::Uint16),
            FieldDefinition::scalar(exercise_title_field::EXERCISE_CATEGORY, BaseType::Uint16),
            FieldDefinition::scalar(exercise_title_field::EXERCISE_NAME, BaseType::Uint16),
            FieldDefinition::new(
                exercise_title_field::WKT_STEP_NAME,
                sizes.step_name,
                BaseType::String,
            ),
        ]
    }

    fn encode<W: Write>(
        &self,
        sizes: &StringSizes,
        message_index: u16,
        local_message_id: u8,
        w: &mut W,
    ) -> Result<()> {
        w.write_u8(local_message_id & 0x0F)?;
        w.write_u16::<BigEndian>(message_index)?;
        w.write_u16::<BigEndian>(self.category.into())?;
        w.write_u16::<BigEndian>(self.exercise_name)?;
        write_string_field(self.name, sizes.step_name, w)?;
        Ok(())
    }
}

/// Options for writing a FIT workout
#[derive(Clone, Debug)]
pub struct FitWorkoutOptions {
    lap_button: bool,
    time_created: DateTime<Utc>,
    product_name: String,
    software_version: u16,
    hardware_version: u8,
}

impl FitWorkoutOptions {
    /// End every exercise and rest step with the lap button
    ///
    /// Reps values are still checked, but their durations are replaced by
    /// `open`.
    pub fn with_lap_button(mut self, lap_button: bool) -> Self {
        self.lap_button = lap_button;
        self
    }

    /// Set the creation time written to `file_id`
    ///
    /// An arbitrary, but consistent and reproducible, time will be used if
    /// left unset.
    pub fn with_time_created(mut self, time_created: DateTime<Utc>) -> Self {
        self.time_created = time_created;
        self
    }

    /// Set the product name to encode
    ///
    /// The first 19 bytes of this string will go in the `file_id` message's
    /// `product_name` field.  Defaults to the empty string if unset.
    pub fn with_product_name(mut self, product_name: String) -> Self {
        self.product_name = product_name;
        self
    }

    /// Set the software version to encode
    ///
    /// This goes in the `file_creator` message's `software_version` field. Zero
    /// by default.
    pub fn with_software_version(mut self, software_version: u16) -> Self {
        self.software_version = software_version;
        self
    }

    /// Set the hardware version to encode
    ///
    /// This goes in the `file_creator` message's `hardware_version` field. Zero
    /// by default.
    pub fn with_hardware_version(mut self, hardware_version: u8) -> Self {
        self.hardware_version = hardware_version;
        self
    }

    pub fn lap_button(&self) -> bool {
        self.lap_button
    }
}

impl Default for FitWorkoutOptions {
    fn default() -> Self {
        Self {
            lap_button: false,
            // 2019-11-23T00:00:00Z
            time_created: DateTime::from_timestamp(1_574_467_200, 0).unwrap_or_default(),
            product_name: "".to_owned(),
            software_version: 0u16,
            hardware_version: 0u8,
        }
    }
}

/// A write-only Garmin FIT workout file
pub struct WorkoutFile<'a> {
    plan: &'a WorkoutPlan,
    options: FitWorkoutOptions,
    steps: Vec<StepMessage>,
    sizes: StringSizes,
    sport: Sport,
    sub_sport: SubSport,
}

impl<'a> WorkoutFile<'a> {
    /// Lowers the plan into FIT steps, failing on values that cannot be
    /// encoded.
    pub fn new(plan: &'a WorkoutPlan, options: FitWorkoutOptions) -> Result<Self> {
        let sport = plan.sport.unwrap_or(Sport::Training);
        let sub_sport = plan.sub_sport.unwrap_or(match sport {
            Sport::Training => SubSport::StrengthTraining,
            _ => SubSport::Generic,
        });
        let cardio = is_cardio(Some(&sport.to_string()), Some(&sub_sport.to_string()));
        let steps = lower_plan(plan, options.lap_button, cardio)?;
        let sizes = StringSizes::for_plan(&plan.title, &steps);
        Ok(Self {
            plan,
            options,
            steps,
            sizes,
            sport,
            sub_sport,
        })
    }

    /// Encode and write the workout file
    #[tracing::instrument(name = "encode_fit", level = "debug", skip_all)]
    pub fn encode<W: Write>(&self, mut w: W) -> Result<()> {
        let mut fw = CheckSummingWrite::new(&mut w);

        // File header, with its own CRC inside the file CRC
        let mut hw = CheckSummingWrite::new(&mut fw);
        FileHeader::new(self.get_data_size())?.encode(&mut hw)?;
        let bytes_written = hw.finish()?;
        debug!("Wrote {} file header bytes + 2 byte CRC", bytes_written);

        DefinitionFrame::new(GlobalMessage::FileId, 0u8, FileIdMessage::field_definitions())
            .encode(&mut fw)?;
        FileIdMessage {
            time_created: FitDateTime::try_from(self.options.time_created)?,
            product_name: self.options.product_name.as_str(),
        }
        .encode(0u8, &mut fw)?;

        DefinitionFrame::new(
            GlobalMessage::FileCreator,
            1u8,
            FileCreatorMessage::field_definitions(),
        )
        .encode(&mut fw)?;
        FileCreatorMessage {
            software_version: self.options.software_version,
            hardware_version: self.options.hardware_version,
        }
        .encode(1u8, &mut fw)?;

        DefinitionFrame::new(
            GlobalMessage::Workout,
            2u8,
            WorkoutMessage::field_definitions(&self.sizes),
        )
        .encode(&mut fw)?;
        WorkoutMessage {
            name: self.plan.title.as_str(),
            sport: self.sport,
            sub_sport: self.sub_sport,
            num_valid_steps: u16::try_from(self.steps.len())?,
        }
        .encode(&self.sizes, 2u8, &mut fw)?;

        DefinitionFrame::new(
            GlobalMessage::WorkoutStep,
            3u8,
            StepMessage::field_definitions(&self.sizes),
        )
        .encode(&mut fw)?;
        for (i, step) in self.steps.iter().enumerate() {
            step.encode(&self.sizes, u16::try_from(i)?, 3u8, &mut fw)?;
        }
        debug!("Encoded {} workout step messages", self.steps.len());

        let titles = self.titles();
        if !titles.is_empty() {
            DefinitionFrame::new(
                GlobalMessage::ExerciseTitle,
                4u8,
                ExerciseTitleMessage::field_definitions(&self.sizes),
            )
            .encode(&mut fw)?;
            for (i, title) in titles.iter().enumerate() {
                title.encode(&self.sizes, u16::try_from(i)?, 4u8, &mut fw)?;
            }
            debug!("Encoded {} exercise title messages", titles.len());
        }

        let bytes_written = fw.finish()?;
        debug!("Wrote {bytes_written} header and data bytes + 2 byte CRC");
        w.flush()?;
        debug!("Flushed base writer");
        Ok(())
    }

    /// One title per distinct exercise code, named after its first step.
    fn titles(&self) -> Vec<ExerciseTitleMessage<'_>> {
        let mut titles = BTreeMap::new();
        for step in &self.steps {
            if let (Some(category), Some(exercise_name)) = (step.category, step.exercise_name) {
                titles
                    .entry((u16::from(category), exercise_name))
                    .or_insert(ExerciseTitleMessage {
                        category,
                        exercise_name,
                        name: step.name.as_str(),
                    });
            }
        }
        titles.into_values().collect()
    }

    /// Computes the total size of the data segment of this file, including
    /// definition messages and data messages.
    fn get_data_size(&self) -> usize {
        let mut sz = 0usize;

        sz += Self::get_definition_message_size(FileIdMessage::field_definitions().len());
        sz += Self::get_data_message_size(FileIdMessage::field_definitions());

        sz += Self::get_definition_message_size(FileCreatorMessage::field_definitions().len());
        sz += Self::get_data_message_size(FileCreatorMessage::field_definitions());

        let workout_defs = WorkoutMessage::field_definitions(&self.sizes);
        sz += Self::get_definition_message_size(workout_defs.len());
        sz += Self::get_data_message_size(workout_defs);

        let step_defs = StepMessage::field_definitions(&self.sizes);
        sz += Self::get_definition_message_size(step_defs.len());
        sz += self.steps.len() * Self::get_data_message_size(step_defs);

        let num_titles = self.titles().len();
        if num_titles > 0 {
            let title_defs = ExerciseTitleMessage::field_definitions(&self.sizes);
            sz += Self::get_definition_message_size(title_defs.len());
            sz += num_titles * Self::get_data_message_size(title_defs);
        }

        debug!("Computed FIT data (definition + messages) size: {}", sz);

        sz
    }

    /// Computes the size of a definition message based on the number of field
    /// definitions, assuming no developer data fields.
    fn get_definition_message_size(num_defs: usize) -> usize {
        6usize + 3 * num_defs
    }

    /// Computes the size of a single instance of a data message, given its
    /// field definitions.
    fn get_data_message_size<I>(defs: I) -> usize
    where
        I: IntoIterator<Item = FieldDefinition>,
    {
        1usize + defs.into_iter().map(|def| def.size as usize).sum::<usize>()
    }
}

fn lower_plan(plan: &WorkoutPlan, lap_button: bool, cardio: bool) -> Result<Vec<StepMessage>> {
    let mut steps = Vec::new();
    for block in &plan.blocks {
        if block.exercises.is_empty() {
            if let Some(rest) = block.rest_between_sec {
                steps.push(rest_step(rest, lap_button)?);
            }
            continue;
        }

        for exercise in &block.exercises {
            if exercise.sets == 0 {
                return Err(BuildError::ZeroSets(exercise.name.clone()));
            }
            let start = steps.len();
            steps.push(exercise_step(exercise, lap_button, cardio)?);
            if let Some(rest) = block.rest_between_sec {
                steps.push(rest_step(rest, lap_button)?);
            }
            if exercise.sets > 1 {
                steps.push(StepMessage {
                    name: String::new(),
                    duration_type: DurationType::RepeatUntilStepsCmplt,
                    duration_value: Some(u32::try_from(start)?),
                    target_value: Some(exercise.sets - 1),
                    intensity: None,
                    notes: None,
                    category: None,
                    exercise_name: None,
                });
            }
        }
    }

    if steps.len() >= MAX_STEPS {
        return Err(BuildError::TooManySteps(steps.len()));
    }
    debug!("Lowered plan into {} steps", steps.len());
    Ok(steps)
}

/// A rounded duration in storage units, unless it would not fit or would read
/// back as the invalid sentinel.
fn storage_value(stored: Option<u32>, exercise: &PlanExercise) -> Result<u32> {
    stored.filter(|v| *v != u32::MAX).ok_or_else(|| {
        let reps = exercise.reps.as_ref().map(Reps::to_string);
        BuildError::DurationOutOfRange(reps.unwrap_or_default())
    })
}

fn exercise_step(exercise: &PlanExercise, lap_button: bool, cardio: bool) -> Result<StepMessage> {
    let target = exercise.reps.as_ref().map(|r| r.parse()).transpose()?;

    let (duration_type, duration_value) = match target {
        _ if lap_button => (DurationType::Open, None),
        None => (DurationType::Open, None),
        Some(RepsTarget::Count(n)) => (DurationType::Reps, Some(n)),
        Some(RepsTarget::Time(ms)) => {
            let stored: Option<Milliseconds<u32>> = Milliseconds(ms.0.round()).cast_into();
            let value = storage_value(stored.map(|m| m.0), exercise)?;
            (DurationType::Time, Some(value))
        }
        Some(RepsTarget::Distance(cm)) => {
            let stored: Option<Centimeters<u32>> = Centimeters(cm.0.round()).cast_into();
            let value = storage_value(stored.map(|c| c.0), exercise)?;
            (DurationType::Distance, Some(value))
        }
    };

    let (category, exercise_name) = if cardio {
        (None, None)
    } else {
        match exercise
            .category
            .filter(|c| *c != ExerciseCategory::Unknown)
        {
            Some(category) => (Some(category), exercise.exercise_id),
            None => {
                let code = lookup_exercise(&exercise.name);
                (Some(code.category), code.exercise_id)
            }
        }
    };

    let intensity = exercise.intensity.unwrap_or(Intensity::Active);
    // Cardio steps outside warmup and cooldown are named by their notes.
    let named_by_notes =
        cardio && !matches!(intensity, Intensity::Warmup | Intensity::Cooldown | Intensity::Rest);
    let notes = match &exercise.notes {
        None if named_by_notes => Some(exercise.name.clone()),
        notes => notes.clone(),
    };

    Ok(StepMessage {
        name: exercise.name.clone(),
        duration_type,
        duration_value,
        target_value: None,
        intensity: Some(intensity),
        notes,
        category,
        exercise_name,
    })
}

fn rest_step(seconds: u32, lap_button: bool) -> Result<StepMessage> {
    let (duration_type, duration_value) = if lap_button || seconds == 0 {
        (DurationType::Open, None)
    } else {
        let ms = seconds
            .checked_mul(1000)
            .filter(|ms| *ms != u32::MAX)
            .ok_or_else(|| BuildError::DurationOutOfRange(format!("{seconds}s rest")))?;
        (DurationType::Time, Some(ms))
    };
    Ok(StepMessage {
        name: "Rest".to_owned(),
        duration_type,
        duration_value,
        target_value: None,
        intensity: Some(Intensity::Rest),
        notes: None,
        category: None,
        exercise_name: None,
    })
}

/// Encodes a plan into a complete FIT file in memory.
#[tracing::instrument(level = "debug", skip_all)]
pub fn build_workout(plan: &WorkoutPlan, options: FitWorkoutOptions) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    WorkoutFile::new(plan, options)?.encode(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::crc::{CheckSummingWrite, checksum};
    use crate::decode::{CrcStatus, decode};
    use crate::interpret::{StepDuration, interpret_file};
    use crate::measure::{Meters, Seconds};
    use crate::plan::{PlanBlock, Reps};
    use crate::profile::EnumValue;
    use crate::workout::{DisplayStep, WorkoutModel};

    fn text(s: &str) -> Option<Reps> {
        Some(Reps::Text(s.to_owned()))
    }

    fn sample_plan() -> WorkoutPlan {
        WorkoutPlan {
            title: "Upper Body".to_owned(),
            sport: None,
            sub_sport: None,
            blocks: vec![
                PlanBlock {
                    exercises: vec![PlanExercise::new("Bench Press", Some(Reps::Count(8)), 3)],
                    rest_between_sec: Some(90),
                },
                PlanBlock {
                    exercises: vec![
                        PlanExercise::new("Plank", text("45s"), 1),
                        PlanExercise::new("Sled Push", text("20m"), 2),
                    ],
                    rest_between_sec: None,
                },
            ],
        }
    }

    fn rebuild(bytes: &[u8]) -> Result<WorkoutModel> {
        Ok(WorkoutModel::from_decoded(&interpret_file(&decode(bytes)?)))
    }

    #[test]
    fn test_header_encode() -> std::result::Result<(), BuildError> {
        let mut buf: Vec<u8> = vec![];
        let mut cw = CheckSummingWrite::new(&mut buf);
        let header = FileHeader::new(17032usize)?;
        header.encode(&mut cw)?;
        cw.finish()?;

        assert_eq!(
            buf,
            &[
                0x0e, 0x10, 0xa6, 0x52, 0x88, 0x42, 0x00, 0x00, 0x2e, 0x46, 0x49, 0x54, 0x0b, 0xb9,
            ]
        );

        Ok(())
    }

    #[test]
    fn test_file_layout() -> Result<()> {
        let bytes = build_workout(&sample_plan(), FitWorkoutOptions::default())?;
        let file = decode(&bytes)?;

        assert_eq!(file.header.header_size, 14);
        assert_eq!(file.header.data_size as usize, bytes.len() - 16);
        assert_eq!(file.header.header_crc, Some(checksum(&bytes[..12])));
        assert_eq!(file.crc, CrcStatus::Valid);
        assert_eq!(checksum(&bytes), 0);

        let kinds: Vec<_> = file.messages.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds[0], Some(GlobalMessage::FileId));
        assert_eq!(kinds[1], Some(GlobalMessage::FileCreator));
        assert_eq!(kinds[2], Some(GlobalMessage::Workout));
        Ok(())
    }

    #[test]
    fn test_lowered_steps() -> Result<()> {
        let steps = lower_plan(&sample_plan(), false, false)?;
        let types: Vec<_> = steps.iter().map(|s| s.duration_type).collect();
        assert_eq!(
            types,
            vec![
                DurationType::Reps,
                DurationType::Time,
                DurationType::RepeatUntilStepsCmplt,
                DurationType::Time,
                DurationType::Distance,
                DurationType::RepeatUntilStepsCmplt,
            ]
        );
        assert_eq!(steps[1].duration_value, Some(90_000));
        assert_eq!(steps[1].intensity, Some(Intensity::Rest));
        assert_eq!(steps[2].duration_value, Some(0));
        assert_eq!(steps[2].target_value, Some(2));
        assert_eq!(steps[3].duration_value, Some(45_000));
        assert_eq!(steps[4].duration_value, Some(2_000));
        assert_eq!(steps[5].duration_value, Some(4));
        assert_eq!(steps[5].target_value, Some(1));
        assert_eq!(steps[0].category, Some(ExerciseCategory::BenchPress));
        assert_eq!(steps[0].exercise_name, Some(1));
        Ok(())
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let model = rebuild(&build_workout(&sample_plan(), FitWorkoutOptions::default())?)?;
        assert_eq!(model.name, "Upper Body");
        assert_eq!(model.sport, Some(EnumValue::Known(Sport::Training)));

        let DisplayStep::RepeatBlock { count, steps } = &model.steps[0] else {
            panic!("expected a repeat block, got {:?}", model.steps[0]);
        };
        assert_eq!(*count, 3);
        assert_eq!(steps[0].name(), "Bench Press");

        let DisplayStep::Exercise(plank) = &model.steps[1] else {
            panic!("expected an exercise, got {:?}", model.steps[1]);
        };
        assert_eq!(plank.name, "Plank");
        assert_eq!(plank.duration, StepDuration::Time(Seconds(45.0)));
        assert_eq!(plank.sets, 1);

        let DisplayStep::Exercise(sled) = &model.steps[2] else {
            panic!("expected an exercise, got {:?}", model.steps[2]);
        };
        assert_eq!(sled.duration, StepDuration::Distance(Meters(20.0)));
        assert_eq!(sled.sets, 2);
        assert_eq!(model.steps.len(), 3);
        Ok(())
    }

    #[test]
    fn test_exercise_titles() -> Result<()> {
        let bytes = build_workout(&sample_plan(), FitWorkoutOptions::default())?;
        let decoded = interpret_file(&decode(&bytes)?);
        assert_eq!(
            decoded
                .titles
                .by_exercise(EnumValue::Known(ExerciseCategory::BenchPress), 1),
            Some("Bench Press")
        );
        Ok(())
    }

    #[test]
    fn test_lap_button() -> Result<()> {
        let steps = lower_plan(&sample_plan(), true, false)?;
        for step in steps.iter().filter(|s| !s.duration_type.is_repeat()) {
            assert_eq!(step.duration_type, DurationType::Open);
            assert_eq!(step.duration_value, None);
        }

        let mut bad = sample_plan();
        bad.blocks[0].exercises[0].reps = text("a lot");
        assert!(matches!(
            lower_plan(&bad, true, false),
            Err(BuildError::UnrecognizedReps(_))
        ));
        Ok(())
    }

    #[test]
    fn test_zero_rest_is_lap_button() -> Result<()> {
        let step = rest_step(0, false)?;
        assert_eq!(step.duration_type, DurationType::Open);
        assert_eq!(step.duration_value, None);
        Ok(())
    }

    #[test]
    fn test_rest_only_block() -> Result<()> {
        let plan = WorkoutPlan {
            blocks: vec![PlanBlock {
                exercises: vec![],
                rest_between_sec: Some(120),
            }],
            ..WorkoutPlan::new("Rest")
        };
        let steps = lower_plan(&plan, false, false)?;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].intensity, Some(Intensity::Rest));
        Ok(())
    }

    #[test]
    fn test_build_errors() {
        let mut zero = sample_plan();
        zero.blocks[0].exercises[0].sets = 0;
        assert!(matches!(
            build_workout(&zero, FitWorkoutOptions::default()),
            Err(BuildError::ZeroSets(name)) if name == "Bench Press"
        ));

        let mut long = sample_plan();
        long.blocks[0].exercises[0].reps = text("2000h");
        assert!(matches!(
            build_workout(&long, FitWorkoutOptions::default()),
            Err(BuildError::DurationOutOfRange(_))
        ));

        let early = FitWorkoutOptions::default().with_time_created(DateTime::UNIX_EPOCH);
        assert!(matches!(
            build_workout(&sample_plan(), early),
            Err(BuildError::DateTimeEncoding(_))
        ));
    }

    #[test]
    fn test_categories_always_valid() -> Result<()> {
        let plan = WorkoutPlan {
            blocks: vec![PlanBlock {
                exercises: vec![
                    PlanExercise::new("Turkish Get Up", Some(Reps::Count(5)), 1),
                    PlanExercise {
                        category: Some(ExerciseCategory::Unknown),
                        ..PlanExercise::new("Mystery", Some(Reps::Count(5)), 1)
                    },
                    PlanExercise {
                        category: Some(ExerciseCategory::Squat),
                        exercise_id: Some(2),
                        ..PlanExercise::new("Back Squat", Some(Reps::Count(5)), 1)
                    },
                ],
                rest_between_sec: None,
            }],
            ..WorkoutPlan::new("Odd")
        };
        let steps = lower_plan(&plan, false, false)?;
        assert_eq!(steps[0].category, Some(ExerciseCategory::TotalBody));
        assert_eq!(steps[1].category, Some(ExerciseCategory::TotalBody));
        assert_eq!(steps[2].category, Some(ExerciseCategory::Squat));
        assert_eq!(steps[2].exercise_name, Some(2));
        Ok(())
    }

    #[test]
    fn test_cardio_steps_have_no_category() -> Result<()> {
        let plan = WorkoutPlan {
            sport: Some(Sport::Running),
            blocks: vec![PlanBlock {
                exercises: vec![PlanExercise {
                    intensity: Some(Intensity::Warmup),
                    ..PlanExercise::new("Warm Up", text("10min"), 1)
                }],
                rest_between_sec: None,
            }],
            ..WorkoutPlan::new("Easy Run")
        };
        let model = rebuild(&build_workout(&plan, FitWorkoutOptions::default())?)?;
        assert_eq!(model.steps[0].step_type(), "warmup");
        assert_eq!(model.steps[0].name(), "Warm Up");
        assert_eq!(model.sub_sport, Some(EnumValue::Known(SubSport::Generic)));

        let steps = lower_plan(&plan, false, true)?;
        assert_eq!(steps[0].category, None);
        Ok(())
    }

    #[test]
    fn test_cardio_names_round_trip() -> Result<()> {
        let plan = WorkoutPlan {
            sport: Some(Sport::Running),
            blocks: vec![
                PlanBlock {
                    exercises: vec![PlanExercise {
                        intensity: Some(Intensity::Warmup),
                        ..PlanExercise::new("Warm Up", text("10min"), 1)
                    }],
                    rest_between_sec: None,
                },
                PlanBlock {
                    exercises: vec![PlanExercise::new("Tempo", text("10min"), 1)],
                    rest_between_sec: None,
                },
                PlanBlock {
                    exercises: vec![PlanExercise {
                        notes: Some("Strides".to_owned()),
                        ..PlanExercise::new("Fast Finish", text("400m"), 1)
                    }],
                    rest_between_sec: None,
                },
            ],
            ..WorkoutPlan::new("Tempo Run")
        };

        let steps = lower_plan(&plan, false, true)?;
        assert_eq!(steps[0].notes, None);
        assert_eq!(steps[1].notes.as_deref(), Some("Tempo"));

        let model = rebuild(&build_workout(&plan, FitWorkoutOptions::default())?)?;
        let names: Vec<_> = model.steps.iter().map(DisplayStep::name).collect();
        assert_eq!(names, vec!["Warm Up", "Tempo", "Strides"]);
        Ok(())
    }

    #[test]
    fn test_long_names_are_kept() -> Result<()> {
        let long = "Single Arm Dumbbell Bench Press Hold";
        let plan = WorkoutPlan {
            blocks: vec![PlanBlock {
                exercises: vec![PlanExercise {
                    category: Some(ExerciseCategory::BenchPress),
                    exercise_id: Some(1),
                    ..PlanExercise::new(long, Some(Reps::Count(6)), 1)
                }],
                rest_between_sec: None,
            }],
            ..WorkoutPlan::new("A Workout Title Longer Than Thirty Two Bytes")
        };

        let bytes = build_workout(&plan, FitWorkoutOptions::default())?;
        let file = decode(&bytes)?;
        assert_eq!(file.header.data_size as usize, bytes.len() - 16);

        let model = rebuild(&bytes)?;
        assert_eq!(model.name, "A Workout Title Longer Than Thirty Two Bytes");
        assert_eq!(model.steps[0].name(), long);

        let decoded = interpret_file(&file);
        let title = decoded
            .titles
            .by_exercise(EnumValue::Known(ExerciseCategory::BenchPress), 1);
        assert_eq!(title, Some(long));
        Ok(())
    }

    #[test]
    fn test_string_field_size() {
        assert_eq!(string_field_size(["Squat"], STEP_NAME_SIZE), STEP_NAME_SIZE);
        assert_eq!(string_field_size(Vec::<&str>::new(), NOTES_SIZE), NOTES_SIZE);
        let long = "a".repeat(40);
        assert_eq!(string_field_size([long.as_str(), "b"], STEP_NAME_SIZE), 41);
        let huge = "a".repeat(400);
        assert_eq!(string_field_size([huge.as_str()], STEP_NAME_SIZE), MAX_STRING_SIZE);
    }

    #[test]
    fn test_truncate_to_char_boundary() {
        assert_eq!(truncate_to_char_boundary("squat", 10), "squat");
        assert_eq!(truncate_to_char_boundary("squat", 3), "squ");
        // "é" is two bytes.
        assert_eq!(truncate_to_char_boundary("café", 4), "caf");
    }
}
