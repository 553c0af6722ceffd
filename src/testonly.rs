//! Exports intended for testing use only.
//!
//! A byte-level FIT builder for producing streams the workout encoder never
//! would: invalid categories, little-endian definitions, compressed
//! timestamps, developer fields. Not intended for use by external code.

use crate::crc::checksum;
use crate::profile::{GlobalMessage, PROFILE_VERSION};

/// Accumulates definition and data records, then wraps them in a header and
/// CRC.
#[derive(Default)]
pub struct RawFitBuilder {
    records: Vec<u8>,
}

impl RawFitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn definition_inner(
        &mut self,
        local: u8,
        global: u16,
        big_endian: bool,
        fields: &[(u8, u8, u8)],
        developer_fields: Option<&[(u8, u8, u8)]>,
    ) -> &mut Self {
        let developer_flag = if developer_fields.is_some() { 0x20 } else { 0 };
        self.records.push(0x40 | developer_flag | (local & 0x0F));
        self.records.push(0);
        if big_endian {
            self.records.push(1);
            self.records.extend_from_slice(&global.to_be_bytes());
        } else {
            self.records.push(0);
            self.records.extend_from_slice(&global.to_le_bytes());
        }
        self.records.push(fields.len() as u8);
        for (number, size, base_type) in fields {
            self.records.extend_from_slice(&[*number, *size, *base_type]);
        }
        if let Some(dev) = developer_fields {
            self.records.push(dev.len() as u8);
            for (number, size, index) in dev {
                self.records.extend_from_slice(&[*number, *size, *index]);
            }
        }
        self
    }

    /// A little-endian definition of `(field number, size, base type)`
    /// triples.
    pub fn definition(&mut self, local: u8, global: u16, fields: &[(u8, u8, u8)]) -> &mut Self {
        self.definition_inner(local, global, false, fields, None)
    }

    pub fn big_endian_definition(
        &mut self,
        local: u8,
        global: u16,
        fields: &[(u8, u8, u8)],
    ) -> &mut Self {
        self.definition_inner(local, global, true, fields, None)
    }

    /// A little-endian definition with developer fields given as
    /// `(field number, size, developer data index)` triples.
    pub fn developer_definition(
        &mut self,
        local: u8,
        global: u16,
        fields: &[(u8, u8, u8)],
        developer_fields: &[(u8, u8, u8)],
    ) -> &mut Self {
        self.definition_inner(local, global, false, fields, Some(developer_fields))
    }

    pub fn data(&mut self, local: u8, payload: &[u8]) -> &mut Self {
        self.records.push(local & 0x0F);
        self.records.extend_from_slice(payload);
        self
    }

    /// A data record with a compressed timestamp header. Only local types 0
    /// to 3 can be addressed this way.
    pub fn compressed(&mut self, local: u8, time_offset: u8, payload: &[u8]) -> &mut Self {
        self.records
            .push(0x80 | ((local & 0x03) << 5) | (time_offset & 0x1F));
        self.records.extend_from_slice(payload);
        self
    }

    fn header(&self, header_size: u8) -> Vec<u8> {
        let mut h = vec![header_size, 0x20];
        h.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
        h.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        h.extend_from_slice(b".FIT");
        if header_size == 14 {
            let crc = checksum(&h);
            h.extend_from_slice(&crc.to_le_bytes());
        }
        h
    }

    fn wrap(&self, header_size: u8) -> Vec<u8> {
        let mut bytes = self.header(header_size);
        bytes.extend_from_slice(&self.records);
        let crc = checksum(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes
    }

    /// The file with a 14-byte header.
    pub fn finish(&self) -> Vec<u8> {
        self.wrap(14)
    }

    /// The file with a legacy 12-byte header.
    pub fn finish_with_short_header(&self) -> Vec<u8> {
        self.wrap(12)
    }
}

/// Little-endian payload bytes for [`RawFitBuilder::data`].
#[derive(Default)]
pub struct FieldBytes {
    bytes: Vec<u8>,
}

impl FieldBytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.bytes.push(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// A NUL-padded string field of exactly `size` bytes.
    pub fn string(mut self, s: &str, size: usize) -> Self {
        let mut field = s.as_bytes().to_vec();
        field.truncate(size.saturating_sub(1));
        field.resize(size, 0);
        self.bytes.extend_from_slice(&field);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

const STRING_SIZE: u8 = 24;

/// One `workout_step` record. `None` fields are written as the invalid
/// sentinel.
#[derive(Clone, Debug, Default)]
pub struct StepFixture {
    pub message_index: Option<u16>,
    pub name: Option<&'static str>,
    pub duration_type: Option<u8>,
    pub duration_value: Option<u32>,
    pub target_type: Option<u8>,
    pub target_value: Option<u32>,
    pub intensity: Option<u8>,
    pub notes: Option<&'static str>,
    pub category: Option<u16>,
    pub exercise_name: Option<u16>,
    pub weight: Option<u16>,
    pub weight_unit: Option<u16>,
}

impl StepFixture {
    pub fn fields() -> Vec<(u8, u8, u8)> {
        vec![
            (254, 2, 0x84),
            (0, STRING_SIZE, 0x07),
            (1, 1, 0x00),
            (2, 4, 0x86),
            (3, 1, 0x00),
            (4, 4, 0x86),
            (7, 1, 0x00),
            (8, STRING_SIZE, 0x07),
            (10, 2, 0x84),
            (11, 2, 0x84),
            (12, 2, 0x84),
            (13, 2, 0x84),
        ]
    }

    pub fn payload(&self) -> Vec<u8> {
        let size = STRING_SIZE as usize;
        FieldBytes::new()
            .u16(self.message_index.unwrap_or(0xFFFF))
            .string(self.name.unwrap_or(""), size)
            .u8(self.duration_type.unwrap_or(0xFF))
            .u32(self.duration_value.unwrap_or(0xFFFF_FFFF))
            .u8(self.target_type.unwrap_or(0xFF))
            .u32(self.target_value.unwrap_or(0xFFFF_FFFF))
            .u8(self.intensity.unwrap_or(0xFF))
            .string(self.notes.unwrap_or(""), size)
            .u16(self.category.unwrap_or(0xFFFF))
            .u16(self.exercise_name.unwrap_or(0xFFFF))
            .u16(self.weight.unwrap_or(0xFFFF))
            .u16(self.weight_unit.unwrap_or(0xFFFF))
            .build()
    }

    /// A strength exercise step.
    pub fn exercise(name: &'static str, category: u16) -> Self {
        Self {
            name: Some(name),
            category: Some(category),
            intensity: Some(0),
            ..Self::default()
        }
    }

    /// A rest step lasting `seconds`, or waiting for the lap button when
    /// `None`.
    pub fn rest(seconds: Option<u32>) -> Self {
        match seconds {
            Some(s) => Self {
                duration_type: Some(0),
                duration_value: Some(s * 1000),
                intensity: Some(1),
                ..Self::default()
            },
            None => Self {
                duration_type: Some(5),
                intensity: Some(1),
                ..Self::default()
            },
        }
    }

    /// A `repeat_until_steps_cmplt` marker.
    pub fn repeat(from_step: u32, repeat_count: u32) -> Self {
        Self {
            duration_type: Some(6),
            duration_value: Some(from_step),
            target_value: Some(repeat_count),
            ..Self::default()
        }
    }

    pub fn with_reps(mut self, reps: u32) -> Self {
        self.duration_type = Some(29);
        self.duration_value = Some(reps);
        self
    }
}

/// A workout file with the given sport codes, steps and
/// `(category, exercise_name, title)` entries.
pub fn workout_fixture(
    name: &str,
    sport: u8,
    sub_sport: u8,
    steps: &[StepFixture],
    titles: &[(u16, u16, &str)],
) -> Vec<u8> {
    let mut b = RawFitBuilder::new();

    b.definition(
        0,
        GlobalMessage::FileId.into(),
        &[(0, 1, 0x00), (1, 2, 0x84), (2, 2, 0x84), (4, 4, 0x86)],
    );
    b.data(
        0,
        &FieldBytes::new()
            .u8(5)
            .u16(1)
            .u16(65534)
            .u32(1_000_000_000)
            .build(),
    );

    b.definition(
        1,
        GlobalMessage::Workout.into(),
        &[(8, STRING_SIZE, 0x07), (4, 1, 0x00), (11, 1, 0x00), (6, 2, 0x84)],
    );
    b.data(
        1,
        &FieldBytes::new()
            .string(name, STRING_SIZE as usize)
            .u8(sport)
            .u8(sub_sport)
            .u16(steps.len() as u16)
            .build(),
    );

    b.definition(2, GlobalMessage::WorkoutStep.into(), &StepFixture::fields());
    for (i, step) in steps.iter().enumerate() {
        let mut step = step.clone();
        step.message_index.get_or_insert(i as u16);
        b.data(2, &step.payload());
    }

    b.definition(
        3,
        GlobalMessage::ExerciseTitle.into(),
        &[(254, 2, 0x84), (0, 2, 0x84), (1, 2, 0x84), (2, STRING_SIZE, 0x07)],
    );
    for (i, (category, exercise_name, title)) in titles.iter().enumerate() {
        b.data(
            3,
            &FieldBytes::new()
                .u16(i as u16)
                .u16(*category)
                .u16(*exercise_name)
                .string(title, STRING_SIZE as usize)
                .build(),
        );
    }

    b.finish()
}
