//! Slice-based FIT decoder.
//!
//! Turns the bytes of a FIT file into a flat sequence of [`FitMessage`]s with
//! no knowledge of what the messages mean. Naming and typing fields is the
//! job of [`crate::interpret`].

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;
use tracing::{debug, warn};

use crate::crc::checksum;
use crate::profile::{BaseType, GlobalMessage, common_field};
use crate::types::FitDateTime;

/// Errors that make a byte sequence unreadable as FIT.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormatError {
    #[error("missing .FIT signature or header too short")]
    BadSignature,
    #[error("record at offset {0} runs past the end of the file")]
    Truncated(usize),
    #[error("data record at offset {offset} uses undefined local message type {local}")]
    UndefinedLocalMessage { local: u8, offset: usize },
}

type Result<T> = std::result::Result<T, FormatError>;

const SIGNATURE: &[u8; 4] = b".FIT";
const MIN_HEADER_SIZE: usize = 12;
const CRC_SIZE: usize = 2;

/// The file header, as read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FitHeader {
    pub header_size: u8,
    pub protocol_version: u8,
    pub profile_version: u16,
    pub data_size: u32,
    /// Present for 14-byte headers. Zero means the encoder skipped it.
    pub header_crc: Option<u16>,
}

/// Outcome of checking the trailing file CRC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CrcStatus {
    /// Matches the CRC of header and records.
    Valid,
    /// Matches the CRC of the records alone, as some encoders write it.
    DataOnly,
    Mismatch { stored: u16, computed: u16 },
    Missing,
}

/// A single decoded element.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    UInt8(u8),
    SInt8(i8),
    UInt16(u16),
    SInt16(i16),
    UInt32(u32),
    SInt32(i32),
    UInt64(u64),
    SInt64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// A multi-element field. Invalid elements keep their position as `None`.
    Array(Vec<Option<Value>>),
}

impl Value {
    /// The value as an unsigned integer, if it is a non-negative integer or
    /// an array whose first element is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt8(v) => Some(u64::from(*v)),
            Self::UInt16(v) => Some(u64::from(*v)),
            Self::UInt32(v) => Some(u64::from(*v)),
            Self::UInt64(v) => Some(*v),
            Self::SInt8(v) => u64::try_from(*v).ok(),
            Self::SInt16(v) => u64::try_from(*v).ok(),
            Self::SInt32(v) => u64::try_from(*v).ok(),
            Self::SInt64(v) => u64::try_from(*v).ok(),
            Self::Array(vs) => vs.first().and_then(|v| v.as_ref()).and_then(Value::as_u64),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float32(v) => Some(f64::from(*v)),
            Self::Float64(v) => Some(*v),
            Self::SInt8(v) => Some(f64::from(*v)),
            Self::SInt16(v) => Some(f64::from(*v)),
            Self::SInt32(v) => Some(f64::from(*v)),
            _ => self.as_u64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// One field of a data message, in definition order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldValue {
    pub number: u8,
    pub base_type: BaseType,
    /// `None` when the file held the base type's invalid sentinel.
    pub value: Option<Value>,
}

/// A developer data field, kept as the raw bytes from the file.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeveloperFieldValue {
    pub developer_data_index: u8,
    pub number: u8,
    pub bytes: Vec<u8>,
}

/// A decoded data message.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FitMessage {
    pub global_message_number: u16,
    pub local_message_type: u8,
    pub fields: Vec<FieldValue>,
    pub developer_fields: Vec<DeveloperFieldValue>,
    /// Seconds since the Garmin epoch, from the `timestamp` field or a
    /// compressed timestamp header.
    pub timestamp: Option<u32>,
}

impl FitMessage {
    pub fn kind(&self) -> Option<GlobalMessage> {
        GlobalMessage::try_from(self.global_message_number).ok()
    }

    /// The value of a field, flattening "not defined" and "invalid" into
    /// `None`.
    pub fn field(&self, number: u8) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.number == number)
            .and_then(|f| f.value.as_ref())
    }

    pub fn timestamp(&self) -> Option<FitDateTime> {
        self.timestamp.map(FitDateTime::from_raw)
    }
}

/// A decoded file.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FitFile {
    pub header: FitHeader,
    pub messages: Vec<FitMessage>,
    pub crc: CrcStatus,
}

#[derive(Clone, Copy, Debug)]
struct FieldLayout {
    number: u8,
    size: usize,
    base_type: BaseType,
}

#[derive(Clone, Copy, Debug)]
struct DeveloperFieldLayout {
    number: u8,
    size: usize,
    developer_data_index: u8,
}

#[derive(Clone, Debug)]
struct Definition {
    big_endian: bool,
    global: u16,
    fields: Vec<FieldLayout>,
    developer_fields: Vec<DeveloperFieldLayout>,
}

/// Takes `n` bytes from the tip of `r`, advancing `i`.
fn take<'a>(r: &'a [u8], i: &mut usize, n: usize) -> Result<&'a [u8]> {
    let start = *i;
    let bytes = r
        .get(start..start + n)
        .ok_or(FormatError::Truncated(start))?;
    *i += n;
    Ok(bytes)
}

fn take_u8(r: &[u8], i: &mut usize) -> Result<u8> {
    Ok(take(r, i, 1)?[0])
}

/// Reads and checks the file header.
pub fn read_header(bytes: &[u8]) -> Result<FitHeader> {
    if bytes.len() < MIN_HEADER_SIZE {
        return Err(FormatError::BadSignature);
    }
    let header_size = bytes[0];
    if (header_size as usize) < MIN_HEADER_SIZE || bytes.len() < header_size as usize {
        return Err(FormatError::BadSignature);
    }
    if &bytes[8..12] != SIGNATURE {
        return Err(FormatError::BadSignature);
    }

    let header_crc = if header_size >= 14 {
        Some(LittleEndian::read_u16(&bytes[12..14]))
    } else {
        None
    };
    if let Some(stored) = header_crc {
        let computed = checksum(&bytes[..12]);
        if stored != 0 && stored != computed {
            warn!("Header CRC mismatch: stored {stored:#06x}, computed {computed:#06x}");
        }
    }

    Ok(FitHeader {
        header_size,
        protocol_version: bytes[1],
        profile_version: LittleEndian::read_u16(&bytes[2..4]),
        data_size: LittleEndian::read_u32(&bytes[4..8]),
        header_crc,
    })
}

/// Expands a compressed timestamp's five-bit offset against the last full
/// timestamp seen.
pub fn expand_compressed_timestamp(last: u32, offset: u8) -> u32 {
    let offset = u32::from(offset & 0x1F);
    let mut ts = (last & !0x1F).wrapping_add(offset);
    if offset < (last & 0x1F) {
        ts = ts.wrapping_add(0x20);
    }
    ts
}

/// Decodes a complete FIT file.
#[tracing::instrument(name = "decode_fit", level = "debug", skip_all)]
pub fn decode(bytes: &[u8]) -> Result<FitFile> {
    let header = read_header(bytes)?;
    let start = header.header_size as usize;

    let end = if header.data_size == 0 {
        debug!("Header declares no data size; reading records up to the trailing CRC");
        bytes.len().saturating_sub(CRC_SIZE).max(start)
    } else {
        let end = start + header.data_size as usize;
        if end > bytes.len() {
            return Err(FormatError::Truncated(bytes.len()));
        }
        end
    };

    let crc = check_file_crc(bytes, &header, end);

    let mut definitions: [Option<Definition>; 16] = Default::default();
    let mut messages = Vec::new();
    let mut last_timestamp = 0u32;
    let records = &bytes[..end];
    let i = &mut { start };

    while *i < end {
        let offset = *i;
        let record_header = take_u8(records, i)?;

        if record_header & 0x80 != 0 {
            let local = (record_header >> 5) & 0x03;
            let time_offset = record_header & 0x1F;
            let def = definitions[local as usize]
                .as_ref()
                .ok_or(FormatError::UndefinedLocalMessage { local, offset })?;
            let mut message = decode_data(def, local, records, i)?;
            let ts = match message.field(common_field::TIMESTAMP).and_then(Value::as_u32) {
                Some(ts) => ts,
                None => expand_compressed_timestamp(last_timestamp, time_offset),
            };
            last_timestamp = ts;
            message.timestamp = Some(ts);
            messages.push(message);
        } else if record_header & 0x40 != 0 {
            let local = record_header & 0x0F;
            let has_developer_data = record_header & 0x20 != 0;
            let def = decode_definition(records, i, has_developer_data)?;
            debug!(
                "Read definition for global message {} with local type {}",
                def.global, local
            );
            definitions[local as usize] = Some(def);
        } else {
            let local = record_header & 0x0F;
            let def = definitions[local as usize]
                .as_ref()
                .ok_or(FormatError::UndefinedLocalMessage { local, offset })?;
            let mut message = decode_data(def, local, records, i)?;
            if let Some(ts) = message.field(common_field::TIMESTAMP).and_then(Value::as_u32) {
                last_timestamp = ts;
                message.timestamp = Some(ts);
            }
            messages.push(message);
        }
    }

    debug!("Decoded {} data messages", messages.len());
    Ok(FitFile {
        header,
        messages,
        crc,
    })
}

fn check_file_crc(bytes: &[u8], header: &FitHeader, end: usize) -> CrcStatus {
    let Some(stored) = bytes.get(end..end + CRC_SIZE).map(LittleEndian::read_u16) else {
        debug!("File has no trailing CRC");
        return CrcStatus::Missing;
    };

    let computed = checksum(&bytes[..end]);
    if stored == computed {
        return CrcStatus::Valid;
    }
    // A header ending in its own CRC leaves the running CRC at zero, so the
    // records-only sum can only differ when the header is unchecked.
    let header_unchecked = header.header_crc.is_none_or(|c| c == 0);
    let start = header.header_size as usize;
    if header_unchecked && stored == checksum(&bytes[start..end]) {
        debug!("File CRC covers the records only");
        return CrcStatus::DataOnly;
    }

    warn!("File CRC mismatch: stored {stored:#06x}, computed {computed:#06x}");
    CrcStatus::Mismatch { stored, computed }
}

fn decode_definition(r: &[u8], i: &mut usize, has_developer_data: bool) -> Result<Definition> {
    let fixed = take(r, i, 5)?;
    let big_endian = fixed[1] == 1;
    let global = if big_endian {
        BigEndian::read_u16(&fixed[2..4])
    } else {
        LittleEndian::read_u16(&fixed[2..4])
    };
    let num_fields = fixed[4] as usize;

    let mut fields = Vec::with_capacity(num_fields);
    for _ in 0..num_fields {
        let triple = take(r, i, 3)?;
        let base_type = BaseType::from_wire(triple[2]).unwrap_or_else(|| {
            warn!(
                "Unknown base type {:#04x} for field {} of global message {global}; reading as bytes",
                triple[2], triple[0]
            );
            BaseType::Byte
        });
        fields.push(FieldLayout {
            number: triple[0],
            size: triple[1] as usize,
            base_type,
        });
    }

    let mut developer_fields = Vec::new();
    if has_developer_data {
        let num_developer_fields = take_u8(r, i)? as usize;
        for _ in 0..num_developer_fields {
            let triple = take(r, i, 3)?;
            developer_fields.push(DeveloperFieldLayout {
                number: triple[0],
                size: triple[1] as usize,
                developer_data_index: triple[2],
            });
        }
    }

    Ok(Definition {
        big_endian,
        global,
        fields,
        developer_fields,
    })
}

fn decode_data(def: &Definition, local: u8, r: &[u8], i: &mut usize) -> Result<FitMessage> {
    let mut fields = Vec::with_capacity(def.fields.len());
    for layout in &def.fields {
        let raw = take(r, i, layout.size)?;
        let value = if def.big_endian {
            decode_value::<BigEndian>(layout.base_type, raw)
        } else {
            decode_value::<LittleEndian>(layout.base_type, raw)
        };
        fields.push(FieldValue {
            number: layout.number,
            base_type: layout.base_type,
            value,
        });
    }

    let mut developer_fields = Vec::with_capacity(def.developer_fields.len());
    for layout in &def.developer_fields {
        developer_fields.push(DeveloperFieldValue {
            developer_data_index: layout.developer_data_index,
            number: layout.number,
            bytes: take(r, i, layout.size)?.to_vec(),
        });
    }

    Ok(FitMessage {
        global_message_number: def.global,
        local_message_type: local,
        fields,
        developer_fields,
        timestamp: None,
    })
}

fn decode_value<B: ByteOrder>(base_type: BaseType, raw: &[u8]) -> Option<Value> {
    match base_type {
        BaseType::String => {
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            if end == 0 {
                return None;
            }
            Some(Value::String(String::from_utf8_lossy(&raw[..end]).into_owned()))
        }
        BaseType::Byte => {
            if raw.iter().all(|&b| b == 0xFF) {
                None
            } else {
                Some(Value::Bytes(raw.to_vec()))
            }
        }
        _ => {
            let size = base_type.size();
            if raw.is_empty() || raw.len() % size != 0 {
                return Some(Value::Bytes(raw.to_vec()));
            }
            if raw.len() == size {
                return decode_scalar::<B>(base_type, raw);
            }
            let elements: Vec<Option<Value>> = raw
                .chunks_exact(size)
                .map(|c| decode_scalar::<B>(base_type, c))
                .collect();
            if elements.iter().all(Option::is_none) {
                None
            } else {
                Some(Value::Array(elements))
            }
        }
    }
}

fn decode_scalar<B: ByteOrder>(base_type: BaseType, c: &[u8]) -> Option<Value> {
    let bits: u64 = match c.len() {
        1 => u64::from(c[0]),
        2 => u64::from(B::read_u16(c)),
        4 => u64::from(B::read_u32(c)),
        8 => B::read_u64(c),
        _ => return Some(Value::Bytes(c.to_vec())),
    };
    if bits == base_type.invalid_bits() {
        return None;
    }

    Some(match base_type {
        BaseType::Enum | BaseType::Uint8 | BaseType::Uint8z => Value::UInt8(bits as u8),
        BaseType::Sint8 => Value::SInt8(bits as u8 as i8),
        BaseType::Uint16 | BaseType::Uint16z => Value::UInt16(bits as u16),
        BaseType::Sint16 => Value::SInt16(bits as u16 as i16),
        BaseType::Uint32 | BaseType::Uint32z => Value::UInt32(bits as u32),
        BaseType::Sint32 => Value::SInt32(bits as u32 as i32),
        BaseType::Uint64 | BaseType::Uint64z => Value::UInt64(bits),
        BaseType::Sint64 => Value::SInt64(bits as i64),
        BaseType::Float32 => Value::Float32(f32::from_bits(bits as u32)),
        BaseType::Float64 => Value::Float64(f64::from_bits(bits)),
        BaseType::String | BaseType::Byte => Value::Bytes(c.to_vec()),
    })
}
