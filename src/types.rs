use std::ops::Add;
use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TypeError {
    #[error("date_time out of range for FIT encoding: {0}")]
    DateTimeOutOfRange(DateTime<Utc>),
    #[error("relative FIT date_time {0:#x} has no absolute value")]
    RelativeDateTime(u32),
}

type Result<T> = std::result::Result<T, TypeError>;

static GARMIN_EPOCH: LazyLock<DateTime<Utc>> = LazyLock::new(|| {
    Utc.with_ymd_and_hms(1989, 12, 31, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
});

// The minimum value of a date_time as per the FIT global profile.  Values lower
// than this are relative offsets rather than absolute times since the Garmin
// epoch.
pub const GARMIN_DATE_TIME_MIN: u32 = 0x10000000;

/// A date_time value as represented in a FIT file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FitDateTime(u32);

impl FitDateTime {
    /// Wraps a raw seconds count, absolute or relative.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_absolute(&self) -> bool {
        self.0 >= GARMIN_DATE_TIME_MIN
    }

    /// The absolute time, or `None` for a relative value.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::try_from(*self).ok()
    }
}

impl TryFrom<DateTime<Utc>> for FitDateTime {
    type Error = TypeError;

    fn try_from(value: DateTime<Utc>) -> Result<Self> {
        let ts = value.signed_duration_since(*GARMIN_EPOCH).num_seconds();
        if ts < i64::from(GARMIN_DATE_TIME_MIN) {
            return Err(TypeError::DateTimeOutOfRange(value));
        }
        u32::try_from(ts)
            .map(Self)
            .map_err(|_| TypeError::DateTimeOutOfRange(value))
    }
}

impl TryFrom<FitDateTime> for DateTime<Utc> {
    type Error = TypeError;

    fn try_from(value: FitDateTime) -> Result<Self> {
        if !value.is_absolute() {
            return Err(TypeError::RelativeDateTime(value.0));
        }
        Ok(GARMIN_EPOCH.add(TimeDelta::seconds(i64::from(value.0))))
    }
}
