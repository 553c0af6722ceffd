//! Turns file bytes into a [`WorkoutModel`], degrading when it has to.
//!
//! Parsers are tried in order and the first one to succeed wins. The full
//! parser decodes every record; the basic parser only recovers printable
//! strings, so a damaged file still previews as a placeholder instead of
//! failing outright.

use thiserror::Error;
use tracing::{debug, warn};

use crate::decode::{FormatError, decode};
use crate::interpret::interpret_file;
use crate::profile::{EnumValue, Sport};
use crate::workout::{Fidelity, WorkoutModel};

#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("FIT decoding failed")]
    Format(#[from] FormatError),
    #[error("file is empty")]
    Empty,
}

type Result<T> = std::result::Result<T, ParseError>;

/// One way of getting a workout out of some bytes.
pub trait ParseStrategy {
    fn name(&self) -> &'static str;

    fn parse(&self, bytes: &[u8]) -> Result<WorkoutModel>;
}

/// Decodes the whole file and rebuilds its step structure.
pub struct FullParser;

impl ParseStrategy for FullParser {
    fn name(&self) -> &'static str {
        "full"
    }

    fn parse(&self, bytes: &[u8]) -> Result<WorkoutModel> {
        let file = decode(bytes)?;
        Ok(WorkoutModel::from_decoded(&interpret_file(&file)))
    }
}

/// Shortest run of printable bytes kept by [`BasicParser`].
const MIN_STRING_LEN: usize = 4;

/// Produces a placeholder model from whatever readable text the file holds.
///
/// Succeeds on anything that is not empty.
pub struct BasicParser;

impl BasicParser {
    /// NUL-terminated runs of at least four printable ASCII bytes, in order and
    /// without repeats.
    pub fn printable_strings(bytes: &[u8]) -> Vec<String> {
        let mut strings: Vec<String> = Vec::new();
        let mut start = None;
        for (i, &b) in bytes.iter().enumerate() {
            match (b, start) {
                (0x20..=0x7E, None) => start = Some(i),
                (0x20..=0x7E, Some(_)) => {}
                (0, Some(s)) if i - s >= MIN_STRING_LEN => {
                    let run = String::from_utf8_lossy(&bytes[s..i]).trim().to_owned();
                    if run.len() >= MIN_STRING_LEN && !strings.contains(&run) {
                        strings.push(run);
                    }
                    start = None;
                }
                _ => start = None,
            }
        }
        strings
    }
}

impl ParseStrategy for BasicParser {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn parse(&self, bytes: &[u8]) -> Result<WorkoutModel> {
        if bytes.is_empty() {
            return Err(ParseError::Empty);
        }
        let strings = Self::printable_strings(bytes);
        debug!("Recovered {} printable strings", strings.len());
        Ok(WorkoutModel {
            sport: Some(EnumValue::Known(Sport::Training)),
            source: Some("FIT File".to_owned()),
            fidelity: Fidelity::Basic {
                size: bytes.len(),
                strings,
            },
            ..WorkoutModel::default()
        })
    }
}

/// The default chain: full decode, then the basic fallback.
pub fn default_strategies() -> [&'static dyn ParseStrategy; 2] {
    [&FullParser, &BasicParser]
}

/// Runs each strategy in turn and returns the first model produced.
pub fn first_success(strategies: &[&dyn ParseStrategy], bytes: &[u8]) -> Option<WorkoutModel> {
    for strategy in strategies {
        match strategy.parse(bytes) {
            Ok(model) => {
                debug!("Parsed workout with the {} parser", strategy.name());
                return Some(model);
            }
            Err(e) => warn!("The {} parser failed: {}", strategy.name(), e),
        }
    }
    None
}
