use std::fmt;

use super::CycleType;

#[derive(Debug, Clone, PartialEq)]
pub enum CycleError {
    /// Bound does not match the declared cycle type
    TypeMismatch {
        expected: CycleType,
        found: CycleType,
    },
    /// Time bound is not formatted as `HH:MM:SS`
    InvalidTimeFormat(String),
    /// Humidity bound outside 0-100
    HumidityOutOfRange(i64),
    /// Numeric bound could not be parsed
    InvalidThreshold(String),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => write!(
                f,
                "Invalid cycle type: expected {} but found {}",
                expected, found
            ),
            Self::InvalidTimeFormat(value) => write!(f, "Invalid time format: {}", value),
            Self::HumidityOutOfRange(value) => {
                write!(f, "Humidity must range between 0-100, got {}", value)
            }
            Self::InvalidThreshold(value) => write!(f, "Invalid threshold: {}", value),
        }
    }
}

impl std::error::Error for CycleError {}
