//! Pop-frame case numbering.
//!
//! The boundary takes a small integer selecting one of six cases: three
//! invalid-invocation categories, each with two argument encodings. Even
//! numbers use the primary encoding, odd numbers the alternate one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::RuntimeError;

/// Category of invalid invocation under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    /// Null thread reference
    NullThread,
    /// Handle that is not a live thread
    InvalidThread,
    /// Live thread that has not been suspended
    NotSuspended,
}

impl CheckCategory {
    /// All categories in the order the driver issues them
    pub const ALL: [CheckCategory; 3] = [
        CheckCategory::NullThread,
        CheckCategory::InvalidThread,
        CheckCategory::NotSuspended,
    ];

    /// Rejection a conforming runtime returns for this category
    pub fn expected_rejection(&self) -> RuntimeError {
        match self {
            CheckCategory::NullThread => RuntimeError::NullPointer,
            CheckCategory::InvalidThread => RuntimeError::InvalidThread,
            CheckCategory::NotSuspended => RuntimeError::ThreadNotSuspended,
        }
    }

    /// Human description of the invalid argument
    pub fn describe(&self) -> &'static str {
        match self {
            CheckCategory::NullThread => "NULL pointer to the thread",
            CheckCategory::InvalidThread => "the invalid thread",
            CheckCategory::NotSuspended => "the non suspended thread",
        }
    }

    /// Check number as reported in diagnostics (the primary case number + 1)
    pub fn check_number(&self) -> u8 {
        match self {
            CheckCategory::NullThread => 1,
            CheckCategory::InvalidThread => 3,
            CheckCategory::NotSuspended => 5,
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckCategory::NullThread => write!(f, "null_thread"),
            CheckCategory::InvalidThread => write!(f, "invalid_thread"),
            CheckCategory::NotSuspended => write!(f, "not_suspended"),
        }
    }
}

/// Argument encoding variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Primary,
    Alternate,
}

/// One of the six boundary cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PopCase {
    NullPrimary = 0,
    NullAlternate = 1,
    InvalidPrimary = 2,
    InvalidAlternate = 3,
    NotSuspendedPrimary = 4,
    NotSuspendedAlternate = 5,
}

impl PopCase {
    /// All six cases in numeric order
    pub const ALL: [PopCase; 6] = [
        PopCase::NullPrimary,
        PopCase::NullAlternate,
        PopCase::InvalidPrimary,
        PopCase::InvalidAlternate,
        PopCase::NotSuspendedPrimary,
        PopCase::NotSuspendedAlternate,
    ];

    /// Build the case for a category/encoding pair
    pub fn new(category: CheckCategory, encoding: Encoding) -> Self {
        match (category, encoding) {
            (CheckCategory::NullThread, Encoding::Primary) => PopCase::NullPrimary,
            (CheckCategory::NullThread, Encoding::Alternate) => PopCase::NullAlternate,
            (CheckCategory::InvalidThread, Encoding::Primary) => PopCase::InvalidPrimary,
            (CheckCategory::InvalidThread, Encoding::Alternate) => PopCase::InvalidAlternate,
            (CheckCategory::NotSuspended, Encoding::Primary) => PopCase::NotSuspendedPrimary,
            (CheckCategory::NotSuspended, Encoding::Alternate) => PopCase::NotSuspendedAlternate,
        }
    }

    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn category(&self) -> CheckCategory {
        match self {
            PopCase::NullPrimary | PopCase::NullAlternate => CheckCategory::NullThread,
            PopCase::InvalidPrimary | PopCase::InvalidAlternate => CheckCategory::InvalidThread,
            PopCase::NotSuspendedPrimary | PopCase::NotSuspendedAlternate => {
                CheckCategory::NotSuspended
            }
        }
    }

    pub fn encoding(&self) -> Encoding {
        if self.code() % 2 == 0 {
            Encoding::Primary
        } else {
            Encoding::Alternate
        }
    }

    pub fn expected_rejection(&self) -> RuntimeError {
        self.category().expected_rejection()
    }
}

impl fmt::Display for PopCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error parsing a case number
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaseParseError {
    #[error("pop-frame case must be in 0..=5, got {0}")]
    OutOfRange(i64),

    #[error("invalid pop-frame case '{0}'")]
    NotANumber(String),
}

impl TryFrom<i32> for PopCase {
    type Error = CaseParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| PopCase::ALL.get(i).copied())
            .ok_or(CaseParseError::OutOfRange(i64::from(value)))
    }
}

impl FromStr for PopCase {
    type Err = CaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: i64 = s
            .trim()
            .parse()
            .map_err(|_| CaseParseError::NotANumber(s.to_string()))?;
        let n = i32::try_from(n).map_err(|_| CaseParseError::OutOfRange(n))?;
        PopCase::try_from(n)
    }
}
