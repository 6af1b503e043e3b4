//! Harness status codes and the aggregate verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status returned by a passing check.
pub const PASSED: i32 = 0;

/// Status returned when the harness detected a failure.
///
/// This is the sentinel the boundary uses to say "the runtime did not reject
/// the call the way it should have".
pub const FAILED: i32 = 2;

/// Offset added to the verdict to form the process exit code.
pub const STATUS_BASE: i32 = 95;

/// Aggregate outcome of a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    /// Classify a raw status. Only the `FAILED` sentinel fails; any other
    /// value is an informational pass.
    pub fn from_status(status: i32) -> Self {
        if status == FAILED {
            Verdict::Failed
        } else {
            Verdict::Passed
        }
    }

    /// Raw status code for this verdict
    pub fn status(&self) -> i32 {
        match self {
            Verdict::Passed => PASSED,
            Verdict::Failed => FAILED,
        }
    }

    /// Process exit code (`status + STATUS_BASE`)
    pub fn exit_code(&self) -> i32 {
        self.status() + STATUS_BASE
    }

}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASSED"),
            Verdict::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_offset_by_base() {
        assert_eq!(Verdict::Passed.exit_code(), 95);
        assert_eq!(Verdict::Failed.exit_code(), 97);
    }

    #[test]
    fn test_only_sentinel_fails() {
        assert_eq!(Verdict::from_status(FAILED), Verdict::Failed);
        assert_eq!(Verdict::from_status(PASSED), Verdict::Passed);
        assert_eq!(Verdict::from_status(1), Verdict::Passed);
        assert_eq!(Verdict::from_status(-7), Verdict::Passed);
    }

    #[test]
    fn test_serialization() {
        assert_eq!(serde_json::to_string(&Verdict::Failed).unwrap(), "\"FAILED\"");
        assert_eq!(Verdict::Passed.to_string(), "PASSED");
    }
}
