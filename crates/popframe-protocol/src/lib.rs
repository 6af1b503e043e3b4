//! Pop-frame protocol types
//!
//! Shared vocabulary between the harness driver and the runtime boundary:
//! harness status codes, the six pop-frame cases, and the rejection codes a
//! conforming runtime returns.

pub mod case;
pub mod error;
pub mod status;

pub use case::{CaseParseError, CheckCategory, Encoding, PopCase};
pub use error::RuntimeError;
pub use status::{Verdict, FAILED, PASSED, STATUS_BASE};
