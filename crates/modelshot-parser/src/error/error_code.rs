//! Error codes for payload diagnostics.
//!
//! Codes are grouped by the stage that produces them:
//! - `E0xx` - JSON syntax errors
//! - `E1xx` - Schema (shape) errors
//! - `E2xx` - Semantic validation errors

use std::fmt;

/// Error codes for categorizing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Syntax Errors (E0xx)
    // =========================================================================
    /// Invalid JSON.
    E001,

    /// The input ended before the JSON document was complete.
    E002,

    /// The input is empty or contains only whitespace.
    E003,

    // =========================================================================
    // Schema Errors (E1xx)
    // =========================================================================
    /// The top-level value is not one of the accepted envelopes.
    E100,

    /// A content type or field does not match the expected shape.
    E101,

    /// A layout entry is not an `{x, y}` pair of numbers.
    E102,

    // =========================================================================
    // Validation Errors (E2xx)
    // =========================================================================
    /// A content type has an empty id.
    E200,

    /// Two content types share an id.
    E201,

    /// A field has an empty id.
    E202,

    /// Two fields of one content type share an id.
    E203,

    /// Unknown visibility name.
    E204,
}

impl ErrorCode {
    /// Returns the code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "invalid JSON",
            ErrorCode::E002 => "unexpected end of input",
            ErrorCode::E003 => "empty payload",
            ErrorCode::E100 => "unrecognized payload shape",
            ErrorCode::E101 => "invalid content type",
            ErrorCode::E102 => "invalid position",
            ErrorCode::E200 => "empty content type id",
            ErrorCode::E201 => "duplicate content type id",
            ErrorCode::E202 => "empty field id",
            ErrorCode::E203 => "duplicate field id",
            ErrorCode::E204 => "unknown visibility",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
