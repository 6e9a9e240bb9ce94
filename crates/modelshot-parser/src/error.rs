//! Diagnostics reported by the payload parsers.
//!
//! Every problem found in a payload becomes a [`Diagnostic`] carrying a
//! severity, an [`ErrorCode`], a message and, when the payload was given as
//! text, labelled [`Span`](crate::Span)s pointing into that text. A failed
//! parse returns all of them wrapped in a [`ParseError`].
//!
//! # Example
//!
//! ```
//! # use modelshot_parser::error::{Diagnostic, ErrorCode};
//! # use modelshot_parser::Span;
//!
//! let diag = Diagnostic::error("duplicate content type id `post`")
//!     .with_code(ErrorCode::E201)
//!     .with_label(Span::new(120..126), "defined again here")
//!     .with_help("content type ids must be unique within a model");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
