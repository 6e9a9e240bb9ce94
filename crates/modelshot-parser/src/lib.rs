//! # Modelshot Parser
//!
//! Validating parsers for the untrusted JSON payloads a content model is
//! created and updated from. Each parser accepts either raw text (trimmed,
//! then parsed as JSON) or an already-structured [`serde_json::Value`], and
//! returns the typed data or a [`ParseError`] holding every problem found.
//! Parsing never panics on malformed input.
//!
//! ## Usage
//!
//! ```
//! # use modelshot_parser::{parse_content_model, parse_layout, ParseError};
//!
//! fn main() -> Result<(), ParseError> {
//!     let model = r#"[{"sys": {"id": "post"}, "name": "Post", "fields": []}]"#;
//!     let layout = r#"{"contentTypes": {"post": {"x": 120, "y": 40}}}"#;
//!
//!     let graph = parse_content_model(model)?;
//!     let positions = parse_layout(layout)?;
//!     assert_eq!(graph.len(), positions.len());
//!     Ok(())
//! }
//! ```

mod document;
pub mod error;
mod layout;
mod model;
mod span;

pub use error::ParseError;
pub use span::Span;

use serde_json::Value;

use modelshot_core::{graph::ContentGraph, layout::Layout, visibility::Visibility};

use error::{Diagnostic, ErrorCode};

/// Input to a parser: raw text or an already-decoded JSON value.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Text(&'a str),
    Value(&'a Value),
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Payload::Text(text)
    }
}

impl<'a> From<&'a String> for Payload<'a> {
    fn from(text: &'a String) -> Self {
        Payload::Text(text)
    }
}

impl<'a> From<&'a Value> for Payload<'a> {
    fn from(value: &'a Value) -> Self {
        Payload::Value(value)
    }
}

/// Parse a content model payload into a [`ContentGraph`].
///
/// Accepted shapes are a bare array of content types, `{"items": [...]}` and
/// `{"contentTypes": [...]}`. Besides the schema, content type ids must be
/// non-empty and unique, and field ids must be non-empty and unique within
/// their content type.
pub fn parse_content_model<'a>(payload: impl Into<Payload<'a>>) -> Result<ContentGraph, ParseError> {
    model::parse(payload.into())
}

/// Parse a layout payload into a [`Layout`].
///
/// Accepted shapes are `{"contentTypes": {"<id>": {"x": .., "y": ..}}}` and
/// the bare `{"<id>": {"x": .., "y": ..}}` map. The result is not
/// normalized, and its ids are not checked against any content model.
pub fn parse_layout<'a>(payload: impl Into<Payload<'a>>) -> Result<Layout, ParseError> {
    layout::parse(payload.into())
}

/// Parse a visibility name. Only `PUBLIC`, `UNLISTED` and `PRIVATE` are
/// accepted, in upper case.
pub fn parse_visibility(input: &str) -> Result<Visibility, ParseError> {
    input.parse().map_err(|err: modelshot_core::visibility::UnknownVisibility| {
        Diagnostic::error(err.to_string())
            .with_code(ErrorCode::E204)
            .into()
    })
}
