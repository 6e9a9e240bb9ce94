//! Loading a payload into a JSON document and decoding typed values from it.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde_json::{Value, error::Category};

use crate::{
    Payload,
    error::{Diagnostic, ErrorCode, ParseError},
    span::Span,
};

/// A payload that is known to be well-formed JSON.
pub(crate) struct Document<'a> {
    /// Trimmed source text and its byte offset in the original input.
    text: Option<(&'a str, usize)>,
    value: Cow<'a, Value>,
}

impl<'a> Document<'a> {
    /// Trims and parses text payloads; structured payloads are borrowed as-is.
    pub fn load(payload: Payload<'a>) -> Result<Self, ParseError> {
        match payload {
            Payload::Value(value) => Ok(Self {
                text: None,
                value: Cow::Borrowed(value),
            }),
            Payload::Text(raw) => {
                let text = raw.trim();
                let offset = raw.len() - raw.trim_start().len();
                if text.is_empty() {
                    return Err(Diagnostic::error("payload is empty")
                        .with_code(ErrorCode::E003)
                        .with_help("provide a JSON document")
                        .into());
                }

                let value = serde_json::from_str(text).map_err(|err| {
                    let (code, message, label) = if err.classify() == Category::Eof {
                        (ErrorCode::E002, "unexpected end of input".to_string(), "input ends here")
                    } else {
                        (ErrorCode::E001, format!("invalid JSON: {}", error_message(&err)), "here")
                    };
                    let diag = Diagnostic::error(message).with_code(code);
                    match error_span(text, offset, &err) {
                        Some(span) => diag.with_label(span, label),
                        None => diag,
                    }
                })?;

                Ok(Self {
                    text: Some((text, offset)),
                    value: Cow::Owned(value),
                })
            }
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Spans of every `"id": <id>` member value in the text, in document
    /// order. Structured payloads have no text and yield nothing.
    pub fn id_spans(&self, id: &str) -> Vec<Span> {
        let Some((text, offset)) = self.text else {
            return Vec::new();
        };
        let Ok(literal) = serde_json::to_string(id) else {
            return Vec::new();
        };

        text.match_indices("\"id\"")
            .filter_map(|(key, matched)| {
                let rest = text[key + matched.len()..].trim_start();
                let value = rest.strip_prefix(':')?.trim_start();
                if !value.starts_with(literal.as_str()) {
                    return None;
                }
                let start = text.len() - value.len() + offset;
                Some(Span::new(start..start + literal.len()))
            })
            .collect()
    }

    /// Decodes the whole document as `T`.
    ///
    /// Text payloads are decoded from the text again so the diagnostic can
    /// point at the offending location.
    pub fn decode<T: DeserializeOwned>(&self, code: ErrorCode, what: &str) -> Result<T, Diagnostic> {
        let result = match self.text {
            Some((text, _)) => serde_json::from_str(text),
            None => T::deserialize(self.value()),
        };

        result.map_err(|err| {
            let diag = Diagnostic::error(format!("invalid {what}: {}", error_message(&err)))
                .with_code(code);
            match self.text.and_then(|(text, offset)| error_span(text, offset, &err)) {
                Some(span) => diag.with_label(span, "does not match the expected shape"),
                None => diag,
            }
        })
    }
}

/// The serde_json message without its trailing position.
fn error_message(err: &serde_json::Error) -> String {
    let full = err.to_string();
    match full.rfind(" at line ") {
        Some(idx) if err.line() != 0 => full[..idx].to_string(),
        _ => full,
    }
}

/// Byte span of the character a serde_json error points at.
fn error_span(text: &str, offset: usize, err: &serde_json::Error) -> Option<Span> {
    if err.line() == 0 {
        return None;
    }

    let line_start: usize = text
        .split_inclusive('\n')
        .take(err.line() - 1)
        .map(str::len)
        .sum();
    let mut start = (line_start + err.column().saturating_sub(1)).min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let end = text[start..]
        .chars()
        .next()
        .map_or(start, |c| start + c.len_utf8());

    Some(Span::new(start + offset..end + offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_rejected() {
        let err = Document::load(Payload::Text("   \n")).err().unwrap();
        assert_eq!(err.codes().collect::<Vec<_>>(), vec![ErrorCode::E003]);
    }

    #[test]
    fn test_syntax_error_span_accounts_for_leading_whitespace() {
        let source = "\n\n  [1, 2,, 3]";
        let err = Document::load(Payload::Text(source)).err().unwrap();
        let diag = &err.diagnostics()[0];

        assert_eq!(diag.code(), Some(ErrorCode::E001));
        let span = diag.labels()[0].span();
        assert_eq!(&source[span.start()..span.end()], ",");
    }

    #[test]
    fn test_truncated_input_is_eof() {
        let err = Document::load(Payload::Text(r#"{"a": [1, 2"#)).err().unwrap();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E002));
    }

    #[test]
    fn test_error_span_handles_multibyte_text() {
        let source = "[\"é\", ü]";
        let err = Document::load(Payload::Text(source)).err().unwrap();
        for label in err.diagnostics()[0].labels() {
            let span = label.span();
            assert!(source.is_char_boundary(span.start()));
            assert!(source.is_char_boundary(span.end()));
        }
    }
}
