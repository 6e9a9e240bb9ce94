//! Content model payload parsing and validation.

use std::collections::HashMap;

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use modelshot_core::graph::{ContentGraph, ContentType};

use crate::{
    Payload,
    document::Document,
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    span::Span,
};

/// Content Delivery API response shape.
#[derive(Deserialize)]
struct ItemsEnvelope {
    items: Vec<ContentType>,
}

/// CLI export file shape.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportEnvelope {
    content_types: Vec<ContentType>,
}

enum Envelope {
    Bare,
    Items,
    Export,
}

impl Envelope {
    fn detect(value: &Value) -> Option<Self> {
        match value {
            Value::Array(_) => Some(Self::Bare),
            Value::Object(map) if map.contains_key("items") => Some(Self::Items),
            Value::Object(map) if map.contains_key("contentTypes") => Some(Self::Export),
            _ => None,
        }
    }
}

pub(crate) fn parse(payload: Payload<'_>) -> Result<ContentGraph, ParseError> {
    let document = Document::load(payload)?;

    let Some(envelope) = Envelope::detect(document.value()) else {
        return Err(Diagnostic::error("unrecognized content model payload")
            .with_code(ErrorCode::E100)
            .with_help(
                "expected an array of content types, or an object with an `items` \
                 or `contentTypes` array",
            )
            .into());
    };

    let what = "content model";
    let content_types = match envelope {
        Envelope::Bare => document.decode::<Vec<ContentType>>(ErrorCode::E101, what)?,
        Envelope::Items => document.decode::<ItemsEnvelope>(ErrorCode::E101, what)?.items,
        Envelope::Export => {
            document
                .decode::<ExportEnvelope>(ErrorCode::E101, what)?
                .content_types
        }
    };

    validate(&content_types, &document)?;

    let graph = ContentGraph::new(content_types);
    debug!(
        content_types = graph.len(),
        relations = graph.relations().count();
        "Parsed content model"
    );
    Ok(graph)
}

/// Checks the id rules the schema cannot express.
fn validate(content_types: &[ContentType], document: &Document<'_>) -> Result<(), ParseError> {
    let mut collector = DiagnosticCollector::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    if content_types.is_empty() {
        collector.emit(Diagnostic::warning("content model has no content types"));
    }

    for (index, content_type) in content_types.iter().enumerate() {
        let id = content_type.id();
        if id.trim().is_empty() {
            collector.emit(
                Diagnostic::error(format!(
                    "content type `{}` has an empty id",
                    content_type.name
                ))
                .with_code(ErrorCode::E200)
                .with_help(format!("set `sys.id` of content type #{}", index + 1)),
            );
        } else if let Some(previous) = seen.insert(id, index) {
            let diag = Diagnostic::error(format!("duplicate content type id `{id}`"))
                .with_code(ErrorCode::E201)
                .with_help(format!(
                    "content types #{} and #{} share an id; layouts are keyed by it",
                    previous + 1,
                    index + 1
                ));
            let type_ids: Vec<&str> = content_types.iter().map(ContentType::id).collect();
            let spans = (field_uses(content_types, id) == 0)
                .then(|| document.id_spans(id))
                .filter(|spans| spans.len() == occurrences(&type_ids, id, type_ids.len()));
            collector.emit(label_duplicate(diag, spans, &type_ids, previous, index));
        }

        validate_fields(content_types, content_type, document, &mut collector);
    }

    collector.finish()
}

fn validate_fields(
    content_types: &[ContentType],
    content_type: &ContentType,
    document: &Document<'_>,
    collector: &mut DiagnosticCollector,
) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let field_ids: Vec<&str> = content_type.fields.iter().map(|f| f.id.as_str()).collect();

    for (index, field) in content_type.fields.iter().enumerate() {
        if field.id.trim().is_empty() {
            collector.emit(
                Diagnostic::error(format!(
                    "field `{}` of content type `{}` has an empty id",
                    field.name,
                    content_type.id()
                ))
                .with_code(ErrorCode::E202),
            );
        } else if let Some(previous) = seen.insert(&field.id, index) {
            let diag = Diagnostic::error(format!(
                "content type `{}` declares field `{}` more than once",
                content_type.id(),
                field.id
            ))
            .with_code(ErrorCode::E203);
            let local = occurrences(&field_ids, &field.id, field_ids.len());
            let unambiguous = field_uses(content_types, &field.id) == local
                && !content_types.iter().any(|t| t.id() == field.id);
            let spans = unambiguous
                .then(|| document.id_spans(&field.id))
                .filter(|spans| spans.len() == local);
            collector.emit(label_duplicate(diag, spans, &field_ids, previous, index));
        }
    }
}

/// Number of fields across the whole model with this id.
fn field_uses(content_types: &[ContentType], id: &str) -> usize {
    content_types
        .iter()
        .flat_map(|t| &t.fields)
        .filter(|f| f.id == id)
        .count()
}

/// Number of entries in `ids[..end]` equal to `id`.
fn occurrences(ids: &[&str], id: &str, end: usize) -> usize {
    ids[..end].iter().filter(|other| **other == id).count()
}

/// Points the diagnostic at the duplicate and at the entry it clashes with.
///
/// `spans` holds one span per entry with this id, in document order, and is
/// only given when the text contains no other `"id"` member with the value.
fn label_duplicate(
    diag: Diagnostic,
    spans: Option<Vec<Span>>,
    ids: &[&str],
    previous: usize,
    index: usize,
) -> Diagnostic {
    let Some(spans) = spans else {
        return diag;
    };
    let id = ids[index];
    match (
        spans.get(occurrences(ids, id, index)),
        spans.get(occurrences(ids, id, previous)),
    ) {
        (Some(duplicate), Some(first)) => diag
            .with_label(*duplicate, "duplicate id")
            .with_secondary_label(*first, "previously defined here"),
        _ => diag,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Label;

    fn field(id: &str) -> Value {
        json!({
            "id": id, "name": id, "type": "Symbol",
            "localized": false, "required": false, "disabled": false, "omitted": false
        })
    }

    fn content_type(id: &str, fields: Vec<Value>) -> Value {
        json!({"sys": {"id": id}, "name": id.to_uppercase(), "fields": fields})
    }

    #[test]
    fn test_envelopes_canonicalize_to_same_graph() {
        let types = json!([content_type("post", vec![field("title")])]);
        let bare = parse(Payload::Value(&types)).unwrap();
        let items = parse(Payload::Value(&json!({"items": types.clone()}))).unwrap();
        let export = parse(Payload::Value(&json!({"contentTypes": types.clone()}))).unwrap();

        assert_eq!(bare, items);
        assert_eq!(bare, export);
    }

    #[test]
    fn test_unknown_envelope_is_rejected() {
        let err = parse(Payload::Value(&json!({"entries": []}))).unwrap_err();
        assert_eq!(err.codes().collect::<Vec<_>>(), vec![ErrorCode::E100]);

        let err = parse(Payload::Value(&json!(42))).unwrap_err();
        assert_eq!(err.codes().collect::<Vec<_>>(), vec![ErrorCode::E100]);
    }

    #[test]
    fn test_missing_field_flag_is_schema_error() {
        let value = json!([{
            "sys": {"id": "post"}, "name": "Post",
            "fields": [{"id": "title", "name": "Title", "type": "Symbol"}]
        }]);
        let err = parse(Payload::Value(&value)).unwrap_err();
        let diag = &err.diagnostics()[0];

        assert_eq!(diag.code(), Some(ErrorCode::E101));
        assert!(diag.message().contains("localized"), "{}", diag.message());
    }

    #[test]
    fn test_schema_error_in_text_has_span() {
        let source = r#"[{"sys": {"id": "post"}, "name": 7, "fields": []}]"#;
        let err = parse(Payload::Text(source)).unwrap_err();
        let diag = &err.diagnostics()[0];

        assert_eq!(diag.code(), Some(ErrorCode::E101));
        assert_eq!(diag.labels().len(), 1);
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let value = json!([
            content_type("post", vec![field("title"), field("title")]),
            content_type("post", vec![field("")]),
            content_type(" ", vec![]),
        ]);
        let err = parse(Payload::Value(&value)).unwrap_err();

        assert_eq!(
            err.codes().collect::<Vec<_>>(),
            vec![
                ErrorCode::E203,
                ErrorCode::E201,
                ErrorCode::E202,
                ErrorCode::E200
            ]
        );
    }

    fn label_text<'a>(source: &'a str, label: &Label) -> &'a str {
        &source[label.span().start()..label.span().end()]
    }

    #[test]
    fn test_duplicate_type_id_points_at_both_definitions() {
        let source = r#"[
            {"sys": {"id": "post"}, "name": "Post", "fields": []},
            {"sys": {"id": "post"}, "name": "Article", "fields": []}
        ]"#;
        let err = parse(Payload::Text(source)).unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.code(), Some(ErrorCode::E201));

        let labels = diag.labels();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].is_primary());
        assert!(labels[1].is_secondary());
        assert_eq!(label_text(source, &labels[0]), "\"post\"");
        assert_eq!(label_text(source, &labels[1]), "\"post\"");
        assert!(labels[1].span().start() < labels[0].span().start());
    }

    #[test]
    fn test_duplicate_field_id_points_at_both_fields() {
        let source = r#"[{"sys": {"id": "post"}, "name": "Post", "fields": [
            {"id": "title", "name": "Title", "type": "Symbol",
             "localized": false, "required": false, "disabled": false, "omitted": false},
            {"id" : "title", "name": "Headline", "type": "Symbol",
             "localized": false, "required": false, "disabled": false, "omitted": false}
        ]}]"#;
        let err = parse(Payload::Text(source)).unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.code(), Some(ErrorCode::E203));

        let labels = diag.labels();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].is_primary());
        assert_eq!(label_text(source, &labels[1]), "\"title\"");
        assert!(labels[1].span().start() < labels[0].span().start());
    }

    #[test]
    fn test_ambiguous_duplicate_has_no_labels() {
        // A field shares the duplicated type id, so the spans cannot be told apart.
        let value = json!([
            content_type("post", vec![field("post")]),
            content_type("post", vec![]),
        ]);
        let source = value.to_string();
        let err = parse(Payload::Text(&source)).unwrap_err();
        let diag = &err.diagnostics()[0];

        assert_eq!(diag.code(), Some(ErrorCode::E201));
        assert!(diag.labels().is_empty());
    }

    #[test]
    fn test_empty_model_is_accepted() {
        let graph = parse(Payload::Value(&json!([]))).unwrap();
        assert!(graph.is_empty());
    }
}
