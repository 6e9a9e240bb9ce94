//! Layout payload parsing.

use std::collections::BTreeMap;

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use modelshot_core::{geometry::Point, layout::Layout};

use crate::{
    Payload,
    document::Document,
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
};

const CONTENT_TYPES_KEY: &str = "contentTypes";

/// The stored form: `{"contentTypes": {"<id>": {"x": .., "y": ..}}}`.
#[derive(Deserialize)]
struct LayoutEnvelope {
    #[serde(rename = "contentTypes")]
    content_types: BTreeMap<String, Point>,
}

/// True for objects shaped like `{"contentTypes": {...}}` where the inner
/// object is a map of positions rather than a position itself.
fn is_envelope(map: &Map<String, Value>) -> bool {
    match map.get(CONTENT_TYPES_KEY) {
        Some(Value::Object(inner)) if map.len() == 1 => !looks_like_point(inner),
        _ => false,
    }
}

fn looks_like_point(map: &Map<String, Value>) -> bool {
    map.get("x").is_some_and(Value::is_number) && map.get("y").is_some_and(Value::is_number)
}

pub(crate) fn parse(payload: Payload<'_>) -> Result<Layout, ParseError> {
    let document = Document::load(payload)?;

    let Value::Object(map) = document.value() else {
        return Err(Diagnostic::error("unrecognized layout payload")
            .with_code(ErrorCode::E100)
            .with_help(r#"expected an object such as {"contentTypes": {"post": {"x": 0, "y": 0}}}"#)
            .into());
    };

    let positions = if is_envelope(map) {
        document
            .decode::<LayoutEnvelope>(ErrorCode::E102, "layout")?
            .content_types
    } else {
        document.decode::<BTreeMap<String, Point>>(ErrorCode::E102, "layout")?
    };

    let mut collector = DiagnosticCollector::new();
    if positions.is_empty() {
        collector.emit(Diagnostic::warning("layout has no positions"));
    }
    collector.finish()?;

    let layout: Layout = positions.into_iter().collect();
    debug!(positions = layout.len(); "Parsed layout");
    Ok(layout)
}
