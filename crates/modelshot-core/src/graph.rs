//! The content model graph: content types (nodes), their fields, and the
//! relations implied by link fields.
//!
//! The serialized shape follows the content-type export format of the CMS:
//! every content type carries a `sys` block with its id, a display name,
//! and a list of fields with primitive or link types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the validation rule that restricts which content types a link
/// field may point to.
const LINK_CONTENT_TYPE: &str = "linkContentType";

/// Target kind of a link field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    Asset,
    Entry,
}

/// A single validation rule, kept as an opaque JSON object.
pub type ValidationRule = Map<String, Value>;

/// System metadata of a content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeSys {
    /// Stable identifier of the content type; layouts are keyed by it.
    pub id: String,

    #[serde(rename = "type", default = "default_sys_type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<Value>,
}

fn default_sys_type() -> String {
    "ContentType".to_string()
}

/// Element description of an array field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldItems {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Vec<ValidationRule>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
}

/// A field definition of a content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub name: String,

    /// Primitive type name (`Symbol`, `Text`, `Link`, `Array`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    pub localized: bool,
    pub required: bool,
    pub disabled: bool,
    pub omitted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Vec<ValidationRule>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<FieldItems>,
}

impl Field {
    /// Content type ids this field may link to, taken from
    /// `linkContentType` rules on the field itself and on its array items.
    pub fn link_targets(&self) -> impl Iterator<Item = &str> {
        let own = self.validations.iter().flatten();
        let items = self
            .items
            .iter()
            .flat_map(|items| items.validations.iter().flatten());

        own.chain(items)
            .filter_map(|rule| rule.get(LINK_CONTENT_TYPE))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str)
    }
}

/// A content type: one node of the diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentType {
    pub sys: ContentTypeSys,
    pub name: String,

    #[serde(default)]
    pub display_field: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    pub fields: Vec<Field>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
}

impl ContentType {
    pub fn id(&self) -> &str {
        &self.sys.id
    }
}

/// A relation between two content types, derived from a link field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation<'a> {
    pub from: &'a str,
    pub field: &'a str,
    pub to: &'a str,
}

/// The full set of content types of a content model.
///
/// Equality is structural: two graphs are equal when they hold the same
/// content types in the same order with equal fields. Absent optional
/// properties and explicit `null`s deserialize to the same value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentGraph(Vec<ContentType>);

impl ContentGraph {
    pub fn new(content_types: Vec<ContentType>) -> Self {
        Self(content_types)
    }

    pub fn content_types(&self) -> &[ContentType] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ids of all content types in declaration order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(ContentType::id)
    }

    /// Returns the content type with the given id.
    pub fn find(&self, id: &str) -> Option<&ContentType> {
        self.0.iter().find(|ct| ct.id() == id)
    }

    /// All relations declared through link fields.
    pub fn relations(&self) -> impl Iterator<Item = Relation<'_>> {
        self.0.iter().flat_map(|ct| {
            ct.fields.iter().flat_map(move |field| {
                field.link_targets().map(move |to| Relation {
                    from: ct.id(),
                    field: &field.id,
                    to,
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn blog_graph() -> ContentGraph {
        serde_json::from_value(json!([
            {
                "sys": {"id": "post", "type": "ContentType"},
                "name": "Post",
                "displayField": "title",
                "description": null,
                "fields": [
                    {"id": "title", "name": "Title", "type": "Symbol",
                     "localized": false, "required": true, "disabled": false, "omitted": false},
                    {"id": "author", "name": "Author", "type": "Link", "linkType": "Entry",
                     "localized": false, "required": false, "disabled": false, "omitted": false,
                     "validations": [{"linkContentType": ["person"]}]},
                    {"id": "tags", "name": "Tags", "type": "Array",
                     "localized": false, "required": false, "disabled": false, "omitted": false,
                     "items": {"type": "Link", "linkType": "Entry",
                               "validations": [{"linkContentType": ["tag", "category"]}]}}
                ]
            },
            {
                "sys": {"id": "person"},
                "name": "Person",
                "fields": []
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_node_ids_in_order() {
        let graph = blog_graph();
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec!["post", "person"]);
        assert_eq!(graph.find("person").unwrap().name, "Person");
    }

    #[test]
    fn test_relations_from_link_fields() {
        let graph = blog_graph();
        let relations: Vec<_> = graph.relations().map(|r| (r.field, r.to)).collect();
        assert_eq!(
            relations,
            vec![("author", "person"), ("tags", "tag"), ("tags", "category")]
        );
    }

    #[test]
    fn test_missing_and_null_optionals_are_equal() {
        let with_null: ContentType = serde_json::from_value(json!({
            "sys": {"id": "a"}, "name": "A", "fields": [],
            "displayField": null, "internal": null
        }))
        .unwrap();
        let without: ContentType =
            serde_json::from_value(json!({"sys": {"id": "a"}, "name": "A", "fields": []}))
                .unwrap();

        assert_eq!(with_null, without);
    }

    #[test]
    fn test_validation_key_order_does_not_matter() {
        let a: ValidationRule =
            serde_json::from_str(r#"{"linkContentType": ["x"], "message": "m"}"#).unwrap();
        let b: ValidationRule =
            serde_json::from_str(r#"{"message": "m", "linkContentType": ["x"]}"#).unwrap();
        assert_eq!(a, b);
    }
}
