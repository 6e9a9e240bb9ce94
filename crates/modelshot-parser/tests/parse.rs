use modelshot_core::{geometry::Point, layout::Layout};
use modelshot_parser::{error::ErrorCode, parse_content_model, parse_layout};
use proptest::prelude::*;
use serde_json::json;

const BLOG_EXPORT: &str = r#"
{
  "contentTypes": [
    {
      "sys": {"id": "post", "type": "ContentType", "space": {"sys": {"id": "abc"}}},
      "name": "Post",
      "displayField": "title",
      "description": "A blog post",
      "fields": [
        {"id": "title", "name": "Title", "type": "Symbol",
         "localized": true, "required": true, "disabled": false, "omitted": false},
        {"id": "author", "name": "Author", "type": "Link", "linkType": "Entry",
         "localized": false, "required": false, "disabled": false, "omitted": false,
         "validations": [{"linkContentType": ["person"]}]},
        {"id": "hero", "name": "Hero", "type": "Link", "linkType": "Asset",
         "localized": false, "required": false, "disabled": false, "omitted": false}
      ]
    },
    {
      "sys": {"id": "person", "type": "ContentType"},
      "name": "Person",
      "displayField": null,
      "description": null,
      "fields": []
    }
  ],
  "editorInterfaces": []
}
"#;

#[test]
fn test_parse_cli_export() {
    let graph = parse_content_model(BLOG_EXPORT).expect("Failed to parse");

    assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec!["post", "person"]);
    let relations: Vec<_> = graph.relations().map(|r| (r.from, r.to)).collect();
    assert_eq!(relations, vec![("post", "person")]);
}

#[test]
fn test_parse_delivery_api_response() {
    let response = json!({
        "sys": {"type": "Array"},
        "total": 1,
        "skip": 0,
        "limit": 100,
        "items": [
            {"sys": {"id": "person", "type": "ContentType"}, "name": "Person", "fields": []}
        ]
    });

    let graph = parse_content_model(&response).expect("Failed to parse");
    assert_eq!(graph.len(), 1);
}

#[test]
fn test_malformed_json_is_an_error() {
    let err = parse_content_model(r#"[{"sys": {"id": "post"}"#).unwrap_err();
    assert_eq!(err.codes().collect::<Vec<_>>(), vec![ErrorCode::E002]);

    let err = parse_layout("{A: 1}").unwrap_err();
    assert_eq!(err.codes().collect::<Vec<_>>(), vec![ErrorCode::E001]);
}

#[test]
fn test_layout_text_with_surrounding_whitespace() {
    let layout = parse_layout("  \n {\"contentTypes\": {\"A\": {\"x\": 10, \"y\": 5}}}\n\t")
        .expect("Failed to parse");

    let expected: Layout = [("A", Point::new(10.0, 5.0))].into_iter().collect();
    assert_eq!(layout, expected);
}

proptest! {
    #[test]
    fn prop_model_parser_never_panics(input in any::<String>()) {
        let _ = parse_content_model(input.as_str());
    }

    #[test]
    fn prop_layout_parser_never_panics(input in any::<String>()) {
        let _ = parse_layout(input.as_str());
    }

    #[test]
    fn prop_json_like_input_never_panics(input in r#"[\[\]{}",:0-9a-z \n]{0,64}"#) {
        let _ = parse_content_model(input.as_str());
        let _ = parse_layout(input.as_str());
    }

    #[test]
    fn prop_error_labels_stay_inside_source(input in r#"\s{0,3}[\[{"a-z:,0-9]{1,32}"#) {
        if let Err(err) = parse_layout(input.as_str()) {
            for diag in err.diagnostics() {
                for label in diag.labels() {
                    prop_assert!(label.span().end() <= input.len());
                    prop_assert!(input.is_char_boundary(label.span().start()));
                }
            }
        }
    }
}
