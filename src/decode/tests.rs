//! Tests for decode module

use super::*;
use crate::error::Error;
use crate::types::{JsonObject, JsonValue};
use pretty_assertions::assert_eq;
use serde_json::json;

fn tag_response() -> JsonValue {
    json!({
        "next": false,
        "hasItemTagPermission": true,
        "ItemTagCount": 25,
        "userDisplayName": {},
        "zsuserIdvsZUID": {},
        "status": "success",
        "zsTag_prop": {
            "tagId": 0,
            "createdBy": 1,
            "colorCode": 2,
            "tagName": 3
        },
        "zsTagIds": ["114398000000007009", "114398000000007021"],
        "zsTagJObj": {
            "114398000000007009": ["114398000000007009", "114398000000002003", "#3bb273", "backend"],
            "114398000000007021": ["114398000000007021", "114398000000002003", "#f17f23", "dsaf"]
        }
    })
}

fn tag_decoder() -> UnfurlDecoder {
    UnfurlDecoder::new("zsTag_prop", "zsTagIds", "zsTagJObj", "tagId")
}

fn collect(rows: Rows<'_>) -> Vec<JsonValue> {
    rows.map(|row| JsonValue::Object(row.unwrap())).collect()
}

// ============================================================================
// Unfurl Tests
// ============================================================================

#[test]
fn test_unfurl_tag_response() {
    let body = tag_response();
    let decoder = tag_decoder();
    let rows = collect(decoder.decode(&body).unwrap());

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[1],
        json!({
            "next": false,
            "hasItemTagPermission": true,
            "ItemTagCount": 25,
            "userDisplayName": {},
            "zsuserIdvsZUID": {},
            "status": "success",
            "record": {
                "tagId": "114398000000007021",
                "createdBy": "114398000000002003",
                "colorCode": "#f17f23",
                "tagName": "dsaf"
            },
            "tagId": "114398000000007021"
        })
    );
}

#[test]
fn test_unfurl_preserves_ids_order() {
    let body = tag_response();
    let decoder = tag_decoder();
    let ids: Vec<JsonValue> = decoder
        .unfurl(&body)
        .unwrap()
        .map(|row| row.unwrap()["tagId"].clone())
        .collect();

    assert_eq!(ids, vec![json!("114398000000007009"), json!("114398000000007021")]);
}

#[test]
fn test_unfurl_single_project() {
    let body = json!({
        "projectIds": ["t1"],
        "project_prop": {"name": 0},
        "projectJObj": {"t1": ["Acme"]}
    });
    let decoder = UnfurlDecoder::new("project_prop", "projectIds", "projectJObj", "projectId");
    let rows = collect(decoder.decode(&body).unwrap());

    assert_eq!(rows, vec![json!({"projectId": "t1", "record": {"name": "Acme"}})]);
}

#[test]
fn test_unfurl_does_not_mutate_input() {
    let body = tag_response();
    let original = body.clone();
    let decoder = tag_decoder();

    let first = collect(decoder.decode(&body).unwrap());
    let second = collect(decoder.decode(&body).unwrap());

    assert_eq!(body, original);
    assert_eq!(first, second);
}

#[test]
fn test_unfurl_empty_ids_is_empty() {
    let body = json!({"zsTagIds": [], "status": "success"});
    let rows = collect(tag_decoder().decode(&body).unwrap());
    assert!(rows.is_empty());
}

#[test]
fn test_unfurl_numeric_ids() {
    let body = json!({
        "ids": [7, 8],
        "prop": {"n": 0},
        "jObj": {"7": ["seven"], "8": ["eight"]}
    });
    let decoder = UnfurlDecoder::new("prop", "ids", "jObj", "id");
    let rows = collect(decoder.decode(&body).unwrap());

    assert_eq!(rows[0], json!({"id": 7, "record": {"n": "seven"}}));
    assert_eq!(rows[1], json!({"id": 8, "record": {"n": "eight"}}));
}

#[test]
fn test_unfurl_record_key_does_not_clobber_root() {
    let body = json!({
        "status": "success",
        "ids": ["a"],
        "prop": {"status": 0},
        "jObj": {"a": ["archived"]}
    });
    let decoder = UnfurlDecoder::new("prop", "ids", "jObj", "id");
    let rows = collect(decoder.decode(&body).unwrap());

    assert_eq!(rows[0]["status"], "success");
    assert_eq!(rows[0]["record"]["status"], "archived");
}

#[test]
fn test_unfurl_missing_ids_is_parse_error() {
    let body = json!({"zsTag_prop": {}, "zsTagJObj": {}});
    let err = tag_decoder().decode(&body).err().unwrap();
    assert!(matches!(err, Error::Parse { .. }));
    assert!(err.to_string().contains("zsTagIds"));
}

#[test]
fn test_unfurl_ids_not_array_is_parse_error() {
    let body = json!({"zsTagIds": "abc", "zsTag_prop": {}, "zsTagJObj": {}});
    let err = tag_decoder().decode(&body).err().unwrap();
    assert!(matches!(err, Error::Parse { .. }));
}

#[test]
fn test_unfurl_missing_prop_or_jobj_is_parse_error() {
    let body = json!({"zsTagIds": ["a"], "zsTagJObj": {"a": []}});
    assert!(matches!(
        tag_decoder().decode(&body).err().unwrap(),
        Error::Parse { .. }
    ));

    let body = json!({"zsTagIds": ["a"], "zsTag_prop": {"x": 0}});
    assert!(matches!(
        tag_decoder().decode(&body).err().unwrap(),
        Error::Parse { .. }
    ));
}

#[test]
fn test_unfurl_row_errors_are_yielded_in_place() {
    let body = json!({
        "ids": ["a", "missing", "short"],
        "prop": {"x": 0, "y": 1},
        "jObj": {"a": [1, 2], "short": [1]}
    });
    let decoder = UnfurlDecoder::new("prop", "ids", "jObj", "id");
    let rows: Vec<_> = decoder.unfurl(&body).unwrap().collect();

    assert_eq!(rows.len(), 3);
    assert!(rows[0].is_ok());
    assert!(matches!(rows[1], Err(Error::Parse { .. })));
    assert!(matches!(rows[2], Err(Error::Parse { .. })));
}

#[test]
fn test_unfurl_non_object_body() {
    let err = tag_decoder().decode(&json!([1, 2])).err().unwrap();
    assert!(matches!(err, Error::Parse { .. }));
}

// ============================================================================
// Passthrough Tests
// ============================================================================

#[test]
fn test_passthrough_array_body() {
    let body = json!([{"id": 1}, {"id": 2}]);
    let rows = collect(PassthroughDecoder::new().decode(&body).unwrap());
    assert_eq!(rows, vec![json!({"id": 1}), json!({"id": 2})]);
}

#[test]
fn test_passthrough_object_body_is_one_record() {
    let body = json!({"myTeamId": "1", "portals": []});
    let rows = collect(PassthroughDecoder::new().decode(&body).unwrap());
    assert_eq!(rows, vec![body]);
}

#[test]
fn test_passthrough_records_path() {
    let body = json!({
        "status": "success",
        "portals": [{"zsoid": "100", "teamName": "A"}, {"zsoid": "200", "teamName": "B"}]
    });
    let rows = collect(PassthroughDecoder::with_path("portals").decode(&body).unwrap());

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["zsoid"], "200");
}

#[test]
fn test_passthrough_missing_path_is_empty() {
    let body = json!({"status": "success"});
    let rows = collect(PassthroughDecoder::with_path("portals").decode(&body).unwrap());
    assert!(rows.is_empty());
}

#[test]
fn test_passthrough_non_object_element() {
    let body = json!([{"id": 1}, 2]);
    let rows: Vec<_> = PassthroughDecoder::new().decode(&body).unwrap().collect();
    assert!(rows[0].is_ok());
    assert!(matches!(rows[1], Err(Error::Parse { .. })));
}

#[test]
fn test_passthrough_scalar_body_is_parse_error() {
    let err = PassthroughDecoder::new().decode(&json!("nope")).err().unwrap();
    assert!(matches!(err, Error::Parse { .. }));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_reshape_config_yaml() {
    let config: ReshapeConfig = serde_yaml::from_str(
        "type: unfurl\nprop_key: project_prop\nids_key: projectIds\njobj_key: projectJObj\nprimary_key_name: projectId",
    )
    .unwrap();
    assert_eq!(
        config,
        ReshapeConfig::unfurl("project_prop", "projectIds", "projectJObj", "projectId")
    );

    let config: ReshapeConfig = serde_yaml::from_str("type: passthrough").unwrap();
    assert_eq!(config, ReshapeConfig::default());
}

#[test]
fn test_create_decoder_from_config() {
    let body = json!({
        "projectIds": ["t1"],
        "project_prop": {"name": 0},
        "projectJObj": {"t1": ["Acme"]}
    });
    let config = ReshapeConfig::unfurl("project_prop", "projectIds", "projectJObj", "projectId");
    let decoder = create_decoder(&config);
    let rows: Vec<JsonObject> = decoder.decode(&body).unwrap().map(Result::unwrap).collect();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["projectId"], "t1");
}
