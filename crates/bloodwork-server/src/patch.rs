//! JSON Patch (RFC 6902) and JSON Merge Patch (RFC 7386) for stored records.

use axum::http::{HeaderMap, header};
use bloodwork_api::{ApiError, JSON_PATCH};
use json_patch::{Patch, PatchOperation, merge, patch};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFormat {
    JsonPatch,
    MergePatch,
}

impl PatchFormat {
    /// `application/json-patch+json` selects JSON Patch; any other JSON body is a merge patch.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let is_json_patch = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with(JSON_PATCH));
        if is_json_patch {
            PatchFormat::JsonPatch
        } else {
            PatchFormat::MergePatch
        }
    }
}

pub fn apply_patch(
    format: PatchFormat,
    resource: &Value,
    patch_bytes: &[u8],
) -> Result<Value, ApiError> {
    match format {
        PatchFormat::JsonPatch => apply_json_patch(resource, patch_bytes),
        PatchFormat::MergePatch => apply_merge_patch(resource, patch_bytes),
    }
}

/// Applies a JSON Patch document to a resource.
pub fn apply_json_patch(resource: &Value, patch_bytes: &[u8]) -> Result<Value, ApiError> {
    let operations: Patch = serde_json::from_slice(patch_bytes)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON Patch document: {e}")))?;

    validate_json_patch_operations(&operations.0)?;

    let mut patched = resource.clone();
    patch(&mut patched, &operations)
        .map_err(|e| ApiError::bad_request(format!("Patch operation failed: {e}")))?;

    Ok(patched)
}

fn validate_json_patch_operations(operations: &[PatchOperation]) -> Result<(), ApiError> {
    for op in operations {
        for pointer in touched_pointers(op) {
            if let Some(field) = protected_member(pointer) {
                return Err(ApiError::invalid(field, "cannot be modified with patch"));
            }
        }
    }
    Ok(())
}

/// `resourceType` or `id` when the pointer addresses either of them.
fn protected_member(pointer: &str) -> Option<&'static str> {
    ["resourceType", "id"].into_iter().find(|member| {
        pointer
            .strip_prefix('/')
            .and_then(|rest| rest.strip_prefix(member))
            .is_some_and(|tail| tail.is_empty() || tail.starts_with('/'))
    })
}

/// Target path, plus the source of `move` and `copy`.
fn touched_pointers(op: &PatchOperation) -> Vec<&str> {
    match op {
        PatchOperation::Add(add_op) => vec![add_op.path.as_str()],
        PatchOperation::Remove(remove_op) => vec![remove_op.path.as_str()],
        PatchOperation::Replace(replace_op) => vec![replace_op.path.as_str()],
        PatchOperation::Move(move_op) => vec![move_op.path.as_str(), move_op.from.as_str()],
        PatchOperation::Copy(copy_op) => vec![copy_op.path.as_str()],
        PatchOperation::Test(test_op) => vec![test_op.path.as_str()],
    }
}

/// Applies a merge patch. `null` members remove fields.
pub fn apply_merge_patch(resource: &Value, patch_bytes: &[u8]) -> Result<Value, ApiError> {
    let doc: Value = serde_json::from_slice(patch_bytes)
        .map_err(|e| ApiError::bad_request(format!("Invalid merge patch document: {e}")))?;
    let Some(members) = doc.as_object() else {
        return Err(ApiError::bad_request("merge patch body must be a JSON object"));
    };
    for protected in ["resourceType", "id"] {
        if let Some(value) = members.get(protected)
            && resource.get(protected) != Some(value)
        {
            return Err(ApiError::invalid(protected, "cannot be modified with patch"));
        }
    }

    let mut patched = resource.clone();
    merge(&mut patched, &doc);
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn patient() -> Value {
        json!({
            "resourceType": "Patient",
            "id": "1",
            "name": [{"text": "Jane Doe"}],
            "gender": "female"
        })
    }

    #[test]
    fn json_patch_replaces_field() {
        let ops = br#"[{"op":"replace","path":"/gender","value":"other"}]"#;
        let out = apply_json_patch(&patient(), ops).unwrap();
        assert_eq!(out["gender"], "other");
        assert_eq!(out["name"][0]["text"], "Jane Doe");
    }

    #[test]
    fn json_patch_rejects_protected_paths() {
        for ops in [
            br#"[{"op":"replace","path":"/id","value":"2"}]"#.as_slice(),
            br#"[{"op":"remove","path":"/resourceType"}]"#.as_slice(),
        ] {
            let err = apply_json_patch(&patient(), ops).unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn json_patch_cannot_move_identity_away() {
        let ops = br#"[{"op":"move","from":"/id","path":"/identifier"}]"#;
        let err = apply_json_patch(&patient(), ops).unwrap_err();
        assert!(matches!(err, ApiError::Invalid { ref path, .. } if path == "id"));

        let ops = br#"[{"op":"move","from":"/resourceType","path":"/kind"}]"#;
        assert!(apply_json_patch(&patient(), ops).is_err());

        // Copying reads the source without changing it.
        let ops = br#"[{"op":"copy","from":"/id","path":"/identifierCopy"}]"#;
        let out = apply_json_patch(&patient(), ops).unwrap();
        assert_eq!(out["id"], "1");
        assert!(protected_member("/identifier").is_none());
    }

    #[test]
    fn json_patch_failures_are_bad_requests() {
        assert!(apply_json_patch(&patient(), b"{}").is_err());
        let ops = br#"[{"op":"test","path":"/gender","value":"male"}]"#;
        assert!(apply_json_patch(&patient(), ops).is_err());
    }

    #[test]
    fn merge_patch_sets_and_removes() {
        let out = apply_merge_patch(&patient(), br#"{"gender":null,"birthDate":"1980-01-01"}"#)
            .unwrap();
        assert!(out.get("gender").is_none());
        assert_eq!(out["birthDate"], "1980-01-01");
    }

    #[test]
    fn merge_patch_guards_identity() {
        assert!(apply_merge_patch(&patient(), br#"{"id":"2"}"#).is_err());
        assert!(apply_merge_patch(&patient(), br#"{"resourceType":"Group"}"#).is_err());
        assert!(apply_merge_patch(&patient(), br#"{"id":"1","gender":"male"}"#).is_ok());
        assert!(apply_merge_patch(&patient(), b"[]").is_err());
    }

    #[test]
    fn format_follows_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(PatchFormat::from_headers(&headers), PatchFormat::MergePatch);
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_PATCH));
        assert_eq!(PatchFormat::from_headers(&headers), PatchFormat::JsonPatch);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(bloodwork_api::MERGE_PATCH),
        );
        assert_eq!(PatchFormat::from_headers(&headers), PatchFormat::MergePatch);
    }
}
