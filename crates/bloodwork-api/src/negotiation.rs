//! Media type checks for `Accept` and `Content-Type`. Only JSON is served.

use axum::http::{HeaderMap, HeaderName, header};

use crate::error::ApiError;
use crate::{FHIR_JSON, JSON, JSON_PATCH, MERGE_PATCH};

/// `type/subtype` without parameters, lowercased.
fn essence(media_range: &str) -> String {
    media_range
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn header_str<'a>(headers: &'a HeaderMap, name: HeaderName) -> Option<&'a str> {
    headers.get(name).map(|v| v.to_str().unwrap_or_default())
}

/// A missing `Accept` is fine; otherwise one of its ranges must admit JSON.
pub fn validate_accept(headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(accept) = header_str(headers, header::ACCEPT) else {
        return Ok(());
    };
    let acceptable = accept.split(',').map(essence).any(|range| {
        matches!(
            range.as_str(),
            FHIR_JSON | JSON | "*/*" | "application/*"
        )
    });
    if acceptable {
        Ok(())
    } else {
        Err(ApiError::unsupported_media_type(format!(
            "cannot produce '{accept}'; use {FHIR_JSON} or {JSON}"
        )))
    }
}

/// Request bodies must be JSON, JSON Patch or JSON merge patch.
pub fn validate_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(content_type) = header_str(headers, header::CONTENT_TYPE) else {
        return Ok(());
    };
    match essence(content_type).as_str() {
        FHIR_JSON | JSON | JSON_PATCH | MERGE_PATCH => Ok(()),
        _ => Err(ApiError::unsupported_media_type(format!(
            "cannot read a '{content_type}' body; send JSON"
        ))),
    }
}
