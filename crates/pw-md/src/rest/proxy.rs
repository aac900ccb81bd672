//! CORS-proxy mirror strategies: URL wrapping and response unwrapping.

use pw_core::FetchError;
use pw_core::config::{ProxyMirror, ProxyStyle, UnwrapRule};
use serde_json::Value;

/// Build the mirror URL that fetches `target`.
pub fn wrap_url(mirror: &ProxyMirror, target: &str) -> String {
    match mirror.style {
        ProxyStyle::QueryParam => format!("{}{}", mirror.prefix, urlencoding::encode(target)),
        ProxyStyle::PathPrefix => format!("{}{}", mirror.prefix, target),
    }
}

/// Extract the upstream body from a mirror's response payload.
pub fn unwrap_payload(rule: UnwrapRule, payload: Value) -> Result<Value, FetchError> {
    match rule {
        UnwrapRule::Raw => Ok(payload),
        UnwrapRule::Contents => match contents_field(&payload) {
            Some(v) => Ok(v),
            None => Err(FetchError::MalformedData("proxy response has no contents".into())),
        },
        UnwrapRule::Data => match payload.get("data") {
            Some(v) if !v.is_null() => Ok(v.clone()),
            _ => Err(FetchError::MalformedData("proxy response has no data".into())),
        },
        UnwrapRule::Auto => {
            if let Some(v) = contents_field(&payload) {
                return Ok(v);
            }
            if let Some(v) = payload.get("data").filter(|v| !v.is_null()) {
                return Ok(v.clone());
            }
            Ok(payload)
        }
    }
}

/// A non-empty `contents` string, parsed as JSON when it parses.
fn contents_field(payload: &Value) -> Option<Value> {
    let contents = payload.get("contents")?.as_str()?;
    if contents.is_empty() {
        return None;
    }
    Some(serde_json::from_str(contents).unwrap_or_else(|_| Value::String(contents.to_string())))
}
