//! Request types and response helpers for the label system API.

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// Options for a single [`Client::request`](crate::Client::request) call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method. `None` means GET.
    pub method: Option<Method>,
    /// JSON body, sent verbatim.
    pub body: Option<Value>,
    /// Extra headers, overriding the defaults.
    pub headers: HeaderMap,
}

impl RequestOptions {
    /// A request with the given method and no body.
    pub fn method(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Default::default()
        }
    }

    /// A request with the given method and JSON body.
    pub fn with_body(method: Method, body: Value) -> Self {
        Self {
            method: Some(method),
            body: Some(body),
            ..Default::default()
        }
    }
}

/// Filters for the label listing.
#[derive(Debug, Clone, Serialize, Default)]
pub struct LabelQuery {
    /// Only children of this label code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,
    /// Label type, e.g. `intent` or `entity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
    /// Hierarchy level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// 1-based page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

/// Filters for the label tree.
#[derive(Debug, Clone, Serialize, Default)]
pub struct LabelTreeQuery {
    /// Root the tree at this label code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_code: Option<String>,
    /// Label type, e.g. `intent` or `entity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
}

/// Plain pagination for rule, item and entity tag listings.
#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct PageQuery {
    /// 1-based page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

/// Body of an intent recognition call.
#[derive(Debug, Clone, Serialize)]
pub struct IntentRequest<'a> {
    /// Text to recognize.
    pub query: &'a str,
    /// Free-form context forwarded to the backend.
    pub context: &'a Value,
}

/// Unwrap the `{ data: ... }` envelope.
///
/// Returns `data` when present and non-null, else the raw body when
/// non-null, else an empty array.
pub fn unwrap_envelope(response: Value) -> Value {
    match response {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            Some(data) => {
                map.insert("data".to_string(), data);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        Value::Null => Value::Array(Vec::new()),
        other => other,
    }
}

/// Records of a list response: `data` when it is an array, else the body
/// itself when it is an array.
pub(crate) fn envelope_records(response: &Value) -> &[Value] {
    response
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| response.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// JavaScript-style truthiness of a JSON value.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
