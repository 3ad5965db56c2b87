//! HTTP request/response data and the normalized result record.
//!
//! # Design
//! Requests and responses are plain data. The client builds an `HttpRequest`,
//! a `Transport` executes it, and `ApiResult` folds whatever came back (a
//! response or a transport failure) into the one shape callers inspect.
//! Status interpretation lives here rather than in the transport so the
//! acceptance rules stay identical no matter which transport runs the call.

use serde::Serialize;
use serde_json::Value;

use crate::error::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether `status` counts as success for this verb.
    ///
    /// POST accepts 200 and 201; every other verb accepts only 200.
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            HttpMethod::Post => status == 200 || status == 201,
            HttpMethod::Get | HttpMethod::Put | HttpMethod::Delete => status == 200,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Response body: decoded JSON when the payload parses, the raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn parse(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(raw),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ResponseBody::Json(value) => value.clone(),
            ResponseBody::Text(text) => Value::String(text.clone()),
        }
    }
}

/// Normalized outcome of one gateway call.
///
/// `ok` is derived from `status_code` and the request verb only. A transport
/// failure is never `ok`: it fills `transport_error`, leaves `body` empty, and
/// keeps `status_code` only if a status line was seen before the failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResult {
    pub ok: bool,
    pub status_code: Option<u16>,
    pub body: Option<ResponseBody>,
    pub transport_error: Option<String>,
}

impl ApiResult {
    pub fn from_response(method: HttpMethod, response: HttpResponse) -> Self {
        Self {
            ok: method.accepts(response.status),
            status_code: Some(response.status),
            body: Some(ResponseBody::parse(response.body)),
            transport_error: None,
        }
    }

    pub fn from_transport_error(error: &TransportError) -> Self {
        Self {
            ok: false,
            status_code: error.status(),
            body: None,
            transport_error: Some(error.to_string()),
        }
    }

    /// The JSON body, if the gateway returned one.
    pub fn json(&self) -> Option<&Value> {
        self.body.as_ref().and_then(ResponseBody::as_json)
    }

    /// Look up a nested JSON field by path, e.g. `["key", "remoteJid"]`.
    pub fn pointer(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(self.json()?, |value, key| value.get(*key))
    }
}
