//! Controller actions: validate an inbound request, call the gateway, and
//! shape the outcome into a caller-facing JSON response.
//!
//! # Design
//! Actions are framework-free. An `ActionRequest` carries the inbound method,
//! the optional instance key taken from the route, and the parsed JSON body;
//! an `ActionResponse` carries the status code and JSON body to send back.
//! Any HTTP server can adapt them in a few lines.
//!
//! Validation failures are answered before the client is touched, so a
//! rejected request never reaches the network. Responses follow two shapes:
//!
//! - success: `{"ok": true, "message": ..., "data": <gateway body>}`
//! - failure: `{"ok": false, "error": ..., "details": <transport error>,
//!   "api_response": <gateway body>, "http_code": <gateway status>}`

use std::convert::identity;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::client::EvolutionClient;
use crate::error::extract_error_message;
use crate::http::{ApiResult, HttpMethod};
use crate::payload::Options;
use crate::transport::Transport;
use crate::types::{Media, StatusType};

const DOCUMENT_MEDIATYPE: &str = "document";
const DOCUMENT_MIMETYPE: &str = "application/pdf";

/// An inbound controller request.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub method: HttpMethod,
    /// Instance key from the route, if the route has one.
    pub instance_key: Option<String>,
    pub body: Value,
}

impl ActionRequest {
    pub fn new(method: HttpMethod, body: Value) -> Self {
        Self {
            method,
            instance_key: None,
            body,
        }
    }

    pub fn with_instance(mut self, instance_key: &str) -> Self {
        self.instance_key = Some(instance_key.to_string());
        self
    }
}

/// The status code and JSON body to answer with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub status: u16,
    pub body: Value,
}

impl ActionResponse {
    pub fn is_ok(&self) -> bool {
        self.body["ok"] == Value::Bool(true)
    }

    fn rejected(status: u16, error: &str) -> Self {
        Self {
            status,
            body: json!({"ok": false, "error": error}),
        }
    }

    fn success(status: u16, message: String, result: &ApiResult) -> Self {
        Self {
            status,
            body: json!({"ok": true, "message": message, "data": data_of(result)}),
        }
    }

    /// Shape a failed gateway call. Transport failures answer 500; a call
    /// whose status was accepted but whose body was unusable answers 502;
    /// anything else relays the gateway's status.
    fn failure(result: &ApiResult, fallback: &str) -> Self {
        let status = match (&result.transport_error, result.status_code) {
            (Some(_), _) | (None, None) => 500,
            (None, Some(_)) if result.ok => 502,
            (None, Some(code)) => code,
        };
        let error = extract_error_message(result).unwrap_or_else(|| fallback.to_string());
        Self {
            status,
            body: json!({
                "ok": false,
                "error": error,
                "details": result.transport_error,
                "api_response": data_of(result),
                "http_code": result.status_code,
            }),
        }
    }
}

type Outcome = Result<ActionResponse, ActionResponse>;

/// Send a PDF document from `numero`, `documento` (URL) and
/// `nombre_documento` using the route instance or the default instance.
pub fn send_document<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        require_post(req)?;
        let instance = resolve_instance(client, req)?;
        let (number, document, file_name) = match (
            required_str(&req.body, "numero"),
            required_str(&req.body, "documento"),
            required_str(&req.body, "nombre_documento"),
        ) {
            (Some(n), Some(d), Some(f)) => (n, d, f),
            _ => return Err(bad_request("Missing required parameters: numero, documento, nombre_documento.")),
        };

        let media = Media::new(number, DOCUMENT_MEDIATYPE, DOCUMENT_MIMETYPE, document, file_name);
        let result = client.send_media(&instance, &media, &Options::new());
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to send document."));
        }
        Ok(ActionResponse::success(200, "Document sent.".to_string(), &result))
    })
}

/// Check which of `numeros` are WhatsApp accounts.
pub fn check_numbers<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        require_post(req)?;
        let instance = resolve_instance(client, req)?;
        let numbers = match req.body.get("numeros") {
            Some(Value::Array(items)) if !items.is_empty() => phone_numbers(items).ok_or_else(|| {
                bad_request("Invalid parameter: every entry of 'numeros' must be a phone number.")
            })?,
            _ => {
                return Err(bad_request(
                    "Missing required parameter: 'numeros' must be a non-empty array.",
                ))
            }
        };

        let result = client.check_is_whatsapp(&instance, &numbers);
        let has_entries = matches!(result.json(), Some(Value::Array(items)) if !items.is_empty());
        if !result.ok || !has_entries {
            return Ok(ActionResponse::failure(&result, "Failed to verify numbers."));
        }
        Ok(ActionResponse::success(200, "Verification succeeded.".to_string(), &result))
    })
}

pub fn connection_state<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        let instance = resolve_instance(client, req)?;
        let result = client.connection_state(&instance);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to fetch the connection state."));
        }
        let state = str_at(&result, &["instance", "state"])
            .or_else(|| str_at(&result, &["state"]))
            .unwrap_or("unknown");
        Ok(ActionResponse::success(200, format!("Instance state: {state}."), &result))
    })
}

/// Create an instance from `instanceName` and `instanceKey`; any other body
/// fields (`token`, `qrcode`, `integration`, ...) are passed as options.
pub fn create_instance<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        require_post(req)?;
        let (name, key) = match (
            required_str(&req.body, "instanceName"),
            required_str(&req.body, "instanceKey"),
        ) {
            (Some(name), Some(key)) => (name, key),
            _ => return Err(bad_request("Missing required parameters: instanceName and instanceKey.")),
        };

        let options = options_without(&req.body, &["instanceName", "instanceKey"]);
        let result = client.create_instance(name, key, &options);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to create the instance."));
        }
        let created = str_at(&result, &["instance", "instanceKey"]).unwrap_or(key);
        Ok(ActionResponse::success(
            result.status_code.unwrap_or(201),
            format!("Instance '{created}' created."),
            &result,
        ))
    })
}

pub fn connect_instance<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        let instance = path_instance(req)?;
        let result = client.instance_connect(instance);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to start the instance connection."));
        }
        let message = str_at(&result, &["message"])
            .unwrap_or("Connection started. Scan the QR code or use the pairing code.");
        Ok(ActionResponse::success(200, message.to_string(), &result))
    })
}

pub fn logout_instance<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        let instance = path_instance(req)?;
        let result = client.instance_logout(instance);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to log out the instance."));
        }
        let message = str_at(&result, &["response", "message"]).unwrap_or("Instance logged out.");
        Ok(ActionResponse::success(200, message.to_string(), &result))
    })
}

pub fn restart_instance<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        let instance = path_instance(req)?;
        let result = client.instance_restart(instance);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to restart the instance."));
        }
        let name = str_at(&result, &["instance", "instanceName"]).unwrap_or(instance);
        let state = str_at(&result, &["instance", "state"]).unwrap_or("unknown");
        Ok(ActionResponse::success(
            200,
            format!("Instance '{name}' restarted. State: {state}."),
            &result,
        ))
    })
}

pub fn fetch_instances<T: Transport>(client: &EvolutionClient<T>, _req: &ActionRequest) -> ActionResponse {
    let result = client.fetch_instances();
    if !result.ok {
        return ActionResponse::failure(&result, "Failed to fetch the instance list.");
    }
    let count = result.json().and_then(Value::as_array).map_or(0, Vec::len);
    ActionResponse::success(200, format!("Fetched {count} instances."), &result)
}

pub fn delete_instance<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        let instance = path_instance(req)?;
        let result = client.instance_delete(instance);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to delete the instance."));
        }
        let message = str_at(&result, &["response", "message"])
            .map(str::to_string)
            .unwrap_or_else(|| format!("Instance '{instance}' deleted."));
        Ok(ActionResponse::success(200, message, &result))
    })
}

pub fn set_presence<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        require_post(req)?;
        let instance = path_instance(req)?;
        let presence = required_str(&req.body, "presence")
            .ok_or_else(|| bad_request("Missing required parameter: presence."))?;

        let result = client.instance_set_presence(instance, presence);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to set the instance presence."));
        }
        Ok(ActionResponse::success(
            200,
            format!("Presence of '{instance}' set to '{presence}'."),
            &result,
        ))
    })
}

/// Send `text` to `number`; every other body field is an advanced option.
pub fn send_text<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        require_post(req)?;
        let instance = path_instance(req)?;
        let (number, text) = match (required_str(&req.body, "number"), required_str(&req.body, "text")) {
            (Some(number), Some(text)) => (number, text),
            _ => return Err(bad_request("Missing required parameters: 'number' and 'text'.")),
        };

        let options = options_without(&req.body, &["number", "text"]);
        let result = client.send_text(instance, number, text, &options);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to send the text message."));
        }
        let jid = str_at(&result, &["key", "remoteJid"]).unwrap_or("unknown");
        Ok(ActionResponse::success(201, format!("Text message sent to '{jid}'."), &result))
    })
}

/// Post a status of `type` text, image or audio; every other body field is
/// an advanced option.
pub fn send_status<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> ActionResponse {
    run(|| {
        require_post(req)?;
        let instance = path_instance(req)?;
        let status_type = required_str(&req.body, "type").and_then(|t| t.parse::<StatusType>().ok());
        let (status_type, content) = match (status_type, required_str(&req.body, "content")) {
            (Some(t), Some(content)) => (t, content),
            _ => {
                let valid: Vec<&str> = StatusType::ALL.iter().map(StatusType::as_str).collect();
                return Err(bad_request(&format!(
                    "Missing required parameters ('type', 'content') or invalid 'type' (allowed: {}).",
                    valid.join(", ")
                )));
            }
        };

        let options = options_without(&req.body, &["type", "content"]);
        let result = client.send_status(instance, status_type, content, &options);
        if !result.ok {
            return Ok(ActionResponse::failure(&result, "Failed to send the status."));
        }
        Ok(ActionResponse::success(
            201,
            format!("Status of type '{status_type}' sent."),
            &result,
        ))
    })
}

fn run(action: impl FnOnce() -> Outcome) -> ActionResponse {
    action().unwrap_or_else(identity)
}

fn bad_request(error: &str) -> ActionResponse {
    debug!(error, "action rejected");
    ActionResponse::rejected(400, error)
}

fn require_post(req: &ActionRequest) -> Result<(), ActionResponse> {
    if req.method == HttpMethod::Post {
        return Ok(());
    }
    debug!(method = %req.method, "action rejected: method not allowed");
    Err(ActionResponse::rejected(405, "Method not allowed. Use POST."))
}

/// The instance key from the route; required and non-blank.
fn path_instance(req: &ActionRequest) -> Result<&str, ActionResponse> {
    match req.instance_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(bad_request("An instanceKey must be provided in the URL.")),
    }
}

/// The route instance key if present, else the configured default.
fn resolve_instance<T: Transport>(client: &EvolutionClient<T>, req: &ActionRequest) -> Result<String, ActionResponse> {
    let key = match req.instance_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => client.config().default_instance_key.trim(),
    };
    if key.is_empty() {
        return Err(bad_request("No instanceKey in the URL and no default instance configured."));
    }
    Ok(key.to_string())
}

/// Non-blank strings are taken trimmed and non-negative integers are
/// written out; anything else makes the whole list invalid.
fn phone_numbers(items: &[Value]) -> Option<Vec<String>> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => n.as_u64().map(|n| n.to_string()),
            _ => None,
        })
        .collect()
}

fn required_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn options_without(body: &Value, keys: &[&str]) -> Options {
    let map: Map<String, Value> = body
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    Options::from(map)
}

fn str_at<'a>(result: &'a ApiResult, path: &[&str]) -> Option<&'a str> {
    result.pointer(path).and_then(Value::as_str)
}

fn data_of(result: &ApiResult) -> Value {
    result
        .body
        .as_ref()
        .map_or(Value::Null, |body| body.to_value())
}
