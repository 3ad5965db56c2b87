use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

const PRESENCES: [&str; 5] = ["available", "unavailable", "composing", "recording", "paused"];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_name: String,
    pub instance_key: String,
    pub instance_id: Uuid,
    /// `close`, `connecting` or `open`.
    pub state: String,
}

/// A message payload accepted by one of the `/message/*` endpoints.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SentMessage {
    pub endpoint: String,
    pub instance: String,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct Gateway {
    pub instances: HashMap<String, Instance>,
    pub outbox: Vec<SentMessage>,
}

#[derive(Clone)]
pub struct AppState {
    pub api_key: Arc<String>,
    pub gateway: Arc<RwLock<Gateway>>,
}

impl AppState {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: Arc::new(api_key.to_string()),
            gateway: Arc::new(RwLock::new(Gateway::default())),
        }
    }
}

/// Error in the gateway's `{status, error, response: {message: [...]}}` shape.
#[derive(Debug)]
pub struct GatewayError {
    status: StatusCode,
    messages: Vec<String>,
}

impl GatewayError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            messages: vec![message.into()],
        }
    }

    fn missing_instance(instance: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("The \"{instance}\" instance does not exist"),
        )
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": self.status.as_u16(),
            "error": self.status.canonical_reason().unwrap_or("Error"),
            "response": {"message": self.messages},
        });
        (self.status, Json(body)).into_response()
    }
}

type GatewayResult<T> = Result<T, GatewayError>;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/message/sendText/{instance}", post(send_text))
        .route("/message/sendStatus/{instance}", post(send_status))
        .route("/message/sendMedia/{instance}", post(send_media))
        .route("/chat/whatsappNumbers/{instance}", post(whatsapp_numbers))
        .route("/instance/create", post(create_instance))
        .route("/instance/fetchInstances", get(fetch_instances))
        .route("/instance/connectionState/{instance}", get(connection_state))
        .route("/instance/connect/{instance}", get(connect))
        .route("/instance/logout/{instance}", delete(logout))
        .route("/instance/delete/{instance}", delete(delete_instance))
        .route("/instance/setPresence/{instance}", post(set_presence))
        .route("/instance/restart/{instance}", put(restart))
        .layer(middleware::from_fn_with_state(state.clone(), require_apikey))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn require_apikey(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let supplied = request
        .headers()
        .get("apikey")
        .and_then(|v| v.to_str().ok());
    if supplied != Some(state.api_key.as_str()) {
        tracing::warn!(path = %request.uri().path(), "rejected request without a valid apikey");
        return GatewayError::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(request).await
}

fn required<'a>(payload: &'a Value, keys: &[&str]) -> GatewayResult<Vec<&'a str>> {
    let mut values = Vec::with_capacity(keys.len());
    let mut missing = Vec::new();
    for key in keys {
        match payload.get(*key).and_then(Value::as_str) {
            Some(v) if !v.trim().is_empty() => values.push(v),
            _ => missing.push(format!("{key} is required")),
        }
    }
    if !missing.is_empty() {
        return Err(GatewayError {
            status: StatusCode::BAD_REQUEST,
            messages: missing,
        });
    }
    Ok(values)
}

fn message_key(remote_jid: &str) -> Value {
    json!({
        "remoteJid": remote_jid,
        "fromMe": true,
        "id": Uuid::new_v4().simple().to_string().to_uppercase(),
    })
}

async fn record(state: &AppState, endpoint: &str, instance: &str, payload: Value) -> GatewayResult<()> {
    let mut gateway = state.gateway.write().await;
    if !gateway.instances.contains_key(instance) {
        return Err(GatewayError::missing_instance(instance));
    }
    gateway.outbox.push(SentMessage {
        endpoint: endpoint.to_string(),
        instance: instance.to_string(),
        payload,
    });
    Ok(())
}

async fn send_text(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    Json(payload): Json<Value>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    let fields = required(&payload, &["number", "text"])?;
    let (number, text) = (fields[0].to_string(), fields[1].to_string());
    record(&state, "sendText", &instance, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "key": message_key(&format!("{number}@s.whatsapp.net")),
            "message": {"conversation": text},
            "status": "PENDING",
        })),
    ))
}

async fn send_status(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    Json(payload): Json<Value>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    let fields = required(&payload, &["type", "content"])?;
    if !["text", "image", "audio"].contains(&fields[0]) {
        return Err(GatewayError::new(StatusCode::BAD_REQUEST, "type must be text, image or audio"));
    }
    record(&state, "sendStatus", &instance, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"key": message_key("status@broadcast"), "status": "PENDING"})),
    ))
}

async fn send_media(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    Json(payload): Json<Value>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    let fields = required(&payload, &["number", "mediatype", "media"])?;
    let number = fields[0].to_string();
    record(&state, "sendMedia", &instance, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "key": message_key(&format!("{number}@s.whatsapp.net")),
            "status": "PENDING",
        })),
    ))
}

/// A number "exists" when it is all digits and at least ten long.
async fn whatsapp_numbers(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    Json(payload): Json<Value>,
) -> GatewayResult<Json<Value>> {
    if !state.gateway.read().await.instances.contains_key(&instance) {
        return Err(GatewayError::missing_instance(&instance));
    }
    let numbers = match payload.get("numbers").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items.clone(),
        _ => return Err(GatewayError::new(StatusCode::BAD_REQUEST, "numbers is required")),
    };
    let answers: Vec<Value> = numbers
        .iter()
        .filter_map(Value::as_str)
        .map(|number| {
            let exists = number.len() >= 10 && number.chars().all(|c| c.is_ascii_digit());
            json!({"exists": exists, "jid": format!("{number}@s.whatsapp.net"), "number": number})
        })
        .collect();
    Ok(Json(Value::Array(answers)))
}

async fn create_instance(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    let fields = required(&payload, &["instanceName"])?;
    let name = fields[0].to_string();
    let key = payload
        .get("instanceKey")
        .and_then(Value::as_str)
        .unwrap_or(name.as_str())
        .to_string();

    let mut gateway = state.gateway.write().await;
    if gateway.instances.contains_key(&key) {
        return Err(GatewayError::new(
            StatusCode::FORBIDDEN,
            format!("This name \"{key}\" is already in use."),
        ));
    }
    let instance = Instance {
        instance_name: name,
        instance_key: key.clone(),
        instance_id: Uuid::new_v4(),
        state: "close".to_string(),
    };
    gateway.instances.insert(key, instance.clone());
    tracing::info!(instance = %instance.instance_key, "instance created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "instance": {
                "instanceName": instance.instance_name,
                "instanceKey": instance.instance_key,
                "instanceId": instance.instance_id,
                "status": "created",
            },
            "qrcode": payload.get("qrcode").cloned().unwrap_or(Value::Bool(false)),
        })),
    ))
}

async fn fetch_instances(State(state): State<AppState>) -> Json<Vec<Instance>> {
    let gateway = state.gateway.read().await;
    let mut instances: Vec<Instance> = gateway.instances.values().cloned().collect();
    instances.sort_by(|a, b| a.instance_key.cmp(&b.instance_key));
    Json(instances)
}

async fn connection_state(
    State(state): State<AppState>,
    Path(instance): Path<String>,
) -> GatewayResult<Json<Value>> {
    let gateway = state.gateway.read().await;
    let found = gateway
        .instances
        .get(&instance)
        .ok_or_else(|| GatewayError::missing_instance(&instance))?;
    Ok(Json(json!({
        "instance": {"instanceName": found.instance_name, "state": found.state}
    })))
}

/// Pairing succeeds immediately: the instance goes straight to `open`.
async fn connect(
    State(state): State<AppState>,
    Path(instance): Path<String>,
) -> GatewayResult<Json<Value>> {
    let mut gateway = state.gateway.write().await;
    let found = gateway
        .instances
        .get_mut(&instance)
        .ok_or_else(|| GatewayError::missing_instance(&instance))?;
    found.state = "open".to_string();
    Ok(Json(json!({
        "pairingCode": "WZYEH1YY",
        "code": format!("2@{}", found.instance_id.simple()),
        "count": 1,
    })))
}

async fn logout(
    State(state): State<AppState>,
    Path(instance): Path<String>,
) -> GatewayResult<Json<Value>> {
    let mut gateway = state.gateway.write().await;
    let found = gateway
        .instances
        .get_mut(&instance)
        .ok_or_else(|| GatewayError::missing_instance(&instance))?;
    if found.state != "open" {
        return Err(GatewayError::new(
            StatusCode::BAD_REQUEST,
            format!("The \"{instance}\" instance is not connected"),
        ));
    }
    found.state = "close".to_string();
    Ok(Json(json!({
        "status": "SUCCESS",
        "error": false,
        "response": {"message": "Instance logged out"},
    })))
}

async fn delete_instance(
    State(state): State<AppState>,
    Path(instance): Path<String>,
) -> GatewayResult<Json<Value>> {
    let mut gateway = state.gateway.write().await;
    gateway
        .instances
        .remove(&instance)
        .ok_or_else(|| GatewayError::missing_instance(&instance))?;
    Ok(Json(json!({
        "status": "SUCCESS",
        "error": false,
        "response": {"message": "Instance deleted"},
    })))
}

async fn set_presence(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    Json(payload): Json<Value>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    if !state.gateway.read().await.instances.contains_key(&instance) {
        return Err(GatewayError::missing_instance(&instance));
    }
    let fields = required(&payload, &["presence"])?;
    if !PRESENCES.contains(&fields[0]) {
        return Err(GatewayError::new(
            StatusCode::BAD_REQUEST,
            format!("presence must be one of: {}", PRESENCES.join(", ")),
        ));
    }
    Ok((StatusCode::CREATED, Json(json!({"presence": fields[0]}))))
}

async fn restart(
    State(state): State<AppState>,
    Path(instance): Path<String>,
) -> GatewayResult<Json<Value>> {
    let mut gateway = state.gateway.write().await;
    let found = gateway
        .instances
        .get_mut(&instance)
        .ok_or_else(|| GatewayError::missing_instance(&instance))?;
    found.state = "open".to_string();
    Ok(Json(json!({
        "instance": {"instanceName": found.instance_name, "state": found.state}
    })))
}
