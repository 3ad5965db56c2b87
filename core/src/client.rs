//! Request builders and executors for every Evolution API operation.
//!
//! # Design
//! Each operation is split in two: a `build_*` method that produces a plain
//! `HttpRequest` without touching the network, and a method of the same name
//! without the prefix that runs the request through the client's `Transport`
//! and returns the normalized `ApiResult`. Instance-scoped operations always
//! take the instance key explicitly; `Config::default_instance_key` is only a
//! convenience for callers that want it.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::http::{ApiResult, HttpMethod, HttpRequest};
use crate::payload::{self, OptionalFields, Options, Payload};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Media, StatusType};

const MESSAGE_FIELDS: OptionalFields = OptionalFields {
    scalars: &["delay", "linkPreview", "mentionsEveryOne", "quoted"],
    lists: &["mentioned"],
};

const STATUS_FIELDS: OptionalFields = OptionalFields {
    scalars: &["caption", "backgroundColor", "font", "allContacts"],
    lists: &["statusJidList"],
};

const CREATE_INSTANCE_FIELDS: OptionalFields = OptionalFields {
    scalars: &["token", "number", "qrcode", "integration"],
    lists: &[],
};

/// Blocking client for the Evolution API.
#[derive(Debug, Clone)]
pub struct EvolutionClient<T = UreqTransport> {
    config: Config,
    transport: T,
}

impl EvolutionClient<UreqTransport> {
    /// Client backed by a `ureq` transport built from `config`.
    pub fn new(config: Config) -> Self {
        let transport = UreqTransport::new(&config);
        Self { config, transport }
    }
}

impl<T: Transport> EvolutionClient<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub fn build_send_text(&self, instance: &str, number: &str, text: &str, options: &Options) -> HttpRequest {
        let body = payload::build(
            MESSAGE_FIELDS,
            options,
            fields(json!({"number": number, "text": text})),
        );
        self.post(self.config.endpoint_url("/message/sendText", instance), body)
    }

    pub fn send_text(&self, instance: &str, number: &str, text: &str, options: &Options) -> ApiResult {
        self.execute(self.build_send_text(instance, number, text, options))
    }

    pub fn build_send_status(
        &self,
        instance: &str,
        status_type: StatusType,
        content: &str,
        options: &Options,
    ) -> HttpRequest {
        let body = payload::build(
            STATUS_FIELDS,
            options,
            fields(json!({"type": status_type.as_str(), "content": content})),
        );
        self.post(self.config.endpoint_url("/message/sendStatus", instance), body)
    }

    pub fn send_status(
        &self,
        instance: &str,
        status_type: StatusType,
        content: &str,
        options: &Options,
    ) -> ApiResult {
        self.execute(self.build_send_status(instance, status_type, content, options))
    }

    pub fn build_send_media(&self, instance: &str, media: &Media, options: &Options) -> HttpRequest {
        let body = payload::build(
            MESSAGE_FIELDS,
            options,
            fields(json!({
                "number": media.number,
                "mediatype": media.mediatype,
                "mimetype": media.mimetype,
                "caption": media.caption,
                "media": media.media,
                "fileName": media.file_name,
            })),
        );
        self.post(self.config.endpoint_url("/message/sendMedia", instance), body)
    }

    pub fn send_media(&self, instance: &str, media: &Media, options: &Options) -> ApiResult {
        self.execute(self.build_send_media(instance, media, options))
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    pub fn build_check_is_whatsapp<S: AsRef<str>>(&self, instance: &str, numbers: &[S]) -> HttpRequest {
        let numbers: Vec<&str> = numbers.iter().map(|n| n.as_ref()).collect();
        let body = payload::normalize(fields(json!({"numbers": numbers})));
        self.post(self.config.endpoint_url("/chat/whatsappNumbers", instance), body)
    }

    /// Ask the gateway which of `numbers` are registered on WhatsApp.
    ///
    /// Callers are expected to reject an empty list before calling.
    pub fn check_is_whatsapp<S: AsRef<str>>(&self, instance: &str, numbers: &[S]) -> ApiResult {
        self.execute(self.build_check_is_whatsapp(instance, numbers))
    }

    // -----------------------------------------------------------------------
    // Instances
    // -----------------------------------------------------------------------

    pub fn build_connection_state(&self, instance: &str) -> HttpRequest {
        self.bodiless(HttpMethod::Get, self.config.endpoint_url("/instance/connectionState", instance))
    }

    pub fn connection_state(&self, instance: &str) -> ApiResult {
        self.execute(self.build_connection_state(instance))
    }

    pub fn build_create_instance(&self, instance_name: &str, instance_key: &str, options: &Options) -> HttpRequest {
        let body = payload::build(
            CREATE_INSTANCE_FIELDS,
            options,
            fields(json!({"instanceName": instance_name, "instanceKey": instance_key})),
        );
        self.post(self.config.root_url("/instance/create"), body)
    }

    pub fn create_instance(&self, instance_name: &str, instance_key: &str, options: &Options) -> ApiResult {
        self.execute(self.build_create_instance(instance_name, instance_key, options))
    }

    pub fn build_fetch_instances(&self) -> HttpRequest {
        self.bodiless(HttpMethod::Get, self.config.root_url("/instance/fetchInstances"))
    }

    pub fn fetch_instances(&self) -> ApiResult {
        self.execute(self.build_fetch_instances())
    }

    pub fn build_instance_connect(&self, instance: &str) -> HttpRequest {
        self.bodiless(HttpMethod::Get, self.config.endpoint_url("/instance/connect", instance))
    }

    /// Start pairing; the body carries the QR code or pairing code.
    pub fn instance_connect(&self, instance: &str) -> ApiResult {
        self.execute(self.build_instance_connect(instance))
    }

    pub fn build_instance_logout(&self, instance: &str) -> HttpRequest {
        self.bodiless(HttpMethod::Delete, self.config.endpoint_url("/instance/logout", instance))
    }

    pub fn instance_logout(&self, instance: &str) -> ApiResult {
        self.execute(self.build_instance_logout(instance))
    }

    pub fn build_instance_delete(&self, instance: &str) -> HttpRequest {
        self.bodiless(HttpMethod::Delete, self.config.endpoint_url("/instance/delete", instance))
    }

    pub fn instance_delete(&self, instance: &str) -> ApiResult {
        self.execute(self.build_instance_delete(instance))
    }

    pub fn build_instance_set_presence(&self, instance: &str, presence: &str) -> HttpRequest {
        let body = payload::normalize(fields(json!({"presence": presence})));
        self.post(self.config.endpoint_url("/instance/setPresence", instance), body)
    }

    pub fn instance_set_presence(&self, instance: &str, presence: &str) -> ApiResult {
        self.execute(self.build_instance_set_presence(instance, presence))
    }

    pub fn build_instance_restart(&self, instance: &str) -> HttpRequest {
        self.bodiless(HttpMethod::Put, self.config.endpoint_url("/instance/restart", instance))
    }

    pub fn instance_restart(&self, instance: &str) -> ApiResult {
        self.execute(self.build_instance_restart(instance))
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    /// Run `request` through the transport. Exactly one attempt.
    pub fn execute(&self, request: HttpRequest) -> ApiResult {
        debug!(method = %request.method, url = %request.url, "evolution request");
        let result = match self.transport.execute(&request) {
            Ok(response) => ApiResult::from_response(request.method, response),
            Err(err) => {
                warn!(method = %request.method, url = %request.url, error = %err, "evolution transport failure");
                return ApiResult::from_transport_error(&err);
            }
        };
        if !result.ok {
            warn!(
                method = %request.method,
                url = %request.url,
                status = ?result.status_code,
                "evolution request rejected"
            );
        }
        result
    }

    fn post(&self, url: String, body: Payload) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("apikey".to_string(), self.config.api_key.clone()),
            ],
            body: Some(Value::Object(body).to_string()),
        }
    }

    fn bodiless(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: vec![("apikey".to_string(), self.config.api_key.clone())],
            body: None,
        }
    }
}

fn fields(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}
