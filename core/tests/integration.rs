//! Full gateway lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every client
//! operation over real HTTP through `UreqTransport`. Validates that request
//! building, header handling, payload normalization and result shaping work
//! end-to-end.

use std::time::Duration;

use evolution_core::{
    actions, ActionRequest, Config, EvolutionClient, HttpMethod, Media, Options, ResponseBody, StatusType,
};
use mock_server::AppState;
use serde_json::{json, Value};

const API_KEY: &str = "integration-key";

fn start_server() -> (String, AppState) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = AppState::new(API_KEY);
    let server_state = state.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, server_state).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), state)
}

fn client(api_url: &str, api_key: &str) -> EvolutionClient {
    let mut config = Config::new(api_url, api_key);
    config.timeout = Duration::from_secs(10);
    EvolutionClient::new(config)
}

#[test]
fn gateway_lifecycle() {
    let (url, state) = start_server();
    let client = client(&url, API_KEY);

    // Step 1: no instances yet.
    let result = client.fetch_instances();
    assert!(result.ok);
    assert_eq!(result.json(), Some(&json!([])));

    // Step 2: create an instance (POST answers 201).
    let result = client.create_instance("Sales", "sales", &Options::new().with("qrcode", true));
    assert!(result.ok, "{result:?}");
    assert_eq!(result.status_code, Some(201));
    assert_eq!(result.pointer(&["instance", "instanceKey"]), Some(&json!("sales")));

    // Step 3: state starts closed.
    let result = client.connection_state("sales");
    assert!(result.ok);
    assert_eq!(result.pointer(&["instance", "state"]), Some(&json!("close")));

    // Step 4: connect.
    let result = client.instance_connect("sales");
    assert!(result.ok);
    assert!(result.pointer(&["pairingCode"]).is_some());

    // Step 5: send a text; empty options are dropped before sending.
    let options = Options::new()
        .with("delay", 0)
        .with("linkPreview", false)
        .with("quoted", Value::Null)
        .with("mentioned", json!([]));
    let result = client.send_text("sales", "5531999999999", "hello", &options);
    assert!(result.ok, "{result:?}");
    assert_eq!(
        result.pointer(&["key", "remoteJid"]),
        Some(&json!("5531999999999@s.whatsapp.net"))
    );

    // Step 6: send media with the default empty caption.
    let media = Media::new(
        "5531999999999",
        "document",
        "application/pdf",
        "https://files.example/r.pdf",
        "r.pdf",
    );
    assert!(client.send_media("sales", &media, &Options::new()).ok);

    // Step 7: post a status.
    let result = client.send_status(
        "sales",
        StatusType::Text,
        "out of office",
        &Options::new().with("allContacts", true),
    );
    assert!(result.ok);

    // Step 8: check numbers.
    let result = client.check_is_whatsapp("sales", &["5531999999999", "42"]);
    assert!(result.ok);
    let answers = result.json().and_then(Value::as_array).unwrap();
    assert_eq!(answers[0]["exists"], true);
    assert_eq!(answers[1]["exists"], false);

    // Step 9: presence.
    assert!(client.instance_set_presence("sales", "composing").ok);

    // Step 10: logout, then restart (PUT answers 200).
    assert!(client.instance_logout("sales").ok);
    let result = client.instance_restart("sales");
    assert!(result.ok);
    assert_eq!(result.pointer(&["instance", "state"]), Some(&json!("open")));

    // Step 11: delete, then the instance is gone.
    assert!(client.instance_delete("sales").ok);
    let result = client.connection_state("sales");
    assert!(!result.ok);
    assert_eq!(result.status_code, Some(404));

    // The gateway saw normalized payloads.
    let gateway = state.gateway.blocking_read();
    assert_eq!(gateway.outbox.len(), 3);
    assert_eq!(
        gateway.outbox[0].payload,
        json!({"number": "5531999999999", "text": "hello", "delay": 0, "linkPreview": false})
    );
    assert!(gateway.outbox[1].payload.get("caption").is_none());
    assert_eq!(gateway.outbox[2].payload["type"], "text");
}

#[test]
fn wrong_api_key_is_reported_not_raised() {
    let (url, _state) = start_server();
    let client = client(&url, "wrong-key");

    let result = client.fetch_instances();
    assert!(!result.ok);
    assert_eq!(result.status_code, Some(401));
    assert!(result.transport_error.is_none());
    assert!(matches!(result.body, Some(ResponseBody::Json(_))));
}

#[test]
fn unknown_instance_error_is_relayed_by_actions() {
    let (url, _state) = start_server();
    let client = client(&url, API_KEY);

    let req = ActionRequest::new(HttpMethod::Post, json!({"number": "5531999999999", "text": "hi"}))
        .with_instance("ghost");
    let resp = actions::send_text(&client, &req);
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body["ok"], false);
    assert_eq!(resp.body["error"], "API Error: Not Found");
    assert_eq!(
        resp.body["api_response"]["response"]["message"][0],
        "The \"ghost\" instance does not exist"
    );
}

#[test]
fn connection_refused_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{addr}"), API_KEY);
    let result = client.instance_restart("sales");
    assert!(!result.ok);
    assert!(result.status_code.is_none());
    assert!(result.body.is_none());
    assert!(result.transport_error.is_some());
}

#[test]
fn instance_names_with_spaces_reach_the_gateway() {
    let (url, _state) = start_server();
    let client = client(&url, API_KEY);

    assert!(client.create_instance("My Bot", "My Bot", &Options::new()).ok);
    let result = client.connection_state("My Bot");
    assert!(result.ok, "{result:?}");
    assert_eq!(result.pointer(&["instance", "instanceName"]), Some(&json!("My Bot")));
}
