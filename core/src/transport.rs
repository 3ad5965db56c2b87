//! The I/O seam between the client and the network.
//!
//! # Design
//! `EvolutionClient` is generic over `Transport`, so tests swap in
//! `MockTransport` and production uses `UreqTransport`. A transport only moves
//! bytes: it reports whatever status came back and leaves success rules to
//! `ApiResult`. 4xx/5xx responses are data, not errors.

use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder};

use crate::config::Config;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Largest response body read into memory.
pub const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Executes one HTTP round-trip.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// The agent applies the configured global timeout (zero means none) and only
/// skips TLS verification when `Config::accept_invalid_certs` is set.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(config: &Config) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(global_timeout(config))
            .tls_config(tls_config(config))
            .build()
            .new_agent();
        Self { agent }
    }
}

fn tls_config(config: &Config) -> TlsConfig {
    TlsConfig::builder()
        .disable_verification(config.accept_invalid_certs)
        .build()
}

fn global_timeout(config: &Config) -> Option<Duration> {
    (!config.timeout.is_zero()).then_some(config.timeout)
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();

        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(url), headers).call(),
            (HttpMethod::Post, Some(body)) => {
                with_headers(self.agent.post(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                with_headers(self.agent.put(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), headers).send_empty(),
        };

        let mut response = result.map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        // Bodies are bytes; the status alone decides success, so invalid
        // UTF-8 is replaced rather than failing the read.
        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| TransportError::Body {
                status,
                message: e.to_string(),
            })?;

        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ApiResult, ResponseBody};
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Serve one raw HTTP response on a local port and return its base URL.
    fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            stream.write_all(&response).unwrap();
        });
        format!("http://{addr}")
    }

    fn get(url: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn non_utf8_body_keeps_success_status() {
        let mut raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 4\r\nConnection: close\r\n\r\n".to_vec();
        raw.extend_from_slice(b"ok\xff\xfe");
        let base = serve_once(raw);

        let mut config = Config::new(&base, "k");
        config.timeout = Duration::from_secs(5);
        let transport = UreqTransport::new(&config);
        let response = transport.execute(&get(config.root_url("/instance/fetchInstances"))).unwrap();
        assert_eq!(response.status, 200);
        assert!(response.body.starts_with("ok"));

        let result = ApiResult::from_response(HttpMethod::Get, response);
        assert!(result.ok);
        assert_eq!(result.status_code, Some(200));
        assert!(result.transport_error.is_none());
        assert!(matches!(result.body, Some(ResponseBody::Text(_))));
    }

    #[test]
    fn tls_verification_follows_config() {
        assert!(!tls_config(&Config::default()).disable_verification());

        let mut config = Config::default();
        config.accept_invalid_certs = true;
        assert!(tls_config(&config).disable_verification());
    }

    #[test]
    fn zero_timeout_means_no_timeout() {
        let mut config = Config::default();
        assert_eq!(global_timeout(&config), Some(Duration::from_secs(60)));

        config.timeout = Duration::ZERO;
        assert_eq!(global_timeout(&config), None);
    }

    #[test]
    fn unreachable_host_is_a_request_error() {
        let mut config = Config::new("http://127.0.0.1:1", "k");
        config.timeout = Duration::from_secs(2);
        let transport = UreqTransport::new(&config);
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: config.root_url("/instance/fetchInstances"),
            headers: Vec::new(),
            body: None,
        };
        let err = transport.execute(&req).unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
        assert!(err.status().is_none());
    }

    #[test]
    fn malformed_url_is_a_request_error() {
        let transport = UreqTransport::new(&Config::default());
        let req = HttpRequest {
            method: HttpMethod::Delete,
            url: "not a url/instance/delete/x".to_string(),
            headers: Vec::new(),
            body: None,
        };
        assert!(matches!(transport.execute(&req), Err(TransportError::Request(_))));
    }
}
