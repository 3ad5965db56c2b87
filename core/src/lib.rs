//! Blocking client for the Evolution API WhatsApp gateway.
//!
//! # Overview
//! `EvolutionClient` turns each gateway operation (send text, media or
//! status; check numbers; create, connect, restart, log out or delete
//! instances) into one HTTP request and folds the outcome into an
//! `ApiResult`. Nothing in this crate returns an error or panics for a
//! failed call: transport failures, rejected statuses and non-JSON bodies
//! are all reported through the result value.
//!
//! # Design
//! - `Config` is an explicit value; there is no global configuration.
//! - Every instance-scoped operation takes its instance key as a parameter.
//! - Each operation has a pure `build_*` step producing an `HttpRequest`,
//!   executed by a pluggable `Transport` (`UreqTransport` in production,
//!   `MockTransport` in tests).
//! - Payloads are merged from defaults, caller options and required fields,
//!   then normalized to drop empty values (see `payload`).
//! - `actions` layers request validation and response shaping on top for
//!   HTTP controllers.

pub mod actions;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod payload;
pub mod transport;
pub mod types;

pub use actions::{ActionRequest, ActionResponse};
pub use client::EvolutionClient;
pub use config::{Config, ConfigOverrides};
pub use error::{extract_error_message, ConfigError, TransportError};
pub use http::{ApiResult, HttpMethod, HttpRequest, HttpResponse, ResponseBody};
pub use mock::MockTransport;
pub use payload::{Options, Payload};
pub use transport::{Transport, UreqTransport};
pub use types::{Media, StatusType, UnknownStatusType};
