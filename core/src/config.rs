//! Gateway connection settings.
//!
//! `Config` is a plain value: build it once (from the environment or by
//! hand), optionally apply a `ConfigOverrides`, and hand it to
//! `EvolutionClient::new`. Nothing here is global.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const ENV_API_URL: &str = "EVOLUTION_API_URL";
const ENV_API_TOKEN: &str = "EVOLUTION_API_TOKEN";
const ENV_API_KEY: &str = "EVOLUTION_API_KEY";
const ENV_INSTANCE_KEY: &str = "EVOLUTION_INSTANCE_KEY";
const ENV_TIMEOUT_SECS: &str = "EVOLUTION_TIMEOUT_SECS";
const ENV_ACCEPT_INVALID_CERTS: &str = "EVOLUTION_ACCEPT_INVALID_CERTS";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub api_token: String,
    /// Sent as the `apikey` header on every request.
    pub api_key: String,
    /// Instance used by callers that do not name one explicitly.
    pub default_instance_key: String,
    /// Whole-request timeout. Zero disables it.
    pub timeout: Duration,
    /// Skip TLS certificate and hostname verification. Off unless asked for.
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: String::new(),
            api_key: String::new(),
            default_instance_key: String::new(),
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }
}

/// Partial configuration. Only the fields that are `Some` are applied by
/// `Config::load`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub api_key: Option<String>,
    pub instance_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub accept_invalid_certs: Option<bool>,
}

impl Config {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            ..Self::default()
        }
    }

    /// Read settings from `EVOLUTION_*` environment variables on top of the
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        let accept_invalid_certs = match lookup(ENV_ACCEPT_INVALID_CERTS) {
            Some(raw) => Some(parse_bool(ENV_ACCEPT_INVALID_CERTS, &raw)?),
            None => None,
        };

        let mut config = Self::default();
        config.load(&ConfigOverrides {
            api_url: lookup(ENV_API_URL),
            api_token: lookup(ENV_API_TOKEN),
            api_key: lookup(ENV_API_KEY),
            instance_key: lookup(ENV_INSTANCE_KEY),
            timeout_secs,
            accept_invalid_certs,
        });
        Ok(config)
    }

    /// Apply every field present in `overrides`, leaving the rest untouched.
    pub fn load(&mut self, overrides: &ConfigOverrides) {
        if let Some(api_url) = &overrides.api_url {
            self.api_url = api_url.clone();
        }
        if let Some(api_token) = &overrides.api_token {
            self.api_token = api_token.clone();
        }
        if let Some(api_key) = &overrides.api_key {
            self.api_key = api_key.clone();
        }
        if let Some(instance_key) = &overrides.instance_key {
            self.default_instance_key = instance_key.clone();
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = overrides.accept_invalid_certs {
            self.accept_invalid_certs = flag;
        }
    }

    /// `api_url + endpoint`, for endpoints without an instance segment.
    pub fn root_url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.api_url.trim_end_matches('/'))
    }

    /// `api_url + endpoint + "/" + instance`, with the instance
    /// percent-encoded as a single path segment.
    pub fn endpoint_url(&self, endpoint: &str, instance: &str) -> String {
        format!("{}/{}", self.root_url(endpoint), urlencoding::encode(instance))
    }

    /// `endpoint_url` for the configured default instance.
    pub fn base_url(&self, endpoint: &str) -> String {
        self.endpoint_url(endpoint, &self.default_instance_key)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn base_url_appends_endpoint_and_instance() {
        let mut config = Config::new("http://h", "k");
        config.default_instance_key = "foo".to_string();
        assert_eq!(config.base_url("/message/sendText"), "http://h/message/sendText/foo");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = Config::new("http://h/", "k");
        assert_eq!(config.root_url("/instance/create"), "http://h/instance/create");
        assert_eq!(
            config.endpoint_url("/instance/connect", "bar"),
            "http://h/instance/connect/bar"
        );
    }

    #[test]
    fn instance_segment_is_percent_encoded() {
        let config = Config::new("http://h", "k");
        assert_eq!(
            config.endpoint_url("/instance/connectionState", "My Bot"),
            "http://h/instance/connectionState/My%20Bot"
        );
        assert_eq!(config.endpoint_url("/instance/delete", "a/b"), "http://h/instance/delete/a%2Fb");
    }

    #[test]
    fn defaults_are_secure_and_credential_free() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.api_key.is_empty());
        assert!(config.api_token.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn load_applies_only_present_keys() {
        let mut config = Config::new("http://h", "key-1");
        config.default_instance_key = "main".to_string();

        let overrides: ConfigOverrides =
            serde_json::from_str(r#"{"api_key":"key-2","timeout_secs":5}"#).unwrap();
        config.load(&overrides);

        assert_eq!(config.api_url, "http://h");
        assert_eq!(config.api_key, "key-2");
        assert_eq!(config.default_instance_key, "main");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn from_lookup_reads_all_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("EVOLUTION_API_URL", "https://gw.example"),
            ("EVOLUTION_API_TOKEN", "tok"),
            ("EVOLUTION_API_KEY", "key"),
            ("EVOLUTION_INSTANCE_KEY", "sales"),
            ("EVOLUTION_TIMEOUT_SECS", "15"),
            ("EVOLUTION_ACCEPT_INVALID_CERTS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://gw.example");
        assert_eq!(config.api_token, "tok");
        assert_eq!(config.api_key, "key");
        assert_eq!(config.default_instance_key, "sales");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn from_lookup_falls_back_to_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn from_lookup_rejects_bad_timeout() {
        let err = Config::from_lookup(lookup_from(&[("EVOLUTION_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("EVOLUTION_TIMEOUT_SECS"));
    }

    #[test]
    fn from_lookup_rejects_bad_bool() {
        let err = Config::from_lookup(lookup_from(&[("EVOLUTION_ACCEPT_INVALID_CERTS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
