//! Request payload assembly.
//!
//! Every message operation builds its body the same way: a per-operation map
//! of optional fields (all empty), overlaid with the caller's advanced
//! options, overlaid with the required fields. The merged map is then
//! normalized once, so an empty value anywhere in the merge is dropped.

use serde_json::{Map, Value};

/// A JSON object payload.
pub type Payload = Map<String, Value>;

/// Caller-supplied optional fields for an operation, e.g. `delay`,
/// `linkPreview` or `mentioned` for text messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options(Payload);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Payload {
        &self.0
    }

    pub fn into_map(self) -> Payload {
        self.0
    }
}

impl From<Payload> for Options {
    fn from(map: Payload) -> Self {
        Self(map)
    }
}

/// Optional fields an operation declares up front.
#[derive(Debug, Clone, Copy)]
pub struct OptionalFields {
    /// Fields defaulted to `null`.
    pub scalars: &'static [&'static str],
    /// Fields defaulted to `[]`.
    pub lists: &'static [&'static str],
}

impl OptionalFields {
    pub const NONE: OptionalFields = OptionalFields {
        scalars: &[],
        lists: &[],
    };

    fn defaults(&self) -> Payload {
        let mut map = Payload::new();
        for key in self.scalars {
            map.insert((*key).to_string(), Value::Null);
        }
        for key in self.lists {
            map.insert((*key).to_string(), Value::Array(Vec::new()));
        }
        map
    }
}

/// Merge `defaults <- options <- required` and normalize the result.
///
/// Required fields win on key collision.
pub fn build(fields: OptionalFields, options: &Options, required: Payload) -> Payload {
    let mut merged = fields.defaults();
    merged.extend(options.as_map().iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.extend(required);
    normalize(merged)
}

/// Drop every entry whose value is `null`, `[]`, or a string that is empty
/// after trimming. Everything else, including `false` and `0`, is kept.
pub fn normalize(payload: Payload) -> Payload {
    payload
        .into_iter()
        .filter(|(_, value)| !is_blank(value))
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => false,
    }
}
