//! Typed inputs for message operations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of WhatsApp status post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
    Text,
    Image,
    Audio,
}

impl StatusType {
    pub const ALL: [StatusType; 3] = [StatusType::Text, StatusType::Image, StatusType::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusType::Text => "text",
            StatusType::Image => "image",
            StatusType::Audio => "audio",
        }
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status type: {0}")]
pub struct UnknownStatusType(pub String);

impl FromStr for StatusType {
    type Err = UnknownStatusType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownStatusType(s.to_string()))
    }
}

/// A media message: `media` is a URL or base64 payload the gateway fetches
/// or decodes. `caption` defaults to empty, which is dropped from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub number: String,
    /// `image`, `video`, `audio` or `document`.
    pub mediatype: String,
    pub mimetype: String,
    pub media: String,
    pub file_name: String,
    pub caption: String,
}

impl Media {
    pub fn new(number: &str, mediatype: &str, mimetype: &str, media: &str, file_name: &str) -> Self {
        Self {
            number: number.to_string(),
            mediatype: mediatype.to_string(),
            mimetype: mimetype.to_string(),
            media: media.to_string(),
            file_name: file_name.to_string(),
            caption: String::new(),
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = caption.to_string();
        self
    }
}
