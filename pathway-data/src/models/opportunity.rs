//! Opportunity aggregate and its child records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// A posted opportunity with its tags and attached media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    /// Auto-increment row id, used for key-based pagination. Zero before insert.
    #[serde(default)]
    pub id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub description: String,
    pub points: i64,
    pub location: String,
    pub opportunity_type: String,
    #[serde(rename = "postedByUUID")]
    pub posted_by: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tags: Vec<Tag>,
    pub media: Vec<Media>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    #[serde(rename = "tagName")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "type")]
    pub kind: MediaType,
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MediaType {
    Image,
    Video,
    Text,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Text => "Text",
        }
    }
}

impl FromStr for MediaType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Image" => Ok(Self::Image),
            "Video" => Ok(Self::Video),
            "Text" => Ok(Self::Text),
            other => Err(ValidationError::InvalidVariant {
                field: "media type",
                value: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for MediaType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MediaType> for String {
    fn from(value: MediaType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
