use nostr_sdk::prelude::Event as SdkEvent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::Error;

/// Short text note, the kind lightfoot boxes are published as.
pub const KIND_TEXT_NOTE: i64 = 1;

pub const TAG_TOPIC: &str = "t";
pub const TAG_GEOHASH: &str = "g";
pub const TAG_LOCATION: &str = "location";

/// Topic value marking a note as a lightfoot box.
pub const TOPIC_LIGHTFOOT_BOX: &str = "#lightfootbox";
/// Topic shared by every lightfoot note.
pub const TOPIC_LIGHTFOOT: &str = "lightfoot";

/// A single event tag: a discriminator followed by its values.
///
/// Serialized as a plain JSON array, e.g. `["g", "u33dc"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub Vec<String>);

impl Tag {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn name(&self) -> Option<&str> {
        self.0.first().map(|s| s.as_str())
    }

    /// First value after the discriminator.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(|s| s.as_str())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// An event record as received from a relay or a fixture file.
///
/// Members that are missing or of the wrong JSON type deserialize to their
/// empty value, so loosely-typed input is represented and then rejected by
/// validation instead of at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<i64>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub pubkey: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub created_at: u64,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub tags: Vec<Tag>,
}

/// `Some` when the member has the expected shape, `None` otherwise.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

impl Event {
    pub fn new(
        kind: i64,
        id: impl Into<String>,
        pubkey: impl Into<String>,
        created_at: u64,
        content: impl Into<String>,
        tags: Vec<Tag>,
    ) -> Self {
        Self {
            kind: Some(kind),
            id: id.into(),
            pubkey: pubkey.into(),
            created_at,
            content: Some(content.into()),
            tags,
        }
    }

    pub fn from_sdk_event(event: &SdkEvent) -> Self {
        let tags = event
            .tags
            .iter()
            .map(|tag| Tag(tag.clone().to_vec()))
            .collect();

        Self {
            kind: Some(i64::from(event.kind.as_u16())),
            id: event.id.to_string(),
            pubkey: event.pubkey.to_string(),
            created_at: event.created_at.as_secs(),
            content: Some(event.content.clone()),
            tags,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read one record from an already-parsed JSON value.
    ///
    /// Anything that is not a JSON object becomes an empty record, which
    /// classifiers reject as an invalid event.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Parse either a JSON array of events or newline-delimited JSON.
    ///
    /// Records are read one by one: a malformed record yields a record that
    /// fails validation rather than failing the whole batch. Only an array
    /// that is not valid JSON is an error.
    pub fn parse_many(input: &str) -> Result<Vec<Self>, Error> {
        let trimmed = input.trim_start();
        if trimmed.starts_with('[') {
            let records: Vec<Value> = serde_json::from_str(trimmed)?;
            return Ok(records.into_iter().map(Self::from_value).collect());
        }
        let events = input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| match serde_json::from_str::<Value>(line) {
                Ok(value) => Self::from_value(value),
                Err(err) => {
                    warn!(line = index + 1, error = %err, "Unreadable event line");
                    Self::default()
                }
            })
            .collect();
        Ok(events)
    }

    /// Event id for error reporting, `None` when the record carries none.
    pub fn id_hint(&self) -> Option<String> {
        if self.id.is_empty() {
            None
        } else {
            Some(self.id.clone())
        }
    }
}

pub fn tag_value<'a>(tags: &'a [Tag], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.name() == Some(name))
        .and_then(Tag::value)
}

pub fn has_tag(tags: &[Tag], name: &str, value: &str) -> bool {
    tags.iter()
        .any(|tag| tag.name() == Some(name) && tag.value() == Some(value))
}

pub fn g_tag(value: &str) -> Tag {
    Tag::new([TAG_GEOHASH, value])
}

pub fn t_tag(value: &str) -> Tag {
    Tag::new([TAG_TOPIC, value])
}
