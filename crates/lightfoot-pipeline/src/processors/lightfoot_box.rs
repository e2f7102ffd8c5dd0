//! Classifier for lightfoot boxes: kind-1 notes tagged `#lightfootbox`
//! with a `g` location tag.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::events::{has_tag, Event, KIND_TEXT_NOTE, TAG_TOPIC, TOPIC_LIGHTFOOT_BOX};
use crate::feature::{Availability, Feature, FeatureProperties};
use crate::processors::base::{extract_location, validate_event, EventProcessor};
use crate::verify::PubkeyVerifier;
use crate::Error;

/// Display text and availability pulled from a box note's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxDetails {
    pub availability: Availability,
    pub content: String,
}

/// Read box details from note content.
///
/// Content is either a JSON object with optional `availability` and
/// `content` members, or plain text. Anything that is not a JSON object is
/// plain text with public availability.
pub fn parse_box_content(raw: &str) -> BoxDetails {
    let mut details = BoxDetails {
        availability: Availability::Public,
        content: raw.to_string(),
    };

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(raw) {
        if let Some(availability) = fields
            .get("availability")
            .and_then(Value::as_str)
            .and_then(|value| value.parse().ok())
        {
            details.availability = availability;
        }
        if let Some(content) = fields
            .get("content")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
        {
            details.content = content.to_string();
        }
    }

    details.content = details.content.trim().to_string();
    details
}

pub struct LightfootBoxProcessor {
    verifier: Arc<dyn PubkeyVerifier>,
}

impl LightfootBoxProcessor {
    pub fn new(verifier: Arc<dyn PubkeyVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl EventProcessor for LightfootBoxProcessor {
    fn name(&self) -> &str {
        "lightfoot-box"
    }

    async fn process(&self, event: &Event) -> Result<Option<Feature>, Error> {
        let (kind, raw_content) = match (event.kind, event.content.as_deref()) {
            (Some(kind), Some(content)) if validate_event(event) => (kind, content),
            _ => {
                return Err(Error::InvalidEvent {
                    event_id: event.id_hint(),
                })
            }
        };

        if kind != KIND_TEXT_NOTE {
            trace!(event_id = %event.id, kind, "Skipping event: not a text note");
            return Ok(None);
        }
        if !has_tag(&event.tags, TAG_TOPIC, TOPIC_LIGHTFOOT_BOX) {
            trace!(event_id = %event.id, "Skipping event: no lightfoot box tag");
            return Ok(None);
        }

        let location = match extract_location(event) {
            Some(location) => location,
            None => {
                trace!(event_id = %event.id, "Skipping event: no usable location");
                return Ok(None);
            }
        };

        let details = parse_box_content(raw_content);
        let verified = self.verifier.is_verified(&event.pubkey);

        let properties = FeatureProperties {
            kind,
            id: event.id.clone(),
            pubkey: event.pubkey.clone(),
            time: event.created_at,
            content: details.content,
            geohash: location.geohash,
            coordinates: location.coordinates,
            tags: event.tags.clone(),
            availability: details.availability,
            verified,
            raw_event: event.clone(),
        };

        Ok(Some(Feature::point(location.coordinates, properties)))
    }
}
