//! Classifier contract and the validation/location logic shared by every
//! classifier.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::trace;

use crate::events::{Event, TAG_GEOHASH};
use crate::feature::Feature;
use crate::geohash;
use crate::Error;

/// Turns one event into zero or one feature.
///
/// `Ok(None)` means the event is not a point of interest. Errors are
/// reserved for malformed input and always reach the caller.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, event: &Event) -> Result<Option<Feature>, Error>;
}

/// Where an event is located.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],
    /// Source geohash; `None` when the tag held an explicit `lat,lon` pair.
    pub geohash: Option<String>,
}

/// True when the record has both a kind and a content member.
pub fn validate_event(event: &Event) -> bool {
    event.kind.is_some() && event.content.is_some()
}

fn lat_lng_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(-?[0-9]+(\.[0-9]+)?),\s*(-?[0-9]+(\.[0-9]+)?)$").ok())
        .as_ref()
}

/// Longest non-empty `g` tag value; the first one wins on equal length.
fn longest_g_value(event: &Event) -> Option<&str> {
    event
        .tags
        .iter()
        .filter(|tag| tag.name() == Some(TAG_GEOHASH))
        .filter_map(|tag| tag.value())
        .filter(|value| !value.is_empty())
        .fold(None, |longest: Option<&str>, value| match longest {
            Some(current) if value.len() <= current.len() => Some(current),
            _ => Some(value),
        })
}

/// Resolve the event's location from its `g` tags.
///
/// A value shaped like `lat,lon` is read directly; anything else is decoded
/// as a geohash and the cell centre is used.
pub fn extract_location(event: &Event) -> Option<Location> {
    let value = longest_g_value(event)?;
    match parse_location(value) {
        Ok(location) => location,
        Err(err) => {
            trace!(event_id = %event.id, error = %err, "Unusable location tag");
            None
        }
    }
}

/// Read one `g` tag value. `Ok(None)` for a `lat,lon` pair that is out of
/// floating-point range.
pub fn parse_location(value: &str) -> Result<Option<Location>, Error> {
    if let Some(captures) = lat_lng_pattern().and_then(|pattern| pattern.captures(value)) {
        let lat = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
        let lng = captures.get(3).and_then(|m| m.as_str().parse::<f64>().ok());
        return Ok(match (lat, lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some(Location {
                coordinates: [lng, lat],
                geohash: None,
            }),
            _ => None,
        });
    }

    let cell = geohash::decode(value)?;
    Ok(Some(Location {
        coordinates: cell.lng_lat(),
        geohash: Some(value.to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{g_tag, t_tag, Tag};

    fn event_with(tags: Vec<Tag>) -> Event {
        Event::new(1, "evt", "pk", 0, "", tags)
    }

    #[test]
    fn test_validate_event() {
        assert!(validate_event(&event_with(vec![])));
        let mut missing_content = event_with(vec![]);
        missing_content.content = None;
        assert!(!validate_event(&missing_content));
        let mut missing_kind = event_with(vec![]);
        missing_kind.kind = None;
        assert!(!validate_event(&missing_kind));
    }

    #[test]
    fn test_no_g_tag_has_no_location() {
        assert_eq!(extract_location(&event_with(vec![])), None);
        let tags = vec![t_tag("lightfoot"), Tag::new(["location", "52.52,13.405"])];
        assert_eq!(extract_location(&event_with(tags)), None);
        assert_eq!(extract_location(&event_with(vec![g_tag("")])), None);
        assert_eq!(extract_location(&event_with(vec![Tag::new(["g"])])), None);
    }

    #[test]
    fn test_geohash_location() {
        let location = extract_location(&event_with(vec![g_tag("u33dc")])).unwrap();
        assert_eq!(location.geohash.as_deref(), Some("u33dc"));
        let [lng, lat] = location.coordinates;
        assert!((lng - 13.405).abs() < 0.03);
        assert!((lat - 52.52).abs() < 0.03);
    }

    #[test]
    fn test_longest_g_tag_wins() {
        let tags = vec![g_tag("u3"), g_tag("u33dc"), g_tag("u33"), g_tag("u33dd")];
        let location = extract_location(&event_with(tags)).unwrap();
        assert_eq!(location.geohash.as_deref(), Some("u33dc"));
    }

    #[test]
    fn test_lat_lng_value() {
        let location = extract_location(&event_with(vec![g_tag("52.5200, 13.4050")])).unwrap();
        assert_eq!(location.geohash, None);
        assert_eq!(location.coordinates, [13.405, 52.52]);

        let location = extract_location(&event_with(vec![g_tag("-33.8688,151.2093")])).unwrap();
        assert_eq!(location.coordinates, [151.2093, -33.8688]);
    }

    #[test]
    fn test_parse_location_reports_geohash_errors() {
        match parse_location("u33a") {
            Err(Error::Geohash(geohash::GeohashError::InvalidCharacter(c))) => assert_eq!(c, 'a'),
            other => panic!("unexpected result: {other:?}"),
        }
        let overflow = format!("1{},0", "0".repeat(400));
        assert_eq!(parse_location(&overflow).unwrap(), None);
        assert!(parse_location("9q8yyk").unwrap().is_some());
    }

    #[test]
    fn test_undecodable_geohash_has_no_location() {
        assert_eq!(extract_location(&event_with(vec![g_tag("not-a-hash")])), None);
        assert_eq!(extract_location(&event_with(vec![g_tag("52.5,abc")])), None);
    }
}
