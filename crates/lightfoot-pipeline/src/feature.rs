//! GeoJSON feature types emitted by classifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::{Event, Tag};

/// Who can use a lightfoot box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Public,
    Scheduled,
    Host,
    Transient,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Public => "public",
            Availability::Scheduled => "scheduled",
            Availability::Host => "host",
            Availability::Transient => "transient",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Availability::Public),
            "scheduled" => Ok(Availability::Scheduled),
            "host" => Ok(Availability::Host),
            "transient" => Ok(Availability::Transient),
            other => Err(format!("unknown availability: {other}")),
        }
    }
}

/// Point geometry, `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
}

impl Geometry {
    pub fn point(lng_lat: [f64; 2]) -> Self {
        Geometry::Point {
            coordinates: lng_lat,
        }
    }

    pub fn coordinates(&self) -> [f64; 2] {
        match self {
            Geometry::Point { coordinates } => *coordinates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub kind: i64,
    pub id: String,
    pub pubkey: String,
    pub time: u64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geohash: Option<String>,
    pub coordinates: [f64; 2],
    pub tags: Vec<Tag>,
    pub availability: Availability,
    pub verified: bool,
    pub raw_event: Event,
}

/// A GeoJSON feature describing one point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl Feature {
    /// Build a point feature; `properties.coordinates` mirrors the geometry.
    pub fn point(lng_lat: [f64; 2], properties: FeatureProperties) -> Self {
        let mut properties = properties;
        properties.coordinates = lng_lat;
        Self {
            geometry: Geometry::point(lng_lat),
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.properties.id
    }

    pub fn to_client_box(&self) -> Option<ClientBox> {
        let props = &self.properties;
        let geohash = props.geohash.clone()?;
        Some(ClientBox {
            id: props.id.clone(),
            geohash,
            availability: props.availability,
            coordinates: props.coordinates,
            created_at: props.time,
            pubkey: props.pubkey.clone(),
            content: if props.content.is_empty() {
                None
            } else {
                Some(props.content.clone())
            },
        })
    }
}

/// Compact box record for clients that do not need the full feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientBox {
    pub id: String,
    pub geohash: String,
    pub availability: Availability,
    pub coordinates: [f64; 2],
    pub created_at: u64,
    pub pubkey: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
