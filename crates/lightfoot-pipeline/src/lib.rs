//! Event-to-feature pipeline for Lightfoot.
//!
//! Turns Nostr events into GeoJSON features for the map: a geohash codec,
//! a registry of per-kind classifiers, the lightfoot box classifier and a
//! dispatcher that spreads classification over a pool of execution units.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     LIGHTFOOT-PIPELINE                           │
//! │                                                                  │
//! │   Event ──▶ EventDispatcher ──round robin──▶ WorkerPool          │
//! │                  │                          ┌──────────────┐     │
//! │                  │ (no pool)                │ unit 0 .. N  │     │
//! │                  ▼                          │  registry    │     │
//! │            process_direct                   │  classifier  │     │
//! │                  │                          └──────┬───────┘     │
//! │                  │                                 │ token       │
//! │                  ▼                                 ▼             │
//! │          Result<Option<Feature>>  ◀──── PendingTable             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Classifiers
//!
//! | Kind | Classifier | Emits |
//! |------|------------|-------|
//! | 1 | [`LightfootBoxProcessor`] | Point for `#lightfootbox` notes with a `g` tag |
//! | other | fallback (the box classifier by default) | usually nothing |
//!
//! # Example
//!
//! ```rust,ignore
//! use lightfoot_pipeline::{EventDispatcher, PipelineConfig, ProcessorRegistry, Event};
//!
//! let config = PipelineConfig::from_env()?;
//! let registry = ProcessorRegistry::with_defaults(config.verifier());
//! let dispatcher = EventDispatcher::new(registry, &config.dispatch);
//!
//! let event = Event::from_json(raw)?;
//! if let Some(feature) = dispatcher.process(event).await? {
//!     println!("{}", serde_json::to_string(&feature)?);
//! }
//! ```

mod config;
mod dispatch;
mod error;
mod events;
mod feature;
pub mod geohash;
mod processors;
mod verify;

pub use config::{
    size_for_cores, DispatchConfig, PipelineConfig, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_WORKER_FLOOR, DEFAULT_WORKER_RESERVE, ENV_REQUEST_TIMEOUT_SECS,
    ENV_VERIFIED_PUBKEYS, ENV_WORKERS, ENV_WORKER_FLOOR, ENV_WORKER_RESERVE,
};
pub use dispatch::{
    process_direct, EventDispatcher, PendingTable, UnitMessage, WireError, WireRequest,
    WireResponse, WorkerPool,
};
pub use error::Error;
pub use events::{
    g_tag, has_tag, t_tag, tag_value, Event, Tag, KIND_TEXT_NOTE, TAG_GEOHASH, TAG_LOCATION,
    TAG_TOPIC, TOPIC_LIGHTFOOT, TOPIC_LIGHTFOOT_BOX,
};
pub use feature::{
    Availability, ClientBox, Feature, FeatureCollection, FeatureProperties, Geometry,
};
pub use geohash::{Direction, GeoCell, GeohashError, Interval, Neighbors};
pub use processors::{
    extract_location, lightfoot_box_factory, parse_box_content, parse_location, validate_event,
    BoxDetails, EventProcessor, LightfootBoxProcessor, Location, ProcessorFactory,
    ProcessorRegistry,
};
pub use verify::{
    parse_pubkey_list, FeatureFilter, PubkeyVerifier, VerifiedPubkeys, PARAM_ALLOW_UNVERIFIED,
};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
