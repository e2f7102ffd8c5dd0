//! Event classification: the classifier contract, concrete classifiers and
//! the kind registry.

mod base;
mod lightfoot_box;
mod registry;

pub use base::{extract_location, parse_location, validate_event, EventProcessor, Location};
pub use lightfoot_box::{parse_box_content, BoxDetails, LightfootBoxProcessor};
pub use registry::{lightfoot_box_factory, ProcessorFactory, ProcessorRegistry};
