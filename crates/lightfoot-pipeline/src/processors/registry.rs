//! Registry mapping event kinds to classifier factories.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::events::{Event, KIND_TEXT_NOTE};
use crate::processors::base::EventProcessor;
use crate::processors::lightfoot_box::LightfootBoxProcessor;
use crate::verify::PubkeyVerifier;

/// Produces a fresh classifier for each event.
pub type ProcessorFactory = Arc<dyn Fn() -> Box<dyn EventProcessor> + Send + Sync>;

/// Registry for event classifiers.
///
/// Events whose kind has no registration, or that carry no kind at all, are
/// handed to the fallback classifier rather than dropped, so unrecognised
/// kinds still get a chance to show up on the map.
#[derive(Clone)]
pub struct ProcessorRegistry {
    factories: HashMap<i64, ProcessorFactory>,
    fallback: ProcessorFactory,
}

impl ProcessorRegistry {
    /// Create a registry with no kind mappings and the given fallback.
    pub fn new(fallback: ProcessorFactory) -> Self {
        Self {
            factories: HashMap::new(),
            fallback,
        }
    }

    /// Registry with the lightfoot box classifier for kind 1 and as fallback.
    pub fn with_defaults(verifier: Arc<dyn PubkeyVerifier>) -> Self {
        let factory = lightfoot_box_factory(verifier);
        let mut registry = Self::new(factory.clone());
        registry.register(KIND_TEXT_NOTE, factory);
        registry
    }

    /// Register a factory for `kind`.
    ///
    /// If the kind is already registered the new factory replaces it.
    pub fn register(&mut self, kind: i64, factory: ProcessorFactory) {
        if self.factories.insert(kind, factory).is_some() {
            debug!(kind, "Replacing processor registration");
        } else {
            info!(kind, "Registering processor");
        }
    }

    /// Replace the classifier used for unregistered kinds.
    pub fn set_fallback(&mut self, factory: ProcessorFactory) {
        self.fallback = factory;
    }

    pub fn has_kind(&self, kind: i64) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn registered_kinds(&self) -> Vec<i64> {
        let mut kinds: Vec<i64> = self.factories.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Pick the classifier for `event`, falling back for unknown kinds.
    pub fn create_processor(&self, event: &Event) -> Box<dyn EventProcessor> {
        let factory = event
            .kind
            .and_then(|kind| self.factories.get(&kind))
            .unwrap_or(&self.fallback);
        factory()
    }
}

pub fn lightfoot_box_factory(verifier: Arc<dyn PubkeyVerifier>) -> ProcessorFactory {
    Arc::new(move || {
        Box::new(LightfootBoxProcessor::new(verifier.clone())) as Box<dyn EventProcessor>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use crate::verify::VerifiedPubkeys;
    use crate::Error;
    use async_trait::async_trait;

    struct NamedProcessor(&'static str);

    #[async_trait]
    impl EventProcessor for NamedProcessor {
        fn name(&self) -> &str {
            self.0
        }

        async fn process(&self, _event: &Event) -> Result<Option<Feature>, Error> {
            Ok(None)
        }
    }

    fn named(name: &'static str) -> ProcessorFactory {
        Arc::new(move || Box::new(NamedProcessor(name)) as Box<dyn EventProcessor>)
    }

    fn event_of_kind(kind: Option<i64>) -> Event {
        Event {
            kind,
            ..Event::new(0, "e", "pk", 0, "", vec![])
        }
    }

    #[test]
    fn test_defaults() {
        let registry = ProcessorRegistry::with_defaults(Arc::new(VerifiedPubkeys::default()));
        assert!(registry.has_kind(KIND_TEXT_NOTE));
        assert_eq!(registry.registered_kinds(), vec![KIND_TEXT_NOTE]);
        let processor = registry.create_processor(&event_of_kind(Some(1)));
        assert_eq!(processor.name(), "lightfoot-box");
    }

    #[test]
    fn test_unknown_kind_uses_fallback() {
        let mut registry = ProcessorRegistry::new(named("fallback"));
        registry.register(30023, named("article"));

        assert_eq!(registry.create_processor(&event_of_kind(Some(30023))).name(), "article");
        assert_eq!(registry.create_processor(&event_of_kind(Some(4))).name(), "fallback");
        assert_eq!(registry.create_processor(&event_of_kind(None)).name(), "fallback");

        registry.set_fallback(named("other"));
        assert_eq!(registry.create_processor(&event_of_kind(Some(4))).name(), "other");
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ProcessorRegistry::new(named("fallback"));
        registry.register(1, named("first"));
        registry.register(1, named("second"));
        assert_eq!(registry.create_processor(&event_of_kind(Some(1))).name(), "second");
        assert_eq!(registry.registered_kinds(), vec![1]);
    }

    #[tokio::test]
    async fn test_unknown_kind_reaches_box_classifier() {
        let registry = ProcessorRegistry::with_defaults(Arc::new(VerifiedPubkeys::default()));
        let event = event_of_kind(Some(9999));
        let processor = registry.create_processor(&event);
        assert_eq!(processor.name(), "lightfoot-box");
        // The box classifier itself declines non-note kinds.
        assert_eq!(processor.process(&event).await.unwrap(), None);
    }
}
