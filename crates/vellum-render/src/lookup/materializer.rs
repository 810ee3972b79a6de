use std::sync::{Arc, RwLock};

use crate::catalog::{CatalogStore, Payload};
use crate::error::{LookupError, PayloadError};
use crate::template::{KindRegistry, Template};

type Slot = RwLock<Option<Arc<Template>>>;

/// Lazily turns catalog payloads into templates and caches them per position.
///
/// Each position has its own lock, so materializing one position never waits
/// on another. Decoding happens outside the lock: two threads racing on the
/// same empty slot may both decode, but only the first result is published
/// and both callers receive that instance.
pub struct Materializer {
    store: Arc<CatalogStore>,
    kinds: Arc<KindRegistry>,
    slots: Vec<Slot>,
}

impl Materializer {
    pub fn new(store: Arc<CatalogStore>, kinds: Arc<KindRegistry>) -> Self {
        let slots = store.positions().map(|_| RwLock::new(None)).collect();
        Self {
            store,
            kinds,
            slots,
        }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn kinds(&self) -> &Arc<KindRegistry> {
        &self.kinds
    }

    /// Returns the cached template at `position`, materializing it on first use.
    ///
    /// `Ok(None)` means the position does not exist or carries no payload.
    pub fn materialize(&self, position: usize) -> Result<Option<Arc<Template>>, LookupError> {
        let Some(slot) = self.slots.get(position) else {
            return Ok(None);
        };

        if let Some(cached) = read(slot) {
            tracing::trace!(position, "template cache hit");
            return Ok(Some(cached));
        }

        let Some(fresh) = self.decode(position)? else {
            return Ok(None);
        };

        let mut guard = match slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let published = guard.get_or_insert(fresh).clone();
        Ok(Some(published))
    }

    /// Decodes `position` again and replaces the cached instance.
    pub fn rematerialize(&self, position: usize) -> Result<Option<Arc<Template>>, LookupError> {
        let Some(slot) = self.slots.get(position) else {
            return Ok(None);
        };
        let fresh = self.decode(position)?;

        let mut guard = match slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = fresh.clone();
        Ok(fresh)
    }

    pub fn is_cached(&self, position: usize) -> bool {
        self.slots.get(position).and_then(read).is_some()
    }

    /// Number of positions currently holding a template.
    pub fn cached_count(&self) -> usize {
        self.slots.iter().filter(|slot| read(slot).is_some()).count()
    }

    /// Drops every cached template.
    pub fn clear(&self) {
        for slot in &self.slots {
            match slot.write() {
                Ok(mut guard) => *guard = None,
                Err(poisoned) => *poisoned.into_inner() = None,
            }
        }
    }

    fn decode(&self, position: usize) -> Result<Option<Arc<Template>>, LookupError> {
        let Some(raw) = self.store.payload_at(position) else {
            return Ok(None);
        };
        let reference = self.store.reference_at(position).unwrap_or_default();
        let corrupt = |source: PayloadError| {
            tracing::warn!(position, reference, error = %source, "corrupt template payload");
            LookupError::Corrupt {
                position,
                reference: reference.to_string(),
                source,
            }
        };

        let payload = Payload::decode(raw).map_err(&corrupt)?;
        let template = self.kinds.build(reference, payload).map_err(&corrupt)?;
        tracing::debug!(position, reference, kind = template.kind(), "materialized template");
        Ok(Some(Arc::new(template)))
    }
}

fn read(slot: &Slot) -> Option<Arc<Template>> {
    match slot.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;

    fn materializer() -> Materializer {
        let mut builder = CatalogBuilder::new();
        builder.add("a.tmp", &Payload::new("text").with_name("A").with_body("a"));
        builder.add_raw("broken.tmp", "{not json");
        builder.add_empty("hollow.tmp");
        builder.add("b.tmp", &Payload::new("text").with_name("B"));
        Materializer::new(
            Arc::new(builder.build().unwrap()),
            Arc::new(KindRegistry::new()),
        )
    }

    #[test]
    fn test_materialize_returns_same_instance() {
        let m = materializer();
        let first = m.materialize(0).unwrap().unwrap();
        let second = m.materialize(0).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.reference(), "a.tmp");
        assert_eq!(first.name(), "A");
    }

    #[test]
    fn test_rematerialize_replaces_instance() {
        let m = materializer();
        let first = m.materialize(0).unwrap().unwrap();
        let forced = m.rematerialize(0).unwrap().unwrap();
        assert!(!Arc::ptr_eq(&first, &forced));

        let after = m.materialize(0).unwrap().unwrap();
        assert!(Arc::ptr_eq(&forced, &after));
    }

    #[test]
    fn test_corrupt_payload_only_fails_its_lookup() {
        let m = materializer();
        let err = m.materialize(1).unwrap_err();
        assert_eq!(err.position(), 1);
        assert!(err.to_string().contains("broken.tmp"));

        assert!(m.materialize(3).unwrap().is_some());
        assert!(!m.is_cached(1));
    }

    #[test]
    fn test_corrupt_error_keeps_payload_cause() {
        let m = materializer();
        match m.materialize(1) {
            Err(LookupError::Corrupt { source, .. }) => {
                assert!(matches!(source, PayloadError::Malformed(_)))
            }
            other => panic!("expected corrupt payload, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_payload_and_position() {
        let m = materializer();
        assert!(m.materialize(2).unwrap().is_none());
        assert!(m.materialize(42).unwrap().is_none());
        assert!(m.rematerialize(42).unwrap().is_none());
    }

    #[test]
    fn test_only_touched_positions_are_cached() {
        let m = materializer();
        assert_eq!(m.cached_count(), 0);
        m.materialize(3).unwrap();
        assert!(m.is_cached(3));
        assert!(!m.is_cached(0));
        assert_eq!(m.cached_count(), 1);

        m.clear();
        assert_eq!(m.cached_count(), 0);
    }

    #[test]
    fn test_concurrent_materialize_publishes_one_instance() {
        let m = Arc::new(materializer());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || m.materialize(0).unwrap().unwrap())
            })
            .collect();
        let results: Vec<Arc<Template>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for template in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], template));
        }
    }
}
