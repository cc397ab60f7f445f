//! Per-context read cache and deferred invalidation.

use crate::models::{Photo, Pin, PinId};
use std::collections::{HashMap, HashSet};

/// What a committed write made stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Invalidation {
    pub pins: bool,
    pub albums: HashSet<PinId>,
}

impl Invalidation {
    pub fn pins() -> Self {
        Self {
            pins: true,
            albums: HashSet::new(),
        }
    }

    pub fn album(pin_id: PinId) -> Self {
        Self {
            pins: false,
            albums: HashSet::from([pin_id]),
        }
    }

    pub fn with_album(mut self, pin_id: PinId) -> Self {
        self.albums.insert(pin_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.pins && self.albums.is_empty()
    }

    fn absorb(&mut self, other: Invalidation) {
        self.pins |= other.pins;
        self.albums.extend(other.albums);
    }
}

/// Snapshot of what one writer context has read.
///
/// `generation` moves on every local invalidation so a read that raced a
/// write of the same context never repopulates the cache with old rows.
#[derive(Debug, Default)]
pub(crate) struct ContextCache {
    pins: Option<Vec<Pin>>,
    albums: HashMap<PinId, Vec<Photo>>,
    pending: Invalidation,
    generation: u64,
}

impl ContextCache {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pins(&self) -> Option<&[Pin]> {
        self.pins.as_deref()
    }

    pub fn album(&self, pin_id: &PinId) -> Option<&[Photo]> {
        self.albums.get(pin_id).map(Vec::as_slice)
    }

    pub fn store_pins(&mut self, generation: u64, pins: Vec<Pin>) {
        if generation == self.generation {
            self.pins = Some(pins);
        }
    }

    pub fn store_album(&mut self, generation: u64, pin_id: PinId, photos: Vec<Photo>) {
        if generation == self.generation {
            self.albums.insert(pin_id, photos);
        }
    }

    /// Drop entries made stale by a write of this context.
    pub fn apply(&mut self, invalidation: &Invalidation) {
        if invalidation.pins {
            self.pins = None;
        }
        for pin_id in &invalidation.albums {
            self.albums.remove(pin_id);
        }
        self.generation += 1;
    }

    /// Queue a write of the other context until the next merge.
    pub fn defer(&mut self, invalidation: Invalidation) {
        self.pending.absorb(invalidation);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Apply everything queued by the other context.
    pub fn merge_pending(&mut self) -> Invalidation {
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            self.apply(&pending);
        }
        pending
    }

    pub fn clear(&mut self) {
        self.pins = None;
        self.albums.clear();
        self.pending = Invalidation::default();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_invalidation_applies_on_merge() {
        let mut cache = ContextCache::default();
        let pin = Pin::new(1.0, 1.0, 0);
        cache.store_pins(cache.generation(), vec![pin.clone()]);

        cache.defer(Invalidation::pins());
        assert!(cache.has_pending());
        assert_eq!(cache.pins().map(|p| p.len()), Some(1));

        let merged = cache.merge_pending();
        assert!(merged.pins);
        assert!(cache.pins().is_none());
        assert!(!cache.has_pending());
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut cache = ContextCache::default();
        let pin_id = PinId::new();

        let generation = cache.generation();
        cache.apply(&Invalidation::album(pin_id.clone()));
        cache.store_album(generation, pin_id.clone(), Vec::new());

        assert!(cache.album(&pin_id).is_none());
    }

    #[test]
    fn test_empty_merge_keeps_generation() {
        let mut cache = ContextCache::default();
        let generation = cache.generation();
        assert!(cache.merge_pending().is_empty());
        assert_eq!(cache.generation(), generation);
    }
}
