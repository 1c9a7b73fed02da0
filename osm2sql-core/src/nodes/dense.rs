//! Array-indexed node storage.

use super::{FixedCoord, NodeCacheError};
use crate::OsmId;

/// Slots grow lazily up to `max_id + 1`; the bound is what makes an id fatal.
#[derive(Debug)]
pub(super) struct DenseCache {
    slots: Vec<FixedCoord>,
    max_id: OsmId,
}

impl DenseCache {
    pub(super) const fn new(max_id: OsmId) -> Self {
        Self {
            slots: Vec::new(),
            max_id,
        }
    }

    pub(super) fn set(&mut self, id: OsmId, coord: FixedCoord) -> Result<(), NodeCacheError> {
        let idx = self.slot_index(id).ok_or(NodeCacheError::DenseCapacity {
            id,
            max_id: self.max_id,
        })?;
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, FixedCoord::EMPTY);
        }
        if let Some(slot) = self.slots.get_mut(idx) {
            *slot = coord;
        }
        Ok(())
    }

    pub(super) fn get(&self, id: OsmId) -> Option<FixedCoord> {
        let idx = self.slot_index(id)?;
        self.slots.get(idx).copied().filter(|coord| !coord.is_empty())
    }

    pub(super) fn delete(&mut self, id: OsmId) {
        if let Some(slot) = self.slot_index(id).and_then(|idx| self.slots.get_mut(idx)) {
            *slot = FixedCoord::EMPTY;
        }
    }

    fn slot_index(&self, id: OsmId) -> Option<usize> {
        if id > self.max_id {
            return None;
        }
        usize::try_from(id).ok()
    }
}
