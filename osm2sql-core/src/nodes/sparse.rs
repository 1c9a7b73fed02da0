//! Block-allocated, budget-bounded node storage.
//!
//! Blocks hold `BLOCK_LEN` consecutive ids. Once the budget is spent the
//! oldest block is dropped wholesale, so eviction never leaves partially
//! valid blocks behind.

use std::collections::{HashMap, VecDeque};
use std::mem::size_of;

use super::FixedCoord;
use crate::OsmId;

const BLOCK_LEN: usize = 1024;
const BLOCK_LEN_ID: OsmId = 1024;

type Block = Box<[FixedCoord; BLOCK_LEN]>;

#[derive(Debug)]
pub(super) struct SparseCache {
    blocks: HashMap<OsmId, Block>,
    order: VecDeque<OsmId>,
    max_blocks: usize,
}

impl SparseCache {
    pub(super) fn with_budget(max_bytes: usize) -> Self {
        let block_bytes = size_of::<FixedCoord>() * BLOCK_LEN;
        let max_blocks = max_bytes.checked_div(block_bytes).unwrap_or(0).max(1);
        Self {
            blocks: HashMap::new(),
            order: VecDeque::new(),
            max_blocks,
        }
    }

    pub(super) fn set(&mut self, id: OsmId, coord: FixedCoord) {
        let (block_id, offset) = split_id(id);
        if !self.blocks.contains_key(&block_id) {
            if self.blocks.len() >= self.max_blocks {
                self.evict_oldest();
            }
            self.blocks
                .insert(block_id, Box::new([FixedCoord::EMPTY; BLOCK_LEN]));
            self.order.push_back(block_id);
        }
        if let Some(slot) = self
            .blocks
            .get_mut(&block_id)
            .and_then(|block| block.get_mut(offset))
        {
            *slot = coord;
        }
    }

    pub(super) fn get(&self, id: OsmId) -> Option<FixedCoord> {
        let (block_id, offset) = split_id(id);
        self.blocks
            .get(&block_id)
            .and_then(|block| block.get(offset))
            .copied()
            .filter(|coord| !coord.is_empty())
    }

    pub(super) fn delete(&mut self, id: OsmId) {
        let (block_id, offset) = split_id(id);
        if let Some(slot) = self
            .blocks
            .get_mut(&block_id)
            .and_then(|block| block.get_mut(offset))
        {
            *slot = FixedCoord::EMPTY;
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(victim) = self.order.pop_front() {
            self.blocks.remove(&victim);
            log::debug!("node cache full, evicted block {victim}");
        }
    }
}

fn split_id(id: OsmId) -> (OsmId, usize) {
    let block = id.div_euclid(BLOCK_LEN_ID);
    let offset = usize::try_from(id.rem_euclid(BLOCK_LEN_ID)).unwrap_or(0);
    (block, offset)
}
