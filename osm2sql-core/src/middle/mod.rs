//! Intermediate storage for node positions, way node lists and relation
//! member lists.
//!
//! The output layer reads through [`MiddleQuery`], which must be `Sync` so the
//! pending flush can resolve geometry from several workers at once. Ingestion
//! and change tracking go through [`Middle`]. Two implementations exist:
//! [`RamMiddle`] keeps everything in process memory, and the SQLite-backed
//! slim store in `osm2sql-data` persists across runs for append mode.

use std::collections::{HashMap, HashSet};

use geo::Coord;
use thiserror::Error;

use crate::{NodeCacheError, NodeList, OsmId, Relation, TagList, Way};

mod ram;

pub use ram::RamMiddle;

/// Errors raised by middle implementations.
#[derive(Debug, Error)]
pub enum MiddleError {
    /// The node cache rejected a write.
    #[error(transparent)]
    NodeCache(#[from] NodeCacheError),
    /// A persistent backend failed.
    #[error("middle storage backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl MiddleError {
    /// Wrap a backend-specific error.
    pub fn backend<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(source))
    }
}

/// A stored way with its node positions resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct WayNodes {
    /// Way identifier.
    pub id: OsmId,
    /// Stored tags.
    pub tags: TagList,
    /// Node references as stored.
    pub node_ids: Vec<OsmId>,
    /// Positions matching `node_ids`; unresolved entries are NaN.
    pub nodes: NodeList,
}

impl WayNodes {
    /// Number of nodes that resolved to a position.
    pub const fn resolved_count(&self) -> usize {
        self.nodes.resolved
    }
}

/// Read access shared by all output backends.
pub trait MiddleQuery: Sync {
    /// Resolve node positions; see [`NodeList`] for the sentinel contract.
    fn nodes_get_list(&self, ids: &[OsmId]) -> Result<NodeList, MiddleError>;

    /// Fetch a way with its nodes resolved.
    fn ways_get(&self, id: OsmId) -> Result<Option<WayNodes>, MiddleError>;

    /// Fetch the stored subset of `ids`.
    ///
    /// Missing ids are skipped. The result order is unspecified, so callers
    /// match entries back to their request through [`WayNodes::id`]. Node
    /// positions for all returned ways resolve in one bulk lookup.
    fn ways_get_list(&self, ids: &[OsmId]) -> Result<Vec<WayNodes>, MiddleError>;

    /// Fetch a stored relation.
    fn relations_get(&self, id: OsmId) -> Result<Option<Relation>, MiddleError>;
}

/// Write access used during ingestion and diff application.
pub trait Middle: MiddleQuery {
    /// Store or overwrite a node position.
    fn nodes_set(&mut self, id: OsmId, lat: f64, lon: f64) -> Result<(), MiddleError>;

    /// Remove a node position.
    fn nodes_delete(&mut self, id: OsmId) -> Result<(), MiddleError>;

    /// Mark every way using `id`, and every relation using those ways,
    /// pending.
    fn node_changed(&mut self, id: OsmId) -> Result<(), MiddleError>;

    /// Store or overwrite a way; `pending` defers its output.
    fn ways_set(&mut self, way: &Way, pending: bool) -> Result<(), MiddleError>;

    /// Take a way out of the pending register, keeping its data.
    fn ways_done(&mut self, id: OsmId) -> Result<(), MiddleError>;

    /// Remove a way and its pending mark.
    fn ways_delete(&mut self, id: OsmId) -> Result<(), MiddleError>;

    /// Mark every relation using the way pending.
    fn way_changed(&mut self, id: OsmId) -> Result<(), MiddleError>;

    /// Store or overwrite a relation.
    fn relations_set(&mut self, relation: &Relation) -> Result<(), MiddleError>;

    /// Take a relation out of the pending register, keeping its data.
    fn relations_done(&mut self, id: OsmId) -> Result<(), MiddleError>;

    /// Remove a relation and its pending mark. Stored member ways become
    /// pending again so they can be rendered standalone.
    fn relations_delete(&mut self, id: OsmId) -> Result<(), MiddleError>;

    /// Mark a relation, and every relation using it, pending.
    fn relation_changed(&mut self, id: OsmId) -> Result<(), MiddleError>;

    /// Pending way ids in ascending order.
    fn pending_ways(&self) -> Result<Vec<OsmId>, MiddleError>;

    /// Pending relation ids in ascending order.
    fn pending_relations(&self) -> Result<Vec<OsmId>, MiddleError>;

    /// Make all writes so far durable.
    fn commit(&mut self) -> Result<(), MiddleError>;

    /// Whether change operations (modify, delete) are accepted. Slim stores
    /// persist across runs and track dependants.
    fn is_slim(&self) -> bool;
}

/// Resolve node positions for a batch of ways with one lookup over the
/// unique node ids.
pub fn resolve_ways<Q>(middle: &Q, ways: Vec<Way>) -> Result<Vec<WayNodes>, MiddleError>
where
    Q: MiddleQuery + ?Sized,
{
    let mut unique: Vec<OsmId> = ways
        .iter()
        .flat_map(|way| way.nodes.iter().copied())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    unique.sort_unstable();

    let resolved = middle.nodes_get_list(&unique)?;
    let positions: HashMap<OsmId, Coord<f64>> = unique
        .iter()
        .copied()
        .zip(resolved.coords.iter().copied())
        .collect();

    Ok(ways
        .into_iter()
        .map(|way| {
            let mut nodes = NodeList::unresolved(way.nodes.len());
            for (idx, node_id) in way.nodes.iter().enumerate() {
                if let Some(coord) = positions.get(node_id) {
                    nodes.fill(idx, *coord);
                }
            }
            WayNodes {
                id: way.id,
                tags: way.tags,
                node_ids: way.nodes,
                nodes,
            }
        })
        .collect())
}
