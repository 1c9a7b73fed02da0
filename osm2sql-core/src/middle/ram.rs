//! In-process middle store for one-shot imports.

use std::collections::{BTreeSet, HashMap};

use super::{Middle, MiddleError, MiddleQuery, WayNodes, resolve_ways};
use crate::{NodeCache, NodeCacheConfig, NodeList, OsmId, OsmType, Relation, TagList, Way};

#[derive(Debug, Clone)]
struct StoredWay {
    nodes: Vec<OsmId>,
    tags: TagList,
}

/// Middle store keeping nodes, ways and relations in memory.
///
/// Dependants are found by scanning, which is fine for the small diffs this
/// store sees in tests and one-shot runs; append mode proper uses the slim
/// SQLite store.
#[derive(Debug)]
pub struct RamMiddle {
    nodes: NodeCache,
    ways: HashMap<OsmId, StoredWay>,
    relations: HashMap<OsmId, Relation>,
    pending_ways: BTreeSet<OsmId>,
    pending_relations: BTreeSet<OsmId>,
    accepts_changes: bool,
}

impl RamMiddle {
    /// Create an empty store with the given node cache configuration.
    pub fn new(config: NodeCacheConfig) -> Self {
        Self {
            nodes: NodeCache::new(config),
            ways: HashMap::new(),
            relations: HashMap::new(),
            pending_ways: BTreeSet::new(),
            pending_relations: BTreeSet::new(),
            accepts_changes: false,
        }
    }

    /// Accept change operations against this store, so a diff can be
    /// replayed on top of an import made in the same process.
    #[must_use]
    pub fn accepting_changes(mut self) -> Self {
        self.accepts_changes = true;
        self
    }

    fn relations_using(&self, kind: OsmType, id: OsmId) -> Vec<OsmId> {
        self.relations
            .values()
            .filter(|relation| {
                relation
                    .members
                    .iter()
                    .any(|member| member.kind == kind && member.id == id)
            })
            .map(|relation| relation.id)
            .collect()
    }
}

impl Default for RamMiddle {
    fn default() -> Self {
        Self::new(NodeCacheConfig::default())
    }
}

impl MiddleQuery for RamMiddle {
    fn nodes_get_list(&self, ids: &[OsmId]) -> Result<NodeList, MiddleError> {
        Ok(self.nodes.get_list(ids))
    }

    fn ways_get(&self, id: OsmId) -> Result<Option<WayNodes>, MiddleError> {
        Ok(self.ways_get_list(&[id])?.into_iter().next())
    }

    fn ways_get_list(&self, ids: &[OsmId]) -> Result<Vec<WayNodes>, MiddleError> {
        let found: Vec<Way> = ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| {
                self.ways.get(id).map(|stored| Way {
                    id: *id,
                    nodes: stored.nodes.clone(),
                    tags: stored.tags.clone(),
                })
            })
            .collect();
        resolve_ways(self, found)
    }

    fn relations_get(&self, id: OsmId) -> Result<Option<Relation>, MiddleError> {
        Ok(self.relations.get(&id).cloned())
    }
}

impl Middle for RamMiddle {
    fn nodes_set(&mut self, id: OsmId, lat: f64, lon: f64) -> Result<(), MiddleError> {
        self.nodes.set(id, lat, lon)?;
        Ok(())
    }

    fn nodes_delete(&mut self, id: OsmId) -> Result<(), MiddleError> {
        self.nodes.delete(id);
        Ok(())
    }

    fn node_changed(&mut self, id: OsmId) -> Result<(), MiddleError> {
        let ways: Vec<OsmId> = self
            .ways
            .iter()
            .filter(|(_, way)| way.nodes.contains(&id))
            .map(|(way_id, _)| *way_id)
            .collect();
        for way_id in ways {
            self.pending_ways.insert(way_id);
            self.way_changed(way_id)?;
        }
        for relation_id in self.relations_using(OsmType::Node, id) {
            self.pending_relations.insert(relation_id);
        }
        Ok(())
    }

    fn ways_set(&mut self, way: &Way, pending: bool) -> Result<(), MiddleError> {
        self.ways.insert(
            way.id,
            StoredWay {
                nodes: way.nodes.clone(),
                tags: way.tags.clone(),
            },
        );
        if pending {
            self.pending_ways.insert(way.id);
        } else {
            self.pending_ways.remove(&way.id);
        }
        Ok(())
    }

    fn ways_done(&mut self, id: OsmId) -> Result<(), MiddleError> {
        self.pending_ways.remove(&id);
        Ok(())
    }

    fn ways_delete(&mut self, id: OsmId) -> Result<(), MiddleError> {
        self.ways.remove(&id);
        self.pending_ways.remove(&id);
        Ok(())
    }

    fn way_changed(&mut self, id: OsmId) -> Result<(), MiddleError> {
        for relation_id in self.relations_using(OsmType::Way, id) {
            self.pending_relations.insert(relation_id);
        }
        Ok(())
    }

    fn relations_set(&mut self, relation: &Relation) -> Result<(), MiddleError> {
        self.relations.insert(relation.id, relation.clone());
        Ok(())
    }

    fn relations_done(&mut self, id: OsmId) -> Result<(), MiddleError> {
        self.pending_relations.remove(&id);
        Ok(())
    }

    fn relations_delete(&mut self, id: OsmId) -> Result<(), MiddleError> {
        if let Some(relation) = self.relations.remove(&id) {
            for way_id in relation.way_ids() {
                if self.ways.contains_key(&way_id) {
                    self.pending_ways.insert(way_id);
                }
            }
        }
        self.pending_relations.remove(&id);
        Ok(())
    }

    fn relation_changed(&mut self, id: OsmId) -> Result<(), MiddleError> {
        if self.relations.contains_key(&id) {
            self.pending_relations.insert(id);
        }
        for parent in self.relations_using(OsmType::Relation, id) {
            self.pending_relations.insert(parent);
        }
        Ok(())
    }

    fn pending_ways(&self) -> Result<Vec<OsmId>, MiddleError> {
        Ok(self.pending_ways.iter().copied().collect())
    }

    fn pending_relations(&self) -> Result<Vec<OsmId>, MiddleError> {
        Ok(self.pending_relations.iter().copied().collect())
    }

    fn commit(&mut self) -> Result<(), MiddleError> {
        Ok(())
    }

    fn is_slim(&self) -> bool {
        self.accepts_changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheStrategy, Member};
    use rstest::{fixture, rstest};

    #[fixture]
    fn middle() -> RamMiddle {
        let mut middle = RamMiddle::new(NodeCacheConfig {
            strategy: CacheStrategy::Dense { max_id: 100 },
            ..NodeCacheConfig::default()
        });
        middle.nodes_set(1, 0.0, 0.0).expect("node 1");
        middle.nodes_set(2, 0.0, 1.0).expect("node 2");
        middle.nodes_set(3, 1.0, 1.0).expect("node 3");
        middle
            .ways_set(
                &Way {
                    id: 10,
                    nodes: vec![1, 2, 3],
                    tags: TagList::from([("highway", "service")]),
                },
                false,
            )
            .expect("way 10");
        middle
            .ways_set(
                &Way {
                    id: 11,
                    nodes: vec![3, 4],
                    tags: TagList::from([("building", "yes")]),
                },
                true,
            )
            .expect("way 11");
        middle
            .relations_set(&Relation {
                id: 20,
                members: vec![Member::new(OsmType::Way, 11, "outer")],
                tags: TagList::from([("type", "multipolygon")]),
            })
            .expect("relation 20");
        middle
    }

    #[rstest]
    fn get_list_returns_found_subset(middle: RamMiddle) {
        let mut found = middle.ways_get_list(&[11, 99, 10]).expect("lookup");
        found.sort_by_key(|way| way.id);
        let ids: Vec<_> = found.iter().map(|way| way.id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(found[0].resolved_count(), 3);
        assert_eq!(found[1].resolved_count(), 1, "node 4 is unknown");
    }

    #[rstest]
    fn done_keeps_data_but_clears_pending(mut middle: RamMiddle) {
        assert_eq!(middle.pending_ways().expect("pending"), vec![11]);
        middle.ways_done(11).expect("done");
        assert!(middle.pending_ways().expect("pending").is_empty());
        assert!(middle.ways_get(11).expect("lookup").is_some());
    }

    #[rstest]
    fn node_change_marks_dependants(mut middle: RamMiddle) {
        middle.ways_done(11).expect("done");
        middle.node_changed(3).expect("node change");
        assert_eq!(middle.pending_ways().expect("pending"), vec![10, 11]);
        assert_eq!(middle.pending_relations().expect("pending"), vec![20]);
    }

    #[rstest]
    fn way_change_marks_relations_only(mut middle: RamMiddle) {
        middle.ways_done(11).expect("done");
        middle.way_changed(11).expect("way change");
        assert!(middle.pending_ways().expect("pending").is_empty());
        assert_eq!(middle.pending_relations().expect("pending"), vec![20]);
    }

    #[rstest]
    fn relation_delete_returns_members_to_pending(mut middle: RamMiddle) {
        middle.ways_done(11).expect("done");
        middle.relations_delete(20).expect("delete");
        assert!(middle.relations_get(20).expect("lookup").is_none());
        assert_eq!(middle.pending_ways().expect("pending"), vec![11]);
    }

    #[rstest]
    fn delete_removes_way_and_pending_mark(mut middle: RamMiddle) {
        middle.ways_delete(11).expect("delete");
        assert!(middle.ways_get(11).expect("lookup").is_none());
        assert!(middle.pending_ways().expect("pending").is_empty());
    }
}
