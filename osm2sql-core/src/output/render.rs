//! Pure row rendering shared by the streaming and the pending paths.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::geometry::{BuiltGeometry, GeometryBuilder, MemberRole, MemberWay};
use crate::middle::{MiddleError, MiddleQuery, WayNodes};
use crate::table::{EncodedGeometry, GeometryFormat, TableId};
use crate::transform::{TagTransform, add_z_order};
use crate::{NodeList, OsmId, OsmType, Relation, TagList};

/// A finished row waiting to be written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Row {
    pub(crate) table: TableId,
    pub(crate) id: OsmId,
    pub(crate) tags: TagList,
    pub(crate) geometry: EncodedGeometry,
}

/// Rows for a relation plus the member ways it supersedes.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RelationRows {
    pub(crate) rows: Vec<Row>,
    pub(crate) superseded: Vec<OsmId>,
}

/// Rendering context borrowed from the output.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Renderer<'a> {
    pub(crate) transform: &'a TagTransform,
    pub(crate) builder: &'a GeometryBuilder,
    pub(crate) format: GeometryFormat,
}

impl Renderer<'_> {
    /// Rows for a way whose tags were already filtered.
    pub(crate) fn way_rows(
        &self,
        id: OsmId,
        mut tags: TagList,
        nodes: &NodeList,
        polygon: bool,
    ) -> Vec<Row> {
        let roads = add_z_order(&mut tags);
        self.builder
            .build_way(nodes, polygon)
            .into_iter()
            .flat_map(|built| self.rows_for(id, &tags, built, roads))
            .collect()
    }

    /// Re-classify a stored way and render it. Stored tags are already
    /// filtered, so classification only recovers the area decision.
    pub(crate) fn stored_way_rows(&self, way: &WayNodes) -> Vec<Row> {
        let mut tags = way.tags.clone();
        let class = self.transform.classify(OsmType::Way, &mut tags);
        if !class.keep {
            return Vec::new();
        }
        self.way_rows(way.id, tags, &way.nodes, class.polygon)
    }

    /// Render a relation. `None` means the relation produces no output.
    pub(crate) fn relation_rows<Q>(
        &self,
        middle: &Q,
        relation: &Relation,
    ) -> Result<Option<RelationRows>, MiddleError>
    where
        Q: MiddleQuery + ?Sized,
    {
        let way_ids = relation.way_ids();
        if way_ids.is_empty() {
            return Ok(None);
        }
        let mut found: HashMap<OsmId, WayNodes> = middle
            .ways_get_list(&way_ids)?
            .into_iter()
            .map(|way| (way.id, way))
            .collect();

        let mut seen = HashSet::new();
        let members: Vec<(WayNodes, &str)> = relation
            .members
            .iter()
            .filter(|member| member.kind == OsmType::Way && seen.insert(member.id))
            .filter_map(|member| {
                found
                    .remove(&member.id)
                    .map(|way| (way, member.role.as_str()))
            })
            .collect();
        if members.is_empty() {
            return Ok(None);
        }

        let outer_tags: Vec<&TagList> = members
            .iter()
            .filter(|(_, role)| MemberRole::from_role(role) == Some(MemberRole::Outer))
            .map(|(way, _)| &way.tags)
            .collect();
        let Some(plan) = self
            .transform
            .classify_relation(&relation.tags, &outer_tags)
        else {
            return Ok(None);
        };

        let member_ways: Vec<MemberWay> = members
            .iter()
            .map(|(way, role)| MemberWay {
                id: way.id,
                role: MemberRole::from_role(role),
                nodes: way.nodes.clone(),
            })
            .collect();
        let assembly =
            self.builder
                .assemble_relation(&member_ways, plan.make_polygon, plan.make_boundary);
        if let Some(err) = &assembly.failure {
            debug!("relation {}: polygon assembly failed: {err}", relation.id);
        }

        let superseded = if plan.make_polygon
            && !assembly.polygons.is_empty()
            && !plan.polygon_tags.is_empty()
        {
            members
                .iter()
                .filter(|(way, _)| way.tags.contains_all(&plan.polygon_tags))
                .map(|(way, _)| way.id)
                .collect()
        } else {
            Vec::new()
        };

        let row_id = -relation.id;
        let rows = assembly
            .polygons
            .into_iter()
            .flat_map(|built| self.rows_for(row_id, &plan.tags, built, false))
            .chain(
                assembly
                    .lines
                    .into_iter()
                    .flat_map(|built| self.rows_for(row_id, &plan.tags, built, plan.roads)),
            )
            .collect();
        Ok(Some(RelationRows { rows, superseded }))
    }

    fn rows_for(&self, id: OsmId, tags: &TagList, built: BuiltGeometry, roads: bool) -> Vec<Row> {
        if built.geometry.is_empty() {
            return Vec::new();
        }
        let mut tags = tags.clone();
        if let Some(area) = built.area {
            tags.set("way_area", area.to_string());
        }
        let geometry = EncodedGeometry::encode(&built.geometry, self.format);
        TableId::route(&geometry, roads)
            .into_iter()
            .map(|table| Row {
                table,
                id,
                tags: tags.clone(),
                geometry: geometry.clone(),
            })
            .collect()
    }
}
