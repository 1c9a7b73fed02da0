//! Relation classification: routes, boundaries and multipolygons.

use super::{TagTransform, add_z_order};
use crate::{OsmType, TagList};

/// Relation types that produce output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// `type=route`: chained member lines.
    Route,
    /// `type=boundary`, or a multipolygon carrying a `boundary` tag.
    Boundary,
    /// `type=multipolygon`.
    Multipolygon,
}

/// How a relation is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPlan {
    /// Relation type.
    pub kind: RelationKind,
    /// Filtered output tags, including `z_order`.
    pub tags: TagList,
    /// Polygon-flagged tags; member ways carrying all of them are
    /// superseded by the relation.
    pub polygon_tags: TagList,
    /// Build polygons only.
    pub make_polygon: bool,
    /// Build polygons and lines.
    pub make_boundary: bool,
    /// Line output also goes to the roads table.
    pub roads: bool,
}

/// Cycle and walking network codes mapped to their tag prefix.
const ROUTE_NETWORKS: &[&str] = &["lcn", "rcn", "ncn", "lwn", "rwn", "nwn"];

/// Synthetic tags for a route relation.
///
/// A known `network` yields `<network>=yes|alternate|connection` from
/// `state`, and `<network>_ref=<ref>` when a ref exists.
/// `route_pref_color` is the single digit `0`..`4` from `preferred_color`,
/// `0` otherwise.
pub fn route_tags(tags: &TagList) -> TagList {
    let mut out = TagList::new();
    if let Some(network) = tags
        .get("network")
        .filter(|network| ROUTE_NETWORKS.contains(network))
    {
        let state = tags
            .get("state")
            .filter(|state| matches!(*state, "alternate" | "connection"))
            .unwrap_or("yes");
        out.push(network, state);
        if let Some(reference) = tags.get("ref") {
            out.push(format!("{network}_ref"), reference);
        }
    }
    let colour = tags
        .get("preferred_color")
        .filter(|colour| matches!(*colour, "0" | "1" | "2" | "3" | "4"))
        .unwrap_or("0");
    out.push("route_pref_color", colour);
    out
}

/// Whether the relation carries no tags besides `type` and `name`.
fn is_untagged(tags: &TagList) -> bool {
    tags.iter().all(|tag| tag.key == "type" || tag.key == "name")
}

impl TagTransform {
    /// Decide how a relation is rendered.
    ///
    /// `outer_tags` holds the tags of member ways in an outer role, in member
    /// order; untagged multipolygons take the tags those ways share.
    /// Relations without `type`, of another type, or without exported tags
    /// yield `None`.
    pub fn classify_relation(
        &self,
        relation_tags: &TagList,
        outer_tags: &[&TagList],
    ) -> Option<RelationPlan> {
        let kind = match relation_tags.get("type")? {
            "route" => RelationKind::Route,
            "boundary" => RelationKind::Boundary,
            "multipolygon" if relation_tags.contains_key("boundary") => RelationKind::Boundary,
            "multipolygon" => RelationKind::Multipolygon,
            _ => return None,
        };

        let mut tags = relation_tags.clone();
        if kind == RelationKind::Multipolygon
            && is_untagged(relation_tags)
            && let Some((first, rest)) = outer_tags.split_first()
        {
            let mut shared = (*first).clone();
            for other in rest {
                shared.intersect(other);
            }
            for tag in &shared {
                tags.push(tag.key.clone(), tag.value.clone());
            }
        }

        let class = self.classify(OsmType::Relation, &mut tags);
        if !class.keep {
            return None;
        }
        if kind == RelationKind::Route {
            for tag in &route_tags(relation_tags) {
                tags.set(tag.key.clone(), tag.value.clone());
            }
        }
        let roads = add_z_order(&mut tags);
        let polygon_tags = if kind == RelationKind::Multipolygon {
            self.polygon_tags(&tags)
        } else {
            TagList::new()
        };

        Some(RelationPlan {
            kind,
            make_polygon: kind == RelationKind::Multipolygon,
            make_boundary: kind == RelationKind::Boundary,
            tags,
            polygon_tags,
            roads,
        })
    }
}
