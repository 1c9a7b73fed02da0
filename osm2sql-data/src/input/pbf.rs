//! Sequential PBF reader on top of `osmpbf`.
//!
//! Elements are delivered in file order so nodes reach the middle before the
//! ways that reference them.

use camino::Utf8Path;
use osm2sql_core::output::OutputError;
use osm2sql_core::{ChangeAction, Element, Member, Node, OsmType, Relation, TagList, Way};
use osmpbf::ElementReader;

use super::{OsmIngestError, OsmIngestSummary, output_error};

/// Read a PBF extract, handing each entity to `visit` as a create.
pub fn read_pbf<F>(path: &Utf8Path, mut visit: F) -> Result<OsmIngestSummary, OsmIngestError>
where
    F: FnMut(ChangeAction, Element) -> Result<(), OutputError>,
{
    let reader = ElementReader::from_path(path).map_err(|source| OsmIngestError::OpenPbf {
        source,
        path: path.to_path_buf(),
    })?;

    let mut summary = OsmIngestSummary::default();
    // `for_each` cannot stop early; keep the first failure and skip the rest.
    let mut failure: Option<OsmIngestError> = None;
    reader
        .for_each(|raw| {
            if failure.is_some() {
                return;
            }
            let element = convert(raw);
            summary.record(&element);
            let (kind, id) = (element.kind(), element.id());
            if let Err(source) = visit(ChangeAction::Create, element) {
                failure = Some(output_error(path, kind, id, source));
            }
        })
        .map_err(|source| OsmIngestError::DecodePbf {
            source,
            path: path.to_path_buf(),
        })?;

    match failure {
        Some(err) => Err(err),
        None => Ok(summary),
    }
}

fn convert(raw: osmpbf::Element<'_>) -> Element {
    match raw {
        osmpbf::Element::Node(node) => Element::Node(Node {
            id: node.id(),
            lat: node.lat(),
            lon: node.lon(),
            tags: node.tags().collect(),
        }),
        osmpbf::Element::DenseNode(node) => Element::Node(Node {
            id: node.id(),
            lat: node.lat(),
            lon: node.lon(),
            tags: node.tags().collect(),
        }),
        osmpbf::Element::Way(way) => Element::Way(Way {
            id: way.id(),
            nodes: way.refs().collect(),
            tags: way.tags().collect(),
        }),
        osmpbf::Element::Relation(relation) => {
            let members = relation
                .members()
                .map(|member| {
                    let kind = match member.member_type {
                        osmpbf::RelMemberType::Node => OsmType::Node,
                        osmpbf::RelMemberType::Way => OsmType::Way,
                        osmpbf::RelMemberType::Relation => OsmType::Relation,
                    };
                    Member::new(kind, member.member_id, member.role().unwrap_or(""))
                })
                .collect();
            let tags: TagList = relation.tags().collect();
            Element::Relation(Relation {
                id: relation.id(),
                members,
                tags,
            })
        }
    }
}
