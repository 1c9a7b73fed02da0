//! OpenStreetMap entity records shared by the middle and output layers.

use std::fmt;

use crate::TagList;

/// Raw OSM identifier. Nodes, ways and relations each have their own space.
pub type OsmId = i64;

/// Kind of an OSM entity, carried on every member reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OsmType {
    /// A point with coordinates.
    Node,
    /// An ordered list of node references.
    Way,
    /// A collection of typed, role-bearing members.
    Relation,
}

impl OsmType {
    /// Single-letter code used when persisting member lists.
    pub const fn code(self) -> char {
        match self {
            Self::Node => 'n',
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }

    /// Inverse of [`OsmType::code`].
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            'n' => Some(Self::Node),
            'w' => Some(Self::Way),
            'r' => Some(Self::Relation),
            _ => None,
        }
    }
}

impl fmt::Display for OsmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        };
        f.write_str(name)
    }
}

/// A relation member: typed reference plus role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    /// Type of the referenced entity.
    pub kind: OsmType,
    /// Identifier of the referenced entity.
    pub id: OsmId,
    /// Role string, possibly empty.
    pub role: String,
}

impl Member {
    /// Construct a member reference.
    pub fn new(kind: OsmType, id: OsmId, role: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            role: role.into(),
        }
    }
}

/// A node as delivered by an input reader.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node identifier.
    pub id: OsmId,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Node tags.
    pub tags: TagList,
}

/// A way as delivered by an input reader or stored in the middle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Way {
    /// Way identifier.
    pub id: OsmId,
    /// Ordered node references.
    pub nodes: Vec<OsmId>,
    /// Way tags.
    pub tags: TagList,
}

/// A relation as delivered by an input reader or stored in the middle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation identifier.
    pub id: OsmId,
    /// Ordered members.
    pub members: Vec<Member>,
    /// Relation tags.
    pub tags: TagList,
}

impl Relation {
    /// Ids of the way members, in member order.
    pub fn way_ids(&self) -> Vec<OsmId> {
        self.members
            .iter()
            .filter(|member| member.kind == OsmType::Way)
            .map(|member| member.id)
            .collect()
    }
}

/// A single entity from an input stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Node entity.
    Node(Node),
    /// Way entity.
    Way(Way),
    /// Relation entity.
    Relation(Relation),
}

impl Element {
    /// Kind of the wrapped entity.
    pub const fn kind(&self) -> OsmType {
        match self {
            Self::Node(_) => OsmType::Node,
            Self::Way(_) => OsmType::Way,
            Self::Relation(_) => OsmType::Relation,
        }
    }

    /// Identifier of the wrapped entity.
    pub const fn id(&self) -> OsmId {
        match self {
            Self::Node(node) => node.id,
            Self::Way(way) => way.id,
            Self::Relation(relation) => relation.id,
        }
    }
}

/// Change applied to an entity when replaying a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// Entity is new.
    Create,
    /// Entity replaces a previous version (delete then add).
    Modify,
    /// Entity is removed.
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OsmType::Node)]
    #[case(OsmType::Way)]
    #[case(OsmType::Relation)]
    fn member_codes_are_reversible(#[case] kind: OsmType) {
        assert_eq!(OsmType::from_code(kind.code()), Some(kind));
    }

    #[rstest]
    fn relation_way_ids_skip_other_members() {
        let relation = Relation {
            id: 1,
            members: vec![
                Member::new(OsmType::Way, 10, "outer"),
                Member::new(OsmType::Node, 11, "label"),
                Member::new(OsmType::Way, 12, "inner"),
            ],
            tags: TagList::new(),
        };
        assert_eq!(relation.way_ids(), vec![10, 12]);
    }
}
