//! Ring assembly for multipolygon and boundary relations.

use geo::{Contains, Coord, LineString, Polygon};
use log::debug;
use thiserror::Error;

use super::line::extend_tail;

/// Role a member way plays in ring assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRole {
    /// `outer`, or an empty role.
    Outer,
    /// `inner`.
    Inner,
}

impl MemberRole {
    /// Map a relation member role. Roles other than `outer`, `inner` and the
    /// empty string take no part in ring assembly.
    pub fn from_role(role: &str) -> Option<Self> {
        match role {
            "outer" | "" => Some(Self::Outer),
            "inner" => Some(Self::Inner),
            _ => None,
        }
    }
}

/// Failures while closing rings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RingError {
    /// Member ways could not be chained into a closed ring.
    #[error("{role:?} ring starting at ({x}, {y}) does not close")]
    Unclosed {
        /// Role of the failing ring.
        role: MemberRole,
        /// First coordinate of the open chain.
        x: f64,
        /// First coordinate of the open chain.
        y: f64,
    },
}

/// Chain member ways into closed rings.
///
/// Segments are joined greedily at matching endpoints, reversing where
/// needed. A chain is closed once its first and last vertices are equal and
/// it holds at least four vertices. Any chain that runs out of partners
/// before closing fails the whole assembly.
pub fn close_rings(
    segments: Vec<Vec<Coord<f64>>>,
    role: MemberRole,
) -> Result<Vec<Vec<Coord<f64>>>, RingError> {
    let mut pool: Vec<Option<Vec<Coord<f64>>>> = segments
        .into_iter()
        .filter(|segment| segment.len() >= 2)
        .map(Some)
        .collect();
    let mut rings = Vec::new();

    for idx in 0..pool.len() {
        let Some(mut ring) = pool.get_mut(idx).and_then(Option::take) else {
            continue;
        };
        loop {
            if is_closed(&ring) {
                rings.push(ring);
                break;
            }
            if !extend_tail(&mut ring, &mut pool) {
                let start = ring.first().copied().unwrap_or(Coord { x: 0.0, y: 0.0 });
                return Err(RingError::Unclosed {
                    role,
                    x: start.x,
                    y: start.y,
                });
            }
        }
    }
    Ok(rings)
}

/// Whether a vertex sequence forms a closed ring.
pub fn is_closed(coords: &[Coord<f64>]) -> bool {
    coords.len() >= 4 && coords.first() == coords.last()
}

/// Build one polygon per outer ring and attach each inner ring to the first
/// outer that contains it. Inner rings outside every outer are dropped.
pub fn build_polygons(
    outers: Vec<LineString<f64>>,
    inners: Vec<LineString<f64>>,
) -> Vec<Polygon<f64>> {
    let shells: Vec<Polygon<f64>> = outers
        .iter()
        .map(|outer| Polygon::new(outer.clone(), Vec::new()))
        .collect();
    let mut holes: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];

    for inner in inners {
        match shells.iter().position(|shell| shell.contains(&inner)) {
            Some(idx) => {
                if let Some(slot) = holes.get_mut(idx) {
                    slot.push(inner);
                }
            }
            None => debug!("inner ring lies outside every outer ring, dropped"),
        }
    }

    outers
        .into_iter()
        .zip(holes)
        .map(|(outer, holes)| Polygon::new(outer, holes))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn square(min: f64, max: f64) -> Vec<Coord<f64>> {
        vec![c(min, min), c(max, min), c(max, max), c(min, max), c(min, min)]
    }

    #[rstest]
    #[case("outer", Some(MemberRole::Outer))]
    #[case("", Some(MemberRole::Outer))]
    #[case("inner", Some(MemberRole::Inner))]
    #[case("subarea", None)]
    fn maps_roles(#[case] role: &str, #[case] expected: Option<MemberRole>) {
        assert_eq!(MemberRole::from_role(role), expected);
    }

    #[rstest]
    fn closed_way_is_a_ring_on_its_own() {
        let rings = close_rings(vec![square(0.0, 1.0)], MemberRole::Outer).expect("closed");
        assert_eq!(rings, vec![square(0.0, 1.0)]);
    }

    #[rstest]
    fn chains_two_halves_with_reversal() {
        let first = vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0)];
        let second = vec![c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0)];
        let rings = close_rings(vec![first, second], MemberRole::Outer).expect("closes");
        assert_eq!(rings.len(), 1);
        assert_eq!(
            rings[0],
            vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 1.0), c(0.0, 0.0)]
        );
    }

    #[rstest]
    fn open_chain_fails() {
        let err = close_rings(
            vec![vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0)]],
            MemberRole::Inner,
        )
        .expect_err("open ring");
        assert!(matches!(
            err,
            RingError::Unclosed {
                role: MemberRole::Inner,
                ..
            }
        ));
    }

    #[rstest]
    fn inners_attach_to_containing_outer() {
        let outers = vec![
            LineString::new(square(0.0, 10.0)),
            LineString::new(square(20.0, 30.0)),
        ];
        let inners = vec![
            LineString::new(square(22.0, 24.0)),
            LineString::new(square(50.0, 51.0)),
        ];
        let polygons = build_polygons(outers, inners);
        assert_eq!(polygons.len(), 2);
        assert!(polygons[0].interiors().is_empty());
        assert_eq!(polygons[1].interiors().len(), 1);
    }
}
