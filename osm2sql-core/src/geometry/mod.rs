//! Geometry construction from resolved node lists.
//!
//! All closure tests run on the quantized input coordinates, so a ring
//! closes iff its first and last vertices are bit-for-bit equal. Coordinates
//! are projected only once a shape is known to be valid.

use geo::{Area, Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};

use crate::NodeList;

mod line;
mod projection;
mod ring;
mod wkb;
mod wkt;

pub use line::{chain_segments, dedupe, split_line};
pub use projection::{ParseProjectionError, Projection};
pub use ring::{MemberRole, RingError, build_polygons, close_rings, is_closed};
pub use wkb::{to_hex, to_wkb, type_of as wkb_type_of};
pub use wkt::to_wkt;

/// Geometry kinds the builder emits.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A node position.
    Point(Point<f64>),
    /// A way or a split piece of one.
    LineString(LineString<f64>),
    /// A closed way or one assembled ring set.
    Polygon(Polygon<f64>),
    /// Chained route members when multi-geometry output is enabled.
    MultiLineString(MultiLineString<f64>),
    /// Assembled rings when multi-geometry output is enabled.
    MultiPolygon(MultiPolygon<f64>),
}

impl Geometry {
    /// Whether the geometry belongs in the polygon table.
    pub const fn is_polygonal(&self) -> bool {
        matches!(self, Self::Polygon(_) | Self::MultiPolygon(_))
    }

    /// Whether the geometry has no vertices.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point(point) => !(point.x().is_finite() && point.y().is_finite()),
            Self::LineString(line) => line.0.is_empty(),
            Self::Polygon(polygon) => polygon.exterior().0.is_empty(),
            Self::MultiLineString(lines) => lines.0.iter().all(|line| line.0.is_empty()),
            Self::MultiPolygon(polygons) => polygons
                .0
                .iter()
                .all(|polygon| polygon.exterior().0.is_empty()),
        }
    }

    /// WKT encoding.
    pub fn to_wkt(&self) -> String {
        to_wkt(self)
    }

    /// WKB encoding.
    pub fn to_wkb(&self) -> Vec<u8> {
        to_wkb(self)
    }
}

/// A finished geometry with its area, if it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltGeometry {
    /// The shape in working projection units.
    pub geometry: Geometry,
    /// Area in working projection units; present only when positive.
    pub area: Option<f64>,
}

impl BuiltGeometry {
    fn line(line: LineString<f64>) -> Self {
        Self {
            geometry: Geometry::LineString(line),
            area: None,
        }
    }

    fn areal(geometry: Geometry, area: f64) -> Self {
        Self {
            geometry,
            area: (area > 0.0).then_some(area),
        }
    }
}

/// A relation member way prepared for assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberWay {
    /// Way id, for diagnostics.
    pub id: crate::OsmId,
    /// Ring role, `None` when the role takes no part in ring assembly.
    pub role: Option<MemberRole>,
    /// Resolved positions of the way.
    pub nodes: NodeList,
}

/// Output of [`GeometryBuilder::assemble_relation`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    /// Polygon rows.
    pub polygons: Vec<BuiltGeometry>,
    /// Line rows.
    pub lines: Vec<BuiltGeometry>,
    /// Why the polygon branch produced nothing, if it failed.
    pub failure: Option<RingError>,
}

/// Builds projected geometry from resolved node lists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryBuilder {
    projection: Projection,
    split_at: f64,
    multi_geometry: bool,
}

impl GeometryBuilder {
    /// Builder for `projection` with its default split length.
    pub const fn new(projection: Projection) -> Self {
        Self {
            projection,
            split_at: projection.split_at(),
            multi_geometry: false,
        }
    }

    /// Override the split length. Non-positive values disable splitting.
    #[must_use]
    pub const fn with_split_at(mut self, split_at: f64) -> Self {
        self.split_at = split_at;
        self
    }

    /// Keep multi-part results as one geometry instead of one per part.
    #[must_use]
    pub const fn with_multi_geometry(mut self, multi_geometry: bool) -> Self {
        self.multi_geometry = multi_geometry;
        self
    }

    /// Working projection.
    pub const fn projection(&self) -> Projection {
        self.projection
    }

    /// Project a single position given as latitude and longitude.
    pub fn project_point(&self, lat: f64, lon: f64) -> Point<f64> {
        Point(self.projection.project(Coord { x: lon, y: lat }))
    }

    /// Build line pieces from a node list. Unresolved nodes are skipped and
    /// fewer than two distinct positions yield nothing.
    pub fn build_line(&self, nodes: &NodeList) -> Vec<BuiltGeometry> {
        let coords = self.project(&dedupe(nodes.resolved_coords()));
        split_line(&coords, self.split_at)
            .into_iter()
            .map(BuiltGeometry::line)
            .collect()
    }

    /// Build a polygon from an outer ring followed by inner rings, all
    /// unprojected. Returns `None` when the outer ring is not closed; inner
    /// rings that are not closed are dropped.
    pub fn build_polygon(&self, rings: Vec<Vec<Coord<f64>>>) -> Option<BuiltGeometry> {
        let mut rings = rings.into_iter();
        let outer = dedupe(rings.next()?);
        if !is_closed(&outer) {
            return None;
        }
        let inners: Vec<LineString<f64>> = rings
            .map(dedupe)
            .filter(|ring| is_closed(ring))
            .map(|ring| LineString::new(self.project(&ring)))
            .collect();
        let polygon = Polygon::new(LineString::new(self.project(&outer)), inners);
        let area = polygon.unsigned_area();
        Some(BuiltGeometry::areal(Geometry::Polygon(polygon), area))
    }

    /// Build a way: a polygon when requested and the way is closed,
    /// otherwise line pieces.
    pub fn build_way(&self, nodes: &NodeList, polygon: bool) -> Vec<BuiltGeometry> {
        if polygon {
            let ring: Vec<Coord<f64>> = nodes.resolved_coords().collect();
            if let Some(built) = self.build_polygon(vec![ring]) {
                return vec![built];
            }
        }
        self.build_line(nodes)
    }

    /// Assemble a relation's member ways.
    ///
    /// With `make_polygon` or `make_boundary`, outer and inner rings are
    /// closed and turned into polygons; a ring that fails to close empties
    /// the polygon branch and is reported in [`Assembly::failure`]. With
    /// `make_boundary`, or when neither flag is set, all member ways are
    /// also chained into lines.
    pub fn assemble_relation(
        &self,
        members: &[MemberWay],
        make_polygon: bool,
        make_boundary: bool,
    ) -> Assembly {
        let mut assembly = Assembly::default();
        if make_polygon || make_boundary {
            match self.build_multipolygon(members) {
                Ok(polygons) => assembly.polygons = polygons,
                Err(err) => assembly.failure = Some(err),
            }
        }
        if make_boundary || !make_polygon {
            assembly.lines = self.build_multilines(members);
        }
        assembly
    }

    /// Close rings and build polygons, honouring the multi-geometry setting.
    pub fn build_multipolygon(
        &self,
        members: &[MemberWay],
    ) -> Result<Vec<BuiltGeometry>, RingError> {
        let outers = close_rings(segments(members, Some(MemberRole::Outer)), MemberRole::Outer)?;
        let inners = close_rings(segments(members, Some(MemberRole::Inner)), MemberRole::Inner)?;
        let project_all = |rings: Vec<Vec<Coord<f64>>>| -> Vec<LineString<f64>> {
            rings
                .iter()
                .map(|ring| LineString::new(self.project(ring)))
                .collect()
        };
        let polygons = build_polygons(project_all(outers), project_all(inners));
        if polygons.is_empty() {
            return Ok(Vec::new());
        }

        if self.multi_geometry && polygons.len() > 1 {
            let multi = MultiPolygon::new(polygons);
            let area = multi.unsigned_area();
            return Ok(vec![BuiltGeometry::areal(Geometry::MultiPolygon(multi), area)]);
        }
        Ok(polygons
            .into_iter()
            .map(|polygon| {
                let area = polygon.unsigned_area();
                BuiltGeometry::areal(Geometry::Polygon(polygon), area)
            })
            .collect())
    }

    /// Chain every member way into lines, regardless of role.
    pub fn build_multilines(&self, members: &[MemberWay]) -> Vec<BuiltGeometry> {
        let lines: Vec<Vec<Coord<f64>>> = chain_segments(segments(members, None))
            .iter()
            .map(|line| self.project(line))
            .collect();
        if lines.is_empty() {
            return Vec::new();
        }
        if self.multi_geometry {
            let multi = MultiLineString::new(lines.into_iter().map(LineString::new).collect());
            return vec![BuiltGeometry {
                geometry: Geometry::MultiLineString(multi),
                area: None,
            }];
        }
        lines
            .iter()
            .flat_map(|line| split_line(line, self.split_at))
            .map(BuiltGeometry::line)
            .collect()
    }

    fn project(&self, coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
        coords
            .iter()
            .map(|coord| self.projection.project(*coord))
            .collect()
    }
}

/// Deduplicated resolved vertices of the members with `role`, or of every
/// member when `role` is `None`.
fn segments(members: &[MemberWay], role: Option<MemberRole>) -> Vec<Vec<Coord<f64>>> {
    members
        .iter()
        .filter(|member| role.is_none() || member.role == role)
        .map(|member| dedupe(member.nodes.resolved_coords()))
        .filter(|coords| coords.len() >= 2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn nodes(coords: &[(f64, f64)]) -> NodeList {
        let mut list = NodeList::unresolved(coords.len());
        for (idx, (x, y)) in coords.iter().enumerate() {
            list.fill(idx, Coord { x: *x, y: *y });
        }
        list
    }

    fn member(id: crate::OsmId, role: &str, coords: &[(f64, f64)]) -> MemberWay {
        MemberWay {
            id,
            role: MemberRole::from_role(role),
            nodes: nodes(coords),
        }
    }

    #[fixture]
    fn builder() -> GeometryBuilder {
        GeometryBuilder::new(Projection::Geographic)
    }

    #[rstest]
    fn line_skips_unresolved_nodes(builder: GeometryBuilder) {
        let mut list = nodes(&[(0.0, 0.0), (0.1, 0.0)]);
        list.coords.insert(1, crate::nodes::missing_coord());
        let built = builder.build_line(&list);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].area, None);
    }

    #[rstest]
    fn single_resolved_node_yields_no_line(builder: GeometryBuilder) {
        let list = nodes(&[(0.0, 0.0), (0.0, 0.0)]);
        assert!(builder.build_line(&list).is_empty());
    }

    #[rstest]
    fn closed_polygon_way_has_area(builder: GeometryBuilder) {
        let square = nodes(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        let built = builder.build_way(&square, true);
        assert_eq!(built.len(), 1);
        assert!(built[0].geometry.is_polygonal());
        assert_eq!(built[0].area, Some(1.0));
    }

    #[rstest]
    fn open_polygon_way_falls_back_to_line(builder: GeometryBuilder) {
        let open = nodes(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let built = builder.build_way(&open, true);
        assert_eq!(built.len(), 1);
        assert!(!built[0].geometry.is_polygonal());
    }

    #[rstest]
    fn zero_area_polygon_has_no_way_area(builder: GeometryBuilder) {
        let flat = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
            Coord { x: 0.0, y: 0.0 },
        ];
        let built = builder.build_polygon(vec![flat]).expect("closed ring");
        assert_eq!(built.area, None);
    }

    #[rstest]
    fn multipolygon_with_hole(builder: GeometryBuilder) {
        let members = [
            member(1, "outer", &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0)]),
            member(2, "outer", &[(4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            member(3, "inner", &[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0)]),
            member(4, "label", &[(9.0, 9.0), (9.5, 9.5)]),
        ];
        let assembly = builder.assemble_relation(&members, true, false);
        assert!(assembly.failure.is_none());
        assert!(assembly.lines.is_empty());
        assert_eq!(assembly.polygons.len(), 1);
        assert_eq!(assembly.polygons[0].area, Some(15.0));
    }

    #[rstest]
    fn unclosed_ring_fails_polygon_branch_only(builder: GeometryBuilder) {
        let members = [member(1, "outer", &[(0.0, 0.0), (0.4, 0.0), (0.4, 0.4)])];
        let assembly = builder.assemble_relation(&members, false, true);
        assert!(assembly.polygons.is_empty());
        assert!(matches!(assembly.failure, Some(RingError::Unclosed { .. })));
        assert_eq!(assembly.lines.len(), 1);
    }

    #[rstest]
    fn multi_geometry_merges_parts() {
        let builder = GeometryBuilder::new(Projection::Geographic).with_multi_geometry(true);
        let members = [
            member(1, "outer", &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            member(2, "outer", &[(5.0, 5.0), (6.0, 5.0), (6.0, 6.0), (5.0, 5.0)]),
        ];
        let polygons = builder.build_multipolygon(&members).expect("rings close");
        assert_eq!(polygons.len(), 1);
        assert!(matches!(polygons[0].geometry, Geometry::MultiPolygon(_)));
        assert_eq!(polygons[0].area, Some(1.0));
    }

    #[rstest]
    fn route_members_chain_into_lines(builder: GeometryBuilder) {
        let members = [
            member(1, "", &[(0.0, 0.0), (0.1, 0.0)]),
            member(2, "forward", &[(0.2, 0.0), (0.1, 0.0)]),
        ];
        let assembly = builder.assemble_relation(&members, false, false);
        assert_eq!(assembly.lines.len(), 1);
        let Geometry::LineString(line) = &assembly.lines[0].geometry else {
            panic!("expected a linestring");
        };
        assert_eq!(line.0.len(), 3);
    }

    #[rstest]
    fn mercator_output_is_in_metres() {
        let builder = GeometryBuilder::new(Projection::WebMercator);
        let point = builder.project_point(0.0, 1.0);
        assert!((point.x() - 111_319.490_793_273_57).abs() < 1e-6);
    }
}
