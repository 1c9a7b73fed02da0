//! Output table boundary.
//!
//! Backends implement [`TableWriter`] once for all four output tables. Calls
//! between [`TableWriter::begin`] and [`TableWriter::commit`] form one batch;
//! a failed call is fatal and never retried.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::geometry::{Geometry, to_hex, wkb_type_of};
use crate::{OsmId, TagList};

/// The output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    /// Exported nodes.
    Point,
    /// Linear ways and relations.
    Line,
    /// Areas.
    Polygon,
    /// Low-zoom subset of the line table.
    Roads,
}

impl TableId {
    /// All tables in creation order.
    pub const ALL: [Self; 4] = [Self::Point, Self::Line, Self::Polygon, Self::Roads];

    /// Tables a way or relation row may live in.
    pub const WAY_TABLES: [Self; 3] = [Self::Line, Self::Polygon, Self::Roads];

    /// Table name suffix.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
            Self::Roads => "roads",
        }
    }

    /// Full table name, `<prefix>_<suffix>`.
    pub fn name(self, prefix: &str) -> String {
        format!("{prefix}_{}", self.suffix())
    }

    /// Tables a geometry is routed to. Polygonal geometry goes to the
    /// polygon table, anything else to the line table. Roads are also
    /// written to the roads table.
    pub fn route(geometry: &EncodedGeometry, roads: bool) -> Vec<Self> {
        let primary = if geometry.is_polygonal() {
            Self::Polygon
        } else {
            Self::Line
        };
        if roads {
            vec![primary, Self::Roads]
        } else {
            vec![primary]
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Geometry interchange format at the writer boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeometryFormat {
    /// Well-Known Text.
    #[default]
    Wkt,
    /// Well-Known Binary.
    Wkb,
}

/// Error returned when a geometry format name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown geometry format {0:?}; expected wkt or wkb")]
pub struct ParseGeometryFormatError(pub String);

impl FromStr for GeometryFormat {
    type Err = ParseGeometryFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wkt" => Ok(Self::Wkt),
            "wkb" => Ok(Self::Wkb),
            _ => Err(ParseGeometryFormatError(s.to_owned())),
        }
    }
}

/// A geometry encoded for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedGeometry {
    /// WKT text.
    Wkt(String),
    /// Raw WKB bytes.
    Wkb(Vec<u8>),
}

impl EncodedGeometry {
    /// Encode `geometry` in `format`.
    pub fn encode(geometry: &Geometry, format: GeometryFormat) -> Self {
        match format {
            GeometryFormat::Wkt => Self::Wkt(geometry.to_wkt()),
            GeometryFormat::Wkb => Self::Wkb(geometry.to_wkb()),
        }
    }

    /// Whether the geometry is a polygon or multipolygon. WKT is matched on
    /// its case-sensitive `POLYGON`/`MULTIPOLYGON` prefix.
    pub fn is_polygonal(&self) -> bool {
        match self {
            Self::Wkt(text) => text.starts_with("POLYGON") || text.starts_with("MULTIPOLYGON"),
            Self::Wkb(bytes) => matches!(wkb_type_of(bytes), Some(3 | 6)),
        }
    }

    /// Text form: WKT as is, WKB as upper-case hex.
    pub fn to_text(&self) -> String {
        match self {
            Self::Wkt(text) => text.clone(),
            Self::Wkb(bytes) => to_hex(bytes),
        }
    }
}

/// Errors raised at the writer boundary. All are fatal.
#[derive(Debug, Error)]
pub enum TableError {
    /// A write was attempted outside a batch.
    #[error("{operation} on table {table} called outside a batch")]
    NoBatch {
        /// Rejected operation.
        operation: &'static str,
        /// Target table.
        table: TableId,
    },
    /// The backend rejected an operation.
    #[error("table backend failed during {operation}")]
    Backend {
        /// Failing operation.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TableError {
    /// Wrap a backend-specific error.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Sink for finished rows.
pub trait TableWriter {
    /// Open a batch.
    fn begin(&mut self) -> Result<(), TableError>;

    /// Make every write since [`TableWriter::begin`] durable.
    fn commit(&mut self) -> Result<(), TableError>;

    /// Write an exported node to the point table. Coordinates are in the
    /// working projection, `lat` being the northing.
    fn write_node(&mut self, id: OsmId, tags: &TagList, lat: f64, lon: f64)
    -> Result<(), TableError>;

    /// Write a way or relation row.
    fn write_row(
        &mut self,
        table: TableId,
        id: OsmId,
        tags: &TagList,
        geometry: &EncodedGeometry,
    ) -> Result<(), TableError>;

    /// Remove every row of `table` with `osm_id = id`.
    fn delete_row(&mut self, table: TableId, id: OsmId) -> Result<(), TableError>;
}

impl<W: TableWriter + ?Sized> TableWriter for Box<W> {
    fn begin(&mut self) -> Result<(), TableError> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<(), TableError> {
        (**self).commit()
    }

    fn write_node(
        &mut self,
        id: OsmId,
        tags: &TagList,
        lat: f64,
        lon: f64,
    ) -> Result<(), TableError> {
        (**self).write_node(id, tags, lat, lon)
    }

    fn write_row(
        &mut self,
        table: TableId,
        id: OsmId,
        tags: &TagList,
        geometry: &EncodedGeometry,
    ) -> Result<(), TableError> {
        (**self).write_row(table, id, tags, geometry)
    }

    fn delete_row(&mut self, table: TableId, id: OsmId) -> Result<(), TableError> {
        (**self).delete_row(table, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, line_string, polygon};
    use rstest::rstest;

    #[rstest]
    #[case(EncodedGeometry::Wkt("POLYGON((0 0,1 0,1 1,0 0))".into()), false, vec![TableId::Polygon])]
    #[case(EncodedGeometry::Wkt("MULTIPOLYGON(((0 0,1 0,1 1,0 0)))".into()), true, vec![TableId::Polygon, TableId::Roads])]
    #[case(EncodedGeometry::Wkt("LINESTRING(0 0,1 1)".into()), true, vec![TableId::Line, TableId::Roads])]
    #[case(EncodedGeometry::Wkt("LINESTRING(0 0,1 1)".into()), false, vec![TableId::Line])]
    #[case(EncodedGeometry::Wkt("polygon((0 0,1 0,1 1,0 0))".into()), false, vec![TableId::Line])]
    fn routes_by_prefix(
        #[case] geometry: EncodedGeometry,
        #[case] roads: bool,
        #[case] expected: Vec<TableId>,
    ) {
        assert_eq!(TableId::route(&geometry, roads), expected);
    }

    #[rstest]
    fn wkb_routing_reads_type_code() {
        let shape = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let encoded = EncodedGeometry::encode(&Geometry::Polygon(shape), GeometryFormat::Wkb);
        assert!(encoded.is_polygonal());

        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let encoded = EncodedGeometry::encode(&Geometry::LineString(line), GeometryFormat::Wkb);
        assert!(!encoded.is_polygonal());
    }

    #[rstest]
    fn text_form_of_wkb_is_hex() {
        let encoded =
            EncodedGeometry::encode(&Geometry::Point(Point::new(1.0, 2.0)), GeometryFormat::Wkb);
        assert_eq!(encoded.to_text(), "0101000000000000000000F03F0000000000000040");
    }

    #[rstest]
    fn table_names_use_prefix() {
        assert_eq!(TableId::Roads.name("planet_osm"), "planet_osm_roads");
    }

    #[rstest]
    #[case("WKT", GeometryFormat::Wkt)]
    #[case("wkb", GeometryFormat::Wkb)]
    fn parses_formats(#[case] name: &str, #[case] expected: GeometryFormat) {
        assert_eq!(name.parse::<GeometryFormat>(), Ok(expected));
    }
}
