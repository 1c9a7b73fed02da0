//! Well-Known Binary encoding (little endian, no SRID).

use std::fmt::Write;

use geo::{Coord, LineString, Polygon};

use super::Geometry;

const LITTLE_ENDIAN: u8 = 1;

/// WKB geometry type codes.
pub(crate) mod type_code {
    pub const POINT: u32 = 1;
    pub const LINESTRING: u32 = 2;
    pub const POLYGON: u32 = 3;
    pub const MULTILINESTRING: u32 = 5;
    pub const MULTIPOLYGON: u32 = 6;
}

/// Encode a geometry as WKB.
pub fn to_wkb(geometry: &Geometry) -> Vec<u8> {
    let mut out = Vec::new();
    write_geometry(&mut out, geometry);
    out
}

/// Upper-case hex rendering of a WKB buffer.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Geometry type code of a WKB buffer, honouring its byte order marker.
pub fn type_of(bytes: &[u8]) -> Option<u32> {
    let order = *bytes.first()?;
    let raw: [u8; 4] = bytes.get(1..5)?.try_into().ok()?;
    Some(match order {
        LITTLE_ENDIAN => u32::from_le_bytes(raw),
        _ => u32::from_be_bytes(raw),
    })
}

fn write_geometry(out: &mut Vec<u8>, geometry: &Geometry) {
    match geometry {
        Geometry::Point(point) => {
            header(out, type_code::POINT);
            coord(out, point.0);
        }
        Geometry::LineString(line) => {
            header(out, type_code::LINESTRING);
            line_body(out, line);
        }
        Geometry::Polygon(polygon) => {
            header(out, type_code::POLYGON);
            polygon_body(out, polygon);
        }
        Geometry::MultiLineString(lines) => {
            header(out, type_code::MULTILINESTRING);
            count(out, lines.0.len());
            for line in &lines.0 {
                header(out, type_code::LINESTRING);
                line_body(out, line);
            }
        }
        Geometry::MultiPolygon(polygons) => {
            header(out, type_code::MULTIPOLYGON);
            count(out, polygons.0.len());
            for polygon in &polygons.0 {
                header(out, type_code::POLYGON);
                polygon_body(out, polygon);
            }
        }
    }
}

fn header(out: &mut Vec<u8>, code: u32) {
    out.push(LITTLE_ENDIAN);
    out.extend_from_slice(&code.to_le_bytes());
}

fn count(out: &mut Vec<u8>, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
}

fn coord(out: &mut Vec<u8>, coord: Coord<f64>) {
    out.extend_from_slice(&coord.x.to_le_bytes());
    out.extend_from_slice(&coord.y.to_le_bytes());
}

fn line_body(out: &mut Vec<u8>, line: &LineString<f64>) {
    count(out, line.0.len());
    for c in &line.0 {
        coord(out, *c);
    }
}

fn polygon_body(out: &mut Vec<u8>, polygon: &Polygon<f64>) {
    count(out, 1 + polygon.interiors().len());
    line_body(out, polygon.exterior());
    for ring in polygon.interiors() {
        line_body(out, ring);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, line_string, polygon};
    use rstest::rstest;

    #[rstest]
    fn point_matches_reference_encoding() {
        let wkb = to_wkb(&Geometry::Point(Point::new(1.0, 2.0)));
        assert_eq!(
            to_hex(&wkb),
            "0101000000000000000000F03F0000000000000040"
        );
    }

    #[rstest]
    fn linestring_layout() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let wkb = to_wkb(&Geometry::LineString(line));
        assert_eq!(wkb.len(), 1 + 4 + 4 + 2 * 16);
        assert_eq!(type_of(&wkb), Some(type_code::LINESTRING));
    }

    #[rstest]
    fn polygon_counts_rings() {
        let shape = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let wkb = to_wkb(&Geometry::Polygon(shape));
        assert_eq!(type_of(&wkb), Some(type_code::POLYGON));
        assert_eq!(wkb.get(5..9), Some(&1_u32.to_le_bytes()[..]));
        assert_eq!(wkb.get(9..13), Some(&4_u32.to_le_bytes()[..]));
    }

    #[rstest]
    fn type_of_rejects_short_buffers() {
        assert_eq!(type_of(&[1, 2]), None);
    }
}
