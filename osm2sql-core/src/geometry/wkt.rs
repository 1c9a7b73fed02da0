//! Well-Known Text encoding.

use std::fmt::Write;

use geo::{Coord, LineString, Polygon};

use super::Geometry;

/// Encode a geometry as WKT. Ordinates use the shortest decimal form that
/// round-trips.
pub fn to_wkt(geometry: &Geometry) -> String {
    let mut out = String::new();
    match geometry {
        Geometry::Point(point) => {
            out.push_str("POINT(");
            push_coord(&mut out, point.0);
            out.push(')');
        }
        Geometry::LineString(line) => {
            out.push_str("LINESTRING");
            push_line(&mut out, line);
        }
        Geometry::Polygon(polygon) => {
            out.push_str("POLYGON");
            push_polygon(&mut out, polygon);
        }
        Geometry::MultiLineString(lines) => {
            out.push_str("MULTILINESTRING(");
            for (idx, line) in lines.0.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                push_line(&mut out, line);
            }
            out.push(')');
        }
        Geometry::MultiPolygon(polygons) => {
            out.push_str("MULTIPOLYGON(");
            for (idx, polygon) in polygons.0.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                push_polygon(&mut out, polygon);
            }
            out.push(')');
        }
    }
    out
}

fn push_coord(out: &mut String, coord: Coord<f64>) {
    let _ = write!(out, "{} {}", coord.x, coord.y);
}

fn push_line(out: &mut String, line: &LineString<f64>) {
    out.push('(');
    for (idx, coord) in line.0.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        push_coord(out, *coord);
    }
    out.push(')');
}

fn push_polygon(out: &mut String, polygon: &Polygon<f64>) {
    out.push('(');
    push_line(out, polygon.exterior());
    for ring in polygon.interiors() {
        out.push(',');
        push_line(out, ring);
    }
    out.push(')');
}
