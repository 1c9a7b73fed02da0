//! Line construction: duplicate removal, splitting and chaining.

use geo::{Coord, Distance, Euclidean, LineString, Point};

/// Drop consecutive duplicate vertices.
pub fn dedupe<I>(coords: I) -> Vec<Coord<f64>>
where
    I: IntoIterator<Item = Coord<f64>>,
{
    let mut out: Vec<Coord<f64>> = Vec::new();
    for coord in coords {
        if out.last() != Some(&coord) {
            out.push(coord);
        }
    }
    out
}

/// Split a vertex sequence once the cumulative length exceeds `split_at`.
///
/// Splits happen at vertices only, so a single segment longer than the
/// threshold stays whole. Consecutive pieces share their join vertex.
/// Sequences with fewer than two vertices yield nothing. A non-positive or
/// non-finite threshold disables splitting.
pub fn split_line(coords: &[Coord<f64>], split_at: f64) -> Vec<LineString<f64>> {
    if coords.len() < 2 {
        return Vec::new();
    }
    if !(split_at.is_finite() && split_at > 0.0) {
        return vec![LineString::new(coords.to_vec())];
    }

    let mut pieces = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    let mut length = 0.0;
    for (idx, coord) in coords.iter().enumerate() {
        if let Some(prev) = idx.checked_sub(1).and_then(|p| coords.get(p)) {
            length += Euclidean.distance(Point::from(*prev), Point::from(*coord));
        }
        current.push(*coord);
        if length > split_at && current.len() >= 2 {
            pieces.push(LineString::new(std::mem::replace(&mut current, vec![*coord])));
            length = 0.0;
        }
    }
    if current.len() >= 2 {
        pieces.push(LineString::new(current));
    }
    pieces
}

/// Join segments sharing endpoints into maximal lines.
///
/// Segments are taken in order; each is extended at its tail, then at its
/// head, with any unused segment sharing that endpoint (reversed when
/// needed). Segments with fewer than two vertices are ignored.
pub fn chain_segments(segments: Vec<Vec<Coord<f64>>>) -> Vec<Vec<Coord<f64>>> {
    let mut pool: Vec<Option<Vec<Coord<f64>>>> = segments
        .into_iter()
        .filter(|segment| segment.len() >= 2)
        .map(Some)
        .collect();
    let mut lines = Vec::new();

    for idx in 0..pool.len() {
        let Some(mut line) = pool.get_mut(idx).and_then(Option::take) else {
            continue;
        };
        while extend_tail(&mut line, &mut pool) {}
        line.reverse();
        while extend_tail(&mut line, &mut pool) {}
        line.reverse();
        lines.push(line);
    }
    lines
}

/// Append one unused segment touching the tail of `line`. Returns whether
/// anything was appended. Closed lines are never extended.
pub(crate) fn extend_tail(
    line: &mut Vec<Coord<f64>>,
    pool: &mut [Option<Vec<Coord<f64>>>],
) -> bool {
    let (Some(first), Some(tail)) = (line.first().copied(), line.last().copied()) else {
        return false;
    };
    if line.len() > 2 && first == tail {
        return false;
    }
    for slot in pool.iter_mut() {
        let Some(segment) = slot.as_ref() else {
            continue;
        };
        let reversed = if segment.first() == Some(&tail) {
            false
        } else if segment.last() == Some(&tail) {
            true
        } else {
            continue;
        };
        let Some(mut segment) = slot.take() else {
            continue;
        };
        if reversed {
            segment.reverse();
        }
        line.extend(segment.into_iter().skip(1));
        return true;
    }
    false
}
