//! Rendering priority and roads-table membership.

use crate::TagList;

/// `(highway value, z offset, roads table)`.
const HIGHWAY_LAYERS: &[(&str, i64, bool)] = &[
    ("minor", 3, false),
    ("road", 3, false),
    ("unclassified", 3, false),
    ("residential", 3, false),
    ("tertiary_link", 4, false),
    ("tertiary", 4, false),
    ("secondary_link", 6, true),
    ("secondary", 6, true),
    ("primary_link", 7, true),
    ("primary", 7, true),
    ("trunk_link", 8, true),
    ("trunk", 8, true),
    ("motorway_link", 9, true),
    ("motorway", 9, true),
];

/// Result of [`z_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZOrder {
    /// Rendering priority.
    pub value: i64,
    /// Whether the entity also goes to the roads table.
    pub roads: bool,
}

/// Compute the z-order of a tag set without modifying it.
pub fn z_order(tags: &TagList) -> ZOrder {
    let layer = tags.get("layer").map_or(0, leading_integer);
    let mut value = layer.saturating_mul(10);
    let mut roads = false;

    if let Some(highway) = tags.get("highway")
        && let Some((_, offset, is_road)) = HIGHWAY_LAYERS
            .iter()
            .find(|(name, _, _)| *name == highway)
    {
        value += offset;
        roads = *is_road;
    }
    if tags.get("railway").is_some_and(|railway| !railway.is_empty()) {
        value += 5;
        roads = true;
    }
    if tags.get("boundary") == Some("administrative") {
        roads = true;
    }
    if tags.is_true("bridge") {
        value += 10;
    }
    if tags.is_true("tunnel") {
        value -= 10;
    }
    ZOrder { value, roads }
}

/// Store the synthetic `z_order` tag, replacing any user-supplied value, and
/// report roads membership.
pub fn add_z_order(tags: &mut TagList) -> bool {
    let computed = z_order(tags);
    tags.set("z_order", computed.value.to_string());
    computed.roads
}

/// Integer prefix of `text`, 0 when there is none; saturates on overflow.
fn leading_integer(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, trimmed.get(1..).unwrap_or_default()),
        Some(b'+') => (false, trimmed.get(1..).unwrap_or_default()),
        _ => (false, trimmed),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0_i64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
        });
    if negative { -magnitude } else { magnitude }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[("highway", "secondary")], 6, true)]
    #[case(&[("highway", "motorway"), ("bridge", "yes"), ("layer", "1")], 29, true)]
    #[case(&[("highway", "residential")], 3, false)]
    #[case(&[("highway", "footway")], 0, false)]
    #[case(&[("railway", "rail"), ("tunnel", "true")], -5, true)]
    #[case(&[("boundary", "administrative")], 0, true)]
    #[case(&[("highway", "primary"), ("layer", "-2")], -13, true)]
    #[case(&[("highway", "trunk"), ("bridge", "no")], 8, true)]
    #[case(&[("layer", "2;3")], 20, false)]
    #[case(&[("layer", "bogus")], 0, false)]
    fn computes_z_order(
        #[case] tags: &[(&str, &str)],
        #[case] value: i64,
        #[case] roads: bool,
    ) {
        let tags: TagList = tags.iter().copied().collect();
        assert_eq!(z_order(&tags), ZOrder { value, roads });
    }

    #[rstest]
    fn synthetic_tag_replaces_user_value() {
        let mut tags = TagList::from([("z_order", "99"), ("highway", "tertiary")]);
        let roads = add_z_order(&mut tags);
        assert!(!roads);
        assert_eq!(tags.get("z_order"), Some("4"));
        assert_eq!(tags.len(), 2);
    }
}
