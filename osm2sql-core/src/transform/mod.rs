//! Tag filtering and entity classification.
//!
//! [`TagTransform`] decides whether an entity is exported, whether a way is
//! an area, and which style flags its tags carry. It also strips tags that
//! style rules delete and adds the synthetic `z_order` tag.

use log::trace;

use crate::{ExportRegistry, HstoreMode, OsmType, TagFlags, TagList};

mod relation;
mod z_order;

pub use relation::{RelationKind, RelationPlan, route_tags};
pub use z_order::{ZOrder, add_z_order, z_order};

/// Outcome of [`TagTransform::classify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    /// Whether the entity is exported at all.
    pub keep: bool,
    /// Whether a closed way is rendered as an area.
    pub polygon: bool,
    /// Union of the flags of every matched rule.
    pub flags: TagFlags,
}

/// Options that shape tag filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSettings {
    /// Key prefixes exported as separate JSON columns; matching tags keep
    /// the entity.
    pub hstore_columns: Vec<String>,
    /// Entities are kept only when a tag matched a column rule, even if the
    /// JSON tags column would take their other tags.
    pub hstore_match_only: bool,
    /// Keep `natural=coastline` and treat it as an area.
    pub keep_coastlines: bool,
}

/// Style-driven tag filter shared by every output stage.
#[derive(Debug, Clone)]
pub struct TagTransform {
    registry: ExportRegistry,
    settings: TransformSettings,
}

impl TagTransform {
    /// Build a transform from a parsed style.
    pub const fn new(registry: ExportRegistry, settings: TransformSettings) -> Self {
        Self { registry, settings }
    }

    /// The style this transform applies.
    pub const fn registry(&self) -> &ExportRegistry {
        &self.registry
    }

    /// Filtering options in use.
    pub const fn settings(&self) -> &TransformSettings {
        &self.settings
    }

    /// Filter `tags` in place and classify the entity.
    ///
    /// Localised `name:xx` values are first folded into `name` (see
    /// [`merge_names`]). Tags matched by a delete rule are removed, as is `natural=coastline`
    /// unless coastlines are kept. Tags without a rule stay only when a JSON
    /// column can take them. `area=yes|true|1` forces an area and
    /// `area=no|false|0` forces a line; otherwise the entity is an area iff a
    /// matched rule carries the polygon flag.
    pub fn classify(&self, kind: OsmType, tags: &mut TagList) -> Classification {
        merge_names(tags);
        let hstore = self.registry.hstore();
        let mut keep = false;
        let mut coastline = false;
        let mut flags = TagFlags::NONE;

        tags.retain(|tag| {
            if tag.key == "natural" && tag.value == "coastline" {
                if !self.settings.keep_coastlines {
                    return false;
                }
                coastline = true;
            }
            match self.registry.find(kind, &tag.key) {
                Some(rule) if rule.flags.contains(TagFlags::DELETE) => false,
                Some(rule) => {
                    keep = true;
                    flags |= rule.flags;
                    true
                }
                None if self.in_hstore_column(&tag.key) => {
                    keep = true;
                    true
                }
                None => match hstore {
                    HstoreMode::None => false,
                    HstoreMode::Norm | HstoreMode::All => {
                        keep |= !self.settings.hstore_match_only;
                        true
                    }
                },
            }
        });

        let mut polygon = flags.contains(TagFlags::POLYGON) || coastline;
        if tags.is_true("area") {
            polygon = true;
        } else if tags.is_false("area") {
            polygon = false;
        }
        Classification {
            keep,
            polygon,
            flags,
        }
    }

    /// Tags of `tags` whose key marks a way as an area.
    pub fn polygon_tags(&self, tags: &TagList) -> TagList {
        tags.pairs()
            .filter(|(key, _)| self.registry.tag_indicates_polygon(OsmType::Way, key))
            .collect()
    }

    fn in_hstore_column(&self, key: &str) -> bool {
        self.settings
            .hstore_columns
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    }
}

/// Append localised `name:xx` values to `name`, space separated.
///
/// `name` keeps its place at the front. `name:source` is skipped, as is any
/// value already part of the merged name. A tag set without `name:xx` tags
/// is left untouched.
pub fn merge_names(tags: &mut TagList) {
    let mut parts: Vec<&str> = tags.get("name").into_iter().collect();
    let mut localised = false;
    for tag in tags.with_prefix("name:") {
        localised = true;
        if tag.key == "name:source" || tag.value.is_empty() || parts.contains(&tag.value.as_str())
        {
            continue;
        }
        parts.push(tag.value.as_str());
    }
    if !localised || parts.is_empty() {
        return;
    }
    let merged = parts.join(" ");
    trace!("merged name {merged:?}");
    tags.set("name", merged);
}
