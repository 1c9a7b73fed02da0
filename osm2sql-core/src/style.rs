//! Export rule registry loaded from a style file.
//!
//! Each non-comment line reads
//! `<node|way|node,way> <key> <column-type> [flags]`. The registry is built
//! once at startup and passed by reference to the transform and the table
//! writers.

use std::fmt;
use std::io::BufRead;
use std::ops::{BitOr, BitOrAssign};

use log::warn;
use thiserror::Error;

use crate::OsmType;

/// Style bundled with the crate, used when no style file is configured.
pub const DEFAULT_STYLE: &str = include_str!("../default.style");

/// Flags attached to an export rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TagFlags(u8);

impl TagFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Key marks the entity as an area.
    pub const POLYGON: Self = Self(1);
    /// Key marks the entity as linear.
    pub const LINEAR: Self = Self(2);
    /// Nodes carrying only this key are not kept in the node cache.
    pub const NOCACHE: Self = Self(4);
    /// Key is removed on sight.
    pub const DELETE: Self = Self(8);
    /// Polygon key without its own column, exported through the JSON tags
    /// column. Implies [`TagFlags::POLYGON`].
    pub const PHSTORE: Self = Self(16 | 1);

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bits are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "polygon" => Some(Self::POLYGON),
            "linear" => Some(Self::LINEAR),
            "nocache" => Some(Self::NOCACHE),
            "delete" => Some(Self::DELETE),
            "phstore" => Some(Self::PHSTORE),
            _ => None,
        }
    }
}

impl BitOr for TagFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TagFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// How tags without a dedicated column are exported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HstoreMode {
    /// Tags without a column are dropped.
    #[default]
    None,
    /// Tags without a column go to the JSON `tags` column.
    Norm,
    /// Every tag goes to the JSON `tags` column and keeps the entity.
    All,
}

impl HstoreMode {
    /// Whether a JSON `tags` column exists.
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A single style rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRule {
    /// Tag key, possibly with `*`/`?` wildcards for delete rules.
    pub key: String,
    /// Column type as written in the style file, for example `text`.
    pub column_type: String,
    /// Rule flags.
    pub flags: TagFlags,
}

impl ExportRule {
    /// Whether `key` matches this rule, honouring wildcards.
    pub fn matches(&self, key: &str) -> bool {
        wildcard_match(&self.key, key)
    }

    /// Whether the rule produces a table column.
    pub const fn has_column(&self) -> bool {
        !self.flags.contains(TagFlags::DELETE) && !self.flags.contains(TagFlags::PHSTORE)
    }
}

/// Errors raised while loading a style file. All are fatal.
#[derive(Debug, Error)]
pub enum StyleError {
    /// Reading the style source failed.
    #[error("failed to read style file")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A line had fewer than three fields.
    #[error("error reading style file line {line} (fields={fields})")]
    TooFewFields {
        /// One-based line number.
        line: usize,
        /// Number of fields found.
        fields: usize,
    },
    /// The object type named neither `node` nor `way`.
    #[error("style line {line} applies to unknown object type {object_type:?}")]
    UnknownObjectType {
        /// One-based line number.
        line: usize,
        /// Object type as written.
        object_type: String,
    },
    /// `phstore` was used while the JSON tags column is disabled.
    #[error("style line {line}: flag 'phstore' is invalid in non-hstore mode")]
    PhstoreWithoutHstore {
        /// One-based line number.
        line: usize,
    },
    /// A wildcard appeared in a rule that is not a delete rule.
    #[error("style line {line}: wildcard {key:?} in non-delete style entry")]
    WildcardNotDelete {
        /// One-based line number.
        line: usize,
        /// Offending key.
        key: String,
    },
    /// The source contained no rules.
    #[error("unable to parse any valid columns from the style file")]
    NoRules,
}

/// Export rules per object type. Relations use the way rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRegistry {
    node_rules: Vec<ExportRule>,
    way_rules: Vec<ExportRule>,
    hstore: HstoreMode,
}

impl ExportRegistry {
    /// Parse a style from any buffered reader.
    pub fn parse<R: BufRead>(reader: R, hstore: HstoreMode) -> Result<Self, StyleError> {
        let mut registry = Self {
            hstore,
            ..Self::default()
        };
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| StyleError::Read { source })?;
            registry.parse_line(idx + 1, &line)?;
        }
        if registry.node_rules.is_empty() && registry.way_rules.is_empty() {
            return Err(StyleError::NoRules);
        }
        Ok(registry)
    }

    /// Parse a style held in memory.
    pub fn parse_str(source: &str, hstore: HstoreMode) -> Result<Self, StyleError> {
        Self::parse(source.as_bytes(), hstore)
    }

    /// Parse the bundled [`DEFAULT_STYLE`].
    pub fn bundled(hstore: HstoreMode) -> Result<Self, StyleError> {
        Self::parse_str(DEFAULT_STYLE, hstore)
    }

    fn parse_line(&mut self, line: usize, text: &str) -> Result<(), StyleError> {
        let content = text.split('#').next().unwrap_or_default();
        let fields: Vec<&str> = content.split_whitespace().take(4).collect();
        let (object_type, key, column_type) = match fields.as_slice() {
            [] => return Ok(()),
            [object_type, key, column_type, ..] => (*object_type, *key, *column_type),
            short => {
                return Err(StyleError::TooFewFields {
                    line,
                    fields: short.len(),
                });
            }
        };

        let mut flags = TagFlags::NONE;
        for name in fields.get(3).into_iter().flat_map(|raw| raw.split(',')) {
            if name.is_empty() {
                continue;
            }
            match TagFlags::from_name(name) {
                Some(flag) => flags |= flag,
                None => warn!("Unknown flag '{name}' line {line}, ignored"),
            }
        }

        if flags.contains(TagFlags::PHSTORE) && !self.hstore.is_enabled() {
            return Err(StyleError::PhstoreWithoutHstore { line });
        }
        if !flags.contains(TagFlags::DELETE) && key.contains(['*', '?']) {
            return Err(StyleError::WildcardNotDelete {
                line,
                key: key.to_owned(),
            });
        }

        let rule = ExportRule {
            key: key.to_owned(),
            column_type: column_type.to_owned(),
            flags,
        };
        let for_nodes = object_type.contains("node");
        let for_ways = object_type.contains("way");
        if !for_nodes && !for_ways {
            return Err(StyleError::UnknownObjectType {
                line,
                object_type: object_type.to_owned(),
            });
        }
        if for_nodes {
            self.node_rules.push(rule.clone());
        }
        if for_ways {
            self.way_rules.push(rule);
        }
        Ok(())
    }

    /// Rules applying to `kind`.
    pub fn rules(&self, kind: OsmType) -> &[ExportRule] {
        match kind {
            OsmType::Node => &self.node_rules,
            OsmType::Way | OsmType::Relation => &self.way_rules,
        }
    }

    /// First rule matching `key` for `kind`.
    pub fn find(&self, kind: OsmType, key: &str) -> Option<&ExportRule> {
        self.rules(kind).iter().find(|rule| rule.matches(key))
    }

    /// Rules that produce table columns for `kind`, first occurrence of each
    /// key only.
    pub fn columns(&self, kind: OsmType) -> Vec<&ExportRule> {
        let mut seen = std::collections::HashSet::new();
        self.rules(kind)
            .iter()
            .filter(|rule| rule.has_column() && seen.insert(rule.key.as_str()))
            .collect()
    }

    /// Whether `key` marks an entity of `kind` as a polygon.
    pub fn tag_indicates_polygon(&self, kind: OsmType, key: &str) -> bool {
        key == "area"
            || self
                .find(kind, key)
                .is_some_and(|rule| rule.flags.contains(TagFlags::POLYGON))
    }

    /// Configured JSON tags mode.
    pub const fn hstore(&self) -> HstoreMode {
        self.hstore
    }
}

impl fmt::Display for ExportRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.column_type)
    }
}

/// Match a style key against a delete rule's key pattern.
///
/// Style files allow `*` (any run of characters) and `?` (exactly one
/// character) in delete rule keys; everything else matches literally.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&ch) if ch == '?' || text.get(t) == Some(&ch) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern.get(p..).is_some_and(|rest| rest.iter().all(|ch| *ch == '*'))
}
