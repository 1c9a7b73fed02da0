//! Core of the osm2sql importer.
//!
//! The crate turns a stream of OpenStreetMap entities into geometry-bearing
//! rows. Entities are kept in a middle store ([`middle`]) so later stages can
//! resolve way shapes and relation members by id; a style-driven
//! [`transform`] decides what is exported and whether a way is an area; the
//! [`geometry`] builder assembles lines, polygons and multipolygons; and the
//! [`output`] pipeline routes finished rows to a [`table::TableWriter`].
//!
//! Input readers and the SQLite backends live in `osm2sql-data`.
//!
//! # Examples
//!
//! ```
//! use osm2sql_core::geometry::{GeometryBuilder, Projection};
//! use osm2sql_core::middle::RamMiddle;
//! use osm2sql_core::output::{Output, OutputOptions};
//! use osm2sql_core::test_support::{RecordingWriter, test_transform};
//! use osm2sql_core::transform::TransformSettings;
//! use osm2sql_core::{HstoreMode, Node, TagList};
//!
//! # fn main() -> Result<(), osm2sql_core::output::OutputError> {
//! let mut output = Output::new(
//!     RamMiddle::default(),
//!     RecordingWriter::default(),
//!     test_transform(HstoreMode::None, TransformSettings::default()),
//!     GeometryBuilder::new(Projection::Geographic),
//!     OutputOptions::default(),
//! );
//! output.start()?;
//! output.node_add(Node {
//!     id: 1,
//!     lat: 51.5,
//!     lon: -0.1,
//!     tags: TagList::from([("amenity", "cafe")]),
//! })?;
//! let stats = output.finish()?;
//! assert_eq!(stats.rows, 1);
//! # Ok(())
//! # }
//! ```

pub mod geometry;
pub mod middle;
mod nodes;
mod osm;
pub mod output;
mod style;
pub mod table;
mod tags;
pub mod transform;

pub use nodes::{
    CacheStrategy, DEFAULT_SCALE, NodeCache, NodeCacheConfig, NodeCacheError, NodeList,
    is_resolved, missing_coord,
};
pub use osm::{ChangeAction, Element, Member, Node, OsmId, OsmType, Relation, Way};
pub use style::{
    DEFAULT_STYLE, ExportRegistry, ExportRule, HstoreMode, StyleError, TagFlags,
};
pub use tags::{Tag, TagList, is_falsy, is_truthy};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
