//! Facade crate for the osm2sql importer.
//!
//! This crate re-exports the pipeline types and exposes the SQLite backends
//! and input readers behind the `sqlite` feature.

#![forbid(unsafe_code)]

pub use osm2sql_core::geometry::{GeometryBuilder, Projection};
pub use osm2sql_core::middle::{Middle, MiddleError, MiddleQuery, RamMiddle};
pub use osm2sql_core::output::{Output, OutputError, OutputOptions, OutputStats};
pub use osm2sql_core::table::{EncodedGeometry, GeometryFormat, TableError, TableId, TableWriter};
pub use osm2sql_core::transform::{TagTransform, TransformSettings};
pub use osm2sql_core::{
    CacheStrategy, ChangeAction, Element, ExportRegistry, HstoreMode, Member, Node,
    NodeCacheConfig, OsmId, OsmType, Relation, StyleError, TagList, Way,
};

#[cfg(feature = "sqlite")]
pub use osm2sql_data::{
    Database, DatabaseError, InputFormat, MiddleMode, OsmIngestError, OsmIngestSummary,
    SqliteMiddle, SqliteMiddleError, SqliteMiddleOptions, SqliteTableError, SqliteTableOptions,
    SqliteTableWriter, ingest_file, read_file,
};
