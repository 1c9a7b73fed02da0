//! Input readers and SQLite backends for osm2sql.
//!
//! Responsibilities:
//! - Read `.osm.pbf`, `.osm` and `.osc` inputs and feed them to the output
//!   pipeline.
//! - Persist the slim middle store so diffs can be applied later.
//! - Write rendered rows into typed SQLite tables.
//!
//! Boundaries:
//! - Do not encode tag or geometry rules (live in `osm2sql-core`).
//! - The middle store and the table writer share one [`Database`] handle, so
//!   a run is one transaction on one connection.
//!
//! Invariants:
//! - SQL values are always bound as parameters.
//! - No global mutable state.

mod database;
mod input;
mod middle;
mod table;

pub use database::{Database, DatabaseError};
pub use input::{
    InputFormat, OsmIngestError, OsmIngestSummary, ParseInputFormatError, ingest_file, read_file,
    read_pbf, read_xml,
};
pub use middle::{MiddleMode, SqliteMiddle, SqliteMiddleError, SqliteMiddleOptions};
pub use table::{Column, ColumnKind, SqliteTableError, SqliteTableOptions, SqliteTableWriter};
