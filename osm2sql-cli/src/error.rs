//! Error types emitted by the osm2sql CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use osm2sql_core::StyleError;
use osm2sql_core::output::OutputError;
use osm2sql_data::{DatabaseError, OsmIngestError, SqliteMiddleError, SqliteTableError};
use thiserror::Error;

/// Errors emitted by the osm2sql CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// Append mode was requested without slim mode.
    #[error("--append requires --slim: diffs need the persistent middle store")]
    AppendRequiresSlim,
    /// A referenced input path does not exist on disk or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening the style file failed.
    #[error("failed to open style file {path:?}: {source}")]
    OpenStyle {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The style file is invalid.
    #[error("invalid style {origin}: {source}")]
    Style {
        origin: String,
        #[source]
        source: StyleError,
    },
    /// Opening the output database failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// Setting up the slim middle tables failed.
    #[error("failed to open the middle store: {0}")]
    Middle(#[from] SqliteMiddleError),
    /// Setting up the output tables failed.
    #[error("failed to set up output tables: {0}")]
    Tables(#[from] SqliteTableError),
    /// Reading an input failed.
    #[error("failed to import OSM data: {0}")]
    Ingest(#[from] OsmIngestError),
    /// The final flush or commit failed.
    #[error("failed to finish the import: {0}")]
    Output(#[from] OutputError),
}
