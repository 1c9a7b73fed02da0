//! Input readers: `.osm.pbf` via `osmpbf`, `.osm` XML and `.osc` OsmChange
//! (plain or bzip2) via `quick-xml`.
//!
//! Readers hand every entity to a visitor together with the change action it
//! carries. Full extracts report [`ChangeAction::Create`] throughout, so the
//! same visitor drives imports and diffs.

use std::fmt;
use std::io::{BufRead, BufReader};
use std::str::FromStr;

use bzip2::read::MultiBzDecoder;
use camino::{Utf8Path, Utf8PathBuf};
use geo::{Coord, Rect};
use log::info;
use osm2sql_core::middle::Middle;
use osm2sql_core::output::{Output, OutputError};
use osm2sql_core::table::TableWriter;
use osm2sql_core::{ChangeAction, Element};
use thiserror::Error;

mod pbf;
mod xml;

pub use pbf::read_pbf;
pub use xml::read_xml;

/// Summary of the entities read from one input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OsmIngestSummary {
    /// Nodes read, including dense-node entries.
    pub nodes: u64,
    /// Ways read.
    pub ways: u64,
    /// Relations read.
    pub relations: u64,
    /// Bounding box of all node coordinates, if any were valid.
    /// Coordinates are WGS84 with `x = longitude`, `y = latitude`.
    pub bounds: Option<Rect<f64>>,
}

impl OsmIngestSummary {
    pub(crate) fn record(&mut self, element: &Element) {
        match element {
            Element::Node(node) => {
                self.nodes += 1;
                self.include(node.lon, node.lat);
            }
            Element::Way(_) => self.ways += 1,
            Element::Relation(_) => self.relations += 1,
        }
    }

    fn include(&mut self, lon: f64, lat: f64) {
        let valid = lon.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lon)
            && (-90.0..=90.0).contains(&lat);
        if !valid {
            return;
        }
        let point = Coord { x: lon, y: lat };
        self.bounds = Some(match self.bounds {
            Some(existing) => Rect::new(
                Coord {
                    x: existing.min().x.min(lon),
                    y: existing.min().y.min(lat),
                },
                Coord {
                    x: existing.max().x.max(lon),
                    y: existing.max().y.max(lat),
                },
            ),
            None => Rect::new(point, point),
        });
    }
}

/// Input file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Protocol buffer extract.
    Pbf,
    /// OSM XML extract, optionally bzip2-compressed.
    Xml,
    /// OsmChange diff, optionally bzip2-compressed.
    OsmChange,
}

impl InputFormat {
    /// Guess the format from the file name.
    pub fn detect(path: &Utf8Path) -> Result<Self, OsmIngestError> {
        let name = path.file_name().unwrap_or_default().to_ascii_lowercase();
        let name = name.strip_suffix(".bz2").unwrap_or(&name);
        if name.ends_with(".pbf") {
            Ok(Self::Pbf)
        } else if name.ends_with(".osm") {
            Ok(Self::Xml)
        } else if name.ends_with(".osc") {
            Ok(Self::OsmChange)
        } else {
            Err(OsmIngestError::UnknownFormat {
                path: path.to_path_buf(),
            })
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pbf => "pbf",
            Self::Xml => "xml",
            Self::OsmChange => "osc",
        })
    }
}

/// Error returned when an input format name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown input format {0:?}; expected pbf, xml or osc")]
pub struct ParseInputFormatError(pub String);

impl FromStr for InputFormat {
    type Err = ParseInputFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pbf" => Ok(Self::Pbf),
            "xml" | "osm" => Ok(Self::Xml),
            "osc" | "osmchange" => Ok(Self::OsmChange),
            _ => Err(ParseInputFormatError(s.to_owned())),
        }
    }
}

/// Errors returned while reading an input.
#[derive(Debug, Error)]
pub enum OsmIngestError {
    /// The format could not be guessed from the file name.
    #[error("cannot tell the format of {path:?}; use .osm.pbf, .osm[.bz2] or .osc[.bz2]")]
    UnknownFormat {
        /// Offending input.
        path: Utf8PathBuf,
    },
    /// PBF input cannot be bzip2-compressed.
    #[error("compressed PBF input {path:?} is not supported")]
    CompressedPbf {
        /// Offending input.
        path: Utf8PathBuf,
    },
    /// Opening the input failed.
    #[error("failed to open OSM input at {path:?}")]
    Open {
        /// Input path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening a PBF file failed.
    #[error("failed to open OSM PBF file at {path:?}")]
    OpenPbf {
        /// Input path.
        path: Utf8PathBuf,
        /// Source error returned by `osmpbf`.
        #[source]
        source: osmpbf::Error,
    },
    /// PBF data could not be decoded.
    #[error("failed to decode OSM PBF data at {path:?}")]
    DecodePbf {
        /// Input path.
        path: Utf8PathBuf,
        /// Source error returned by `osmpbf`.
        #[source]
        source: osmpbf::Error,
    },
    /// XML could not be parsed.
    #[error("malformed XML in {path:?} at byte {position}")]
    Xml {
        /// Input path.
        path: Utf8PathBuf,
        /// Byte offset of the failure.
        position: usize,
        /// Source error returned by `quick-xml`.
        #[source]
        source: quick_xml::Error,
    },
    /// A required attribute was missing.
    #[error("<{element}> in {path:?} lacks the {attribute:?} attribute")]
    MissingAttribute {
        /// Input path.
        path: Utf8PathBuf,
        /// Element name.
        element: &'static str,
        /// Attribute name.
        attribute: &'static str,
    },
    /// An attribute held a value that could not be parsed.
    #[error("<{element}> in {path:?} has invalid {attribute}={value:?}")]
    InvalidAttribute {
        /// Input path.
        path: Utf8PathBuf,
        /// Element name.
        element: &'static str,
        /// Attribute name.
        attribute: &'static str,
        /// Raw value.
        value: String,
    },
    /// The pipeline rejected an entity.
    #[error("failed to process {kind} {id} from {path:?}")]
    Output {
        /// Input path.
        path: Utf8PathBuf,
        /// Entity kind.
        kind: osm2sql_core::OsmType,
        /// Entity id.
        id: osm2sql_core::OsmId,
        /// Pipeline error.
        #[source]
        source: OutputError,
    },
}

/// Read `path` in `format` (guessed from the name when `None`) and hand
/// every entity to `visit`.
pub fn read_file<F>(
    path: &Utf8Path,
    format: Option<InputFormat>,
    visit: F,
) -> Result<OsmIngestSummary, OsmIngestError>
where
    F: FnMut(ChangeAction, Element) -> Result<(), OutputError>,
{
    let format = match format {
        Some(format) => format,
        None => InputFormat::detect(path)?,
    };
    let compressed = path.as_str().to_ascii_lowercase().ends_with(".bz2");
    match format {
        InputFormat::Pbf if compressed => Err(OsmIngestError::CompressedPbf {
            path: path.to_path_buf(),
        }),
        InputFormat::Pbf => read_pbf(path, visit),
        InputFormat::Xml | InputFormat::OsmChange => {
            let file = osm2sql_fs::open_input(path).map_err(|source| OsmIngestError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            let reader: Box<dyn BufRead> = if compressed {
                Box::new(BufReader::new(MultiBzDecoder::new(BufReader::new(file))))
            } else {
                Box::new(BufReader::new(file))
            };
            read_xml(reader, path, visit)
        }
    }
}

/// Feed every entity of `path` through `output`.
///
/// Extracts are added; diffs are applied action by action, which needs a
/// slim middle store. The caller brackets the run with
/// [`Output::start`] and [`Output::finish`].
pub fn ingest_file<M, W>(
    path: &Utf8Path,
    format: Option<InputFormat>,
    output: &mut Output<M, W>,
) -> Result<OsmIngestSummary, OsmIngestError>
where
    M: Middle,
    W: TableWriter,
{
    info!("Reading {path}");
    let summary = read_file(path, format, |action, element| {
        output.apply_change(action, element)
    })?;
    info!(
        "Read {} nodes, {} ways, {} relations from {path}",
        summary.nodes, summary.ways, summary.relations
    );
    Ok(summary)
}

/// Wrap a pipeline failure with the entity that caused it.
pub(crate) fn output_error(
    path: &Utf8Path,
    element_kind: osm2sql_core::OsmType,
    id: osm2sql_core::OsmId,
    source: OutputError,
) -> OsmIngestError {
    OsmIngestError::Output {
        path: path.to_path_buf(),
        kind: element_kind,
        id,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("planet.osm.pbf", InputFormat::Pbf)]
    #[case("extract.osm", InputFormat::Xml)]
    #[case("extract.OSM.bz2", InputFormat::Xml)]
    #[case("626.osc.bz2", InputFormat::OsmChange)]
    #[case("dir.d/626.osc", InputFormat::OsmChange)]
    fn detects_formats_from_names(#[case] name: &str, #[case] expected: InputFormat) {
        let format = InputFormat::detect(Utf8Path::new(name)).expect("known format");
        assert_eq!(format, expected);
    }

    #[rstest]
    fn unknown_extension_is_rejected() {
        let err = InputFormat::detect(Utf8Path::new("extract.json")).expect_err("unknown");
        assert!(matches!(err, OsmIngestError::UnknownFormat { .. }));
    }

    #[rstest]
    fn compressed_pbf_is_rejected() {
        let err = read_file(Utf8Path::new("planet.osm.pbf.bz2"), None, |_, _| Ok(()))
            .expect_err("unsupported");
        assert!(matches!(err, OsmIngestError::CompressedPbf { .. }));
    }

    #[rstest]
    #[case("PBF", InputFormat::Pbf)]
    #[case("osm", InputFormat::Xml)]
    #[case("osmchange", InputFormat::OsmChange)]
    fn parses_format_names(#[case] name: &str, #[case] expected: InputFormat) {
        assert_eq!(name.parse::<InputFormat>(), Ok(expected));
    }

    #[rstest]
    fn reads_bzip2_compressed_changes() {
        use bzip2::{Compression, write::BzEncoder};
        use std::io::Write;

        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("626.osc.bz2")).expect("utf-8 path");
        let file = std::fs::File::create(&path).expect("create diff");
        let mut encoder = BzEncoder::new(file, Compression::default());
        encoder
            .write_all(
                br#"<osmChange version="0.6"><delete><node id="7"/></delete></osmChange>"#,
            )
            .expect("compress diff");
        encoder.finish().expect("finish stream");

        let mut seen = Vec::new();
        let summary = read_file(&path, None, |action, element| {
            seen.push((action, element.id()));
            Ok(())
        })
        .expect("diff read");
        assert_eq!(summary.nodes, 1);
        assert_eq!(seen, vec![(ChangeAction::Delete, 7)]);
    }

    #[rstest]
    fn summary_bounds_cover_valid_nodes_only() {
        let mut summary = OsmIngestSummary::default();
        for (lat, lon) in [(52.0, 13.0), (52.5, 13.5), (95.0, 0.0)] {
            summary.record(&Element::Node(osm2sql_core::Node {
                id: 1,
                lat,
                lon,
                tags: osm2sql_core::TagList::new(),
            }));
        }
        assert_eq!(summary.nodes, 3);
        let bounds = summary.bounds.expect("bounds");
        assert_eq!(bounds.min(), Coord { x: 13.0, y: 52.0 });
        assert_eq!(bounds.max(), Coord { x: 13.5, y: 52.5 });
    }
}
