//! Import command implementation for the osm2sql CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, ValueEnum};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osm2sql_core::geometry::{GeometryBuilder, Projection};
use osm2sql_core::middle::{Middle, RamMiddle};
use osm2sql_core::output::{Output, OutputOptions, OutputStats};
use osm2sql_core::table::{GeometryFormat, TableWriter};
use osm2sql_core::transform::{TagTransform, TransformSettings};
use osm2sql_core::{CacheStrategy, ExportRegistry, HstoreMode, NodeCacheConfig};
use osm2sql_data::{
    Database, InputFormat, MiddleMode, SqliteMiddle, SqliteMiddleOptions, SqliteTableOptions,
    SqliteTableWriter, ingest_file,
};
use serde::{Deserialize, Serialize};
use std::io::BufReader;

use crate::{
    ARG_CACHE_MAX_ID, ARG_DATABASE, ARG_INPUTS, ARG_PREFIX, ARG_STYLE, CliError,
    ENV_CACHE_MAX_ID, ENV_INPUTS,
};

const DEFAULT_DATABASE: &str = "osm.sqlite";
const DEFAULT_PREFIX: &str = "planet_osm";
const DEFAULT_CACHE_MIB: usize = 800;

/// How tags without a column of their own are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum HstoreArg {
    /// Drop them.
    #[default]
    None,
    /// Keep them in the JSON `tags` column.
    Norm,
    /// Keep every tag in the JSON `tags` column.
    All,
}

impl From<HstoreArg> for HstoreMode {
    fn from(value: HstoreArg) -> Self {
        match value {
            HstoreArg::None => Self::None,
            HstoreArg::Norm => Self::Norm,
            HstoreArg::All => Self::All,
        }
    }
}

/// Output projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ProjectionArg {
    /// Longitude/latitude degrees (EPSG:4326).
    Latlong,
    /// Spherical Web Mercator (EPSG:3857).
    #[default]
    Merc,
}

impl From<ProjectionArg> for Projection {
    fn from(value: ProjectionArg) -> Self {
        match value {
            ProjectionArg::Latlong => Self::Geographic,
            ProjectionArg::Merc => Self::WebMercator,
        }
    }
}

/// Encoding of the `way` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GeometryFormatArg {
    /// Well-Known Text.
    #[default]
    Wkt,
    /// Well-Known Binary.
    Wkb,
}

impl From<GeometryFormatArg> for GeometryFormat {
    fn from(value: GeometryFormatArg) -> Self {
        match value {
            GeometryFormatArg::Wkt => Self::Wkt,
            GeometryFormatArg::Wkb => Self::Wkb,
        }
    }
}

/// Node cache allocation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CacheStrategyArg {
    /// Blocks allocated on demand within `--cache` MiB.
    #[default]
    Sparse,
    /// One flat array sized by `--cache-max-id`.
    Dense,
}

/// Input reader override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum InputFormatArg {
    /// OSM PBF.
    Pbf,
    /// OSM XML.
    Xml,
    /// OsmChange XML.
    Osc,
}

impl From<InputFormatArg> for InputFormat {
    fn from(value: InputFormatArg) -> Self {
        match value {
            InputFormatArg::Pbf => Self::Pbf,
            InputFormatArg::Xml => Self::Xml,
            InputFormatArg::Osc => Self::OsmChange,
        }
    }
}

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Import OSM extracts (.osm.pbf, .osm, .osm.bz2) into SQLite \
                 tables, or apply OsmChange diffs (.osc, .osc.bz2) to a slim \
                 import with --append. Options can come from CLI flags, \
                 configuration files, or environment variables.",
    about = "Import OSM data into SQLite"
)]
#[ortho_config(prefix = "OSM2SQL")]
pub(crate) struct ImportArgs {
    /// Input files, processed in order.
    #[arg(value_name = "path")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) inputs: Vec<Utf8PathBuf>,
    /// SQLite database to write (default `osm.sqlite`).
    #[arg(long = ARG_DATABASE, short = 'd', value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Table name prefix (default `planet_osm`).
    #[arg(long = ARG_PREFIX, short = 'p', value_name = "name")]
    #[serde(default)]
    pub(crate) prefix: Option<String>,
    /// Style file; the bundled style is used when omitted.
    #[arg(long = ARG_STYLE, short = 'S', value_name = "path")]
    #[serde(default)]
    pub(crate) style: Option<Utf8PathBuf>,
    /// Keep the middle store in the database so diffs can be applied later.
    #[arg(long, short = 's')]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) slim: bool,
    /// Apply the inputs to an existing slim import.
    #[arg(long, short = 'a')]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) append: bool,
    /// Export tags without a column into a JSON `tags` column.
    #[arg(long, value_enum, value_name = "mode")]
    #[serde(default)]
    pub(crate) hstore: Option<HstoreArg>,
    /// Key prefix exported as its own JSON column (repeatable).
    #[arg(long = "hstore-column", value_name = "prefix")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) hstore_columns: Vec<String>,
    /// Only keep entities with a tag matching a column.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) hstore_match_only: bool,
    /// Keep `natural=coastline` ways as areas.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) keep_coastlines: bool,
    /// Output projection (default `merc`).
    #[arg(long, value_enum, value_name = "projection")]
    #[serde(default)]
    pub(crate) projection: Option<ProjectionArg>,
    /// Write multi-part results as one row instead of one row per part.
    #[arg(long, short = 'G')]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) multi_geometry: bool,
    /// Encoding of the `way` column (default `wkt`).
    #[arg(long, value_enum, value_name = "format")]
    #[serde(default)]
    pub(crate) geometry_format: Option<GeometryFormatArg>,
    /// Node cache strategy (default `sparse`).
    #[arg(long, value_enum, value_name = "strategy")]
    #[serde(default)]
    pub(crate) cache_strategy: Option<CacheStrategyArg>,
    /// Sparse node cache budget in MiB (default 800).
    #[arg(long, short = 'C', value_name = "MiB")]
    #[serde(default)]
    pub(crate) cache: Option<usize>,
    /// Largest node id the dense cache holds.
    #[arg(long = ARG_CACHE_MAX_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) cache_max_id: Option<i64>,
    /// Worker threads rendering pending ways and relations (default 1).
    #[arg(long, value_name = "count")]
    #[serde(default)]
    pub(crate) flush_workers: Option<usize>,
    /// Reader to use instead of guessing from each file name.
    #[arg(long, short = 'r', value_enum, value_name = "format")]
    #[serde(default)]
    pub(crate) input_reader: Option<InputFormatArg>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }

    fn cache_config(&self) -> Result<NodeCacheConfig, CliError> {
        let strategy = match self.cache_strategy.unwrap_or_default() {
            CacheStrategyArg::Sparse => CacheStrategy::Sparse {
                max_bytes: self
                    .cache
                    .unwrap_or(DEFAULT_CACHE_MIB)
                    .saturating_mul(1024 * 1024),
            },
            CacheStrategyArg::Dense => CacheStrategy::Dense {
                max_id: self.cache_max_id.ok_or(CliError::MissingArgument {
                    field: ARG_CACHE_MAX_ID,
                    env: ENV_CACHE_MAX_ID,
                })?,
            },
        };
        Ok(NodeCacheConfig {
            strategy,
            ..NodeCacheConfig::default()
        })
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImportConfig {
    /// Input files in processing order.
    pub(crate) inputs: Vec<Utf8PathBuf>,
    /// SQLite database path.
    pub(crate) database: Utf8PathBuf,
    /// Table name prefix.
    pub(crate) prefix: String,
    /// Style file, or `None` for the bundled style.
    pub(crate) style: Option<Utf8PathBuf>,
    pub(crate) slim: bool,
    pub(crate) append: bool,
    pub(crate) hstore: HstoreMode,
    pub(crate) transform: TransformSettings,
    pub(crate) projection: Projection,
    pub(crate) multi_geometry: bool,
    pub(crate) geometry_format: GeometryFormat,
    pub(crate) cache: NodeCacheConfig,
    pub(crate) flush_workers: usize,
    /// Reader override; `None` guesses per file.
    pub(crate) input_format: Option<InputFormat>,
}

impl ImportConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        for input in &self.inputs {
            Self::require_existing(input, ARG_INPUTS)?;
        }
        if let Some(style) = &self.style {
            Self::require_existing(style, ARG_STYLE)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match osm2sql_fs::is_regular_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse the style and build the tag transform.
    pub(crate) fn load_transform(&self) -> Result<TagTransform, CliError> {
        let registry = match &self.style {
            Some(path) => {
                let file = osm2sql_fs::open_input(path).map_err(|source| CliError::OpenStyle {
                    path: path.clone(),
                    source,
                })?;
                ExportRegistry::parse(BufReader::new(file), self.hstore).map_err(|source| {
                    CliError::Style {
                        origin: path.to_string(),
                        source,
                    }
                })?
            }
            None => ExportRegistry::bundled(self.hstore).map_err(|source| CliError::Style {
                origin: "bundled".to_owned(),
                source,
            })?,
        };
        Ok(TagTransform::new(registry, self.transform.clone()))
    }

    fn output_options(&self) -> OutputOptions {
        OutputOptions {
            append: self.append,
            geometry_format: self.geometry_format,
            flush_workers: self.flush_workers,
        }
    }
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        if args.inputs.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_INPUTS,
                env: ENV_INPUTS,
            });
        }
        if args.append && !args.slim {
            return Err(CliError::AppendRequiresSlim);
        }
        let cache = args.cache_config()?;
        Ok(Self {
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            prefix: args.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_owned()),
            style: args.style,
            slim: args.slim,
            append: args.append,
            hstore: args.hstore.unwrap_or_default().into(),
            transform: TransformSettings {
                hstore_columns: args.hstore_columns,
                hstore_match_only: args.hstore_match_only,
                keep_coastlines: args.keep_coastlines,
            },
            projection: args.projection.unwrap_or_default().into(),
            multi_geometry: args.multi_geometry,
            geometry_format: args.geometry_format.unwrap_or_default().into(),
            cache,
            flush_workers: args.flush_workers.unwrap_or(1).max(1),
            input_format: args.input_reader.map(InputFormat::from),
            inputs: args.inputs,
        })
    }
}

pub(super) fn run_import(args: ImportArgs) -> Result<OutputStats, CliError> {
    let config = resolve_import_config(args)?;
    execute_import(&config)
}

fn resolve_import_config(args: ImportArgs) -> Result<ImportConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Run a validated import against its database.
pub(super) fn execute_import(config: &ImportConfig) -> Result<OutputStats, CliError> {
    let transform = config.load_transform()?;
    let builder =
        GeometryBuilder::new(config.projection).with_multi_geometry(config.multi_geometry);
    let db = Database::open(&config.database)?;
    let writer = SqliteTableWriter::open(
        db.clone(),
        &transform,
        SqliteTableOptions {
            prefix: config.prefix.clone(),
            append: config.append,
            slim: config.slim,
            geometry_format: config.geometry_format,
        },
    )?;

    if config.slim {
        let mode = if config.append {
            MiddleMode::Append
        } else {
            MiddleMode::Create
        };
        let middle = SqliteMiddle::open(
            db,
            SqliteMiddleOptions {
                prefix: config.prefix.clone(),
                mode,
                cache: config.cache,
            },
        )?;
        let output = Output::new(middle, writer, transform, builder, config.output_options());
        drive(config, output)
    } else {
        let middle = RamMiddle::new(config.cache);
        let output = Output::new(middle, writer, transform, builder, config.output_options());
        drive(config, output)
    }
}

fn drive<M, W>(config: &ImportConfig, mut output: Output<M, W>) -> Result<OutputStats, CliError>
where
    M: Middle,
    W: TableWriter,
{
    info!(
        "Importing {} input(s) into {} ({} mode)",
        config.inputs.len(),
        config.database,
        if config.slim { "slim" } else { "one-shot" }
    );
    output.start()?;
    for input in &config.inputs {
        ingest_file(input, config.input_format, &mut output)?;
    }
    let stats = output.finish()?;
    info!(
        "Wrote {} rows; rendered {} pending ways and {} pending relations",
        stats.rows, stats.pending_ways, stats.pending_relations
    );
    Ok(stats)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ImportConfig, CliError> {
    let merged = ImportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ImportConfig::try_from(merged)
}
