//! Command-line interface for the osm2sql importer.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod import;

pub use error::CliError;

use import::ImportArgs;

const ARG_INPUTS: &str = "inputs";
const ARG_DATABASE: &str = "database";
const ARG_PREFIX: &str = "prefix";
const ARG_STYLE: &str = "style";
const ARG_CACHE_MAX_ID: &str = "cache-max-id";
const ENV_INPUTS: &str = "OSM2SQL_CMDS_IMPORT_INPUTS";
const ENV_CACHE_MAX_ID: &str = "OSM2SQL_CMDS_IMPORT_CACHE_MAX_ID";

/// Run the osm2sql CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Import(args) => {
            import::run_import(args)?;
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "osm2sql",
    about = "Import OpenStreetMap data into SQLite tables",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import extracts, or apply diffs to a slim import.
    Import(ImportArgs),
}

#[cfg(test)]
mod tests;
