//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use osm2sql_cli::CliError;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match osm2sql_cli::run() {
        Ok(()) => {}
        // Help and version requests are reported by clap itself.
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("osm2sql: {err}");
            std::process::exit(1);
        }
    }
}
