//! Shared test harness modules for the osm2sql CLI.

mod helpers;
mod steps;
