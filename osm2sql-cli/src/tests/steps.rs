//! Behaviour-driven step definitions driving the import command scenarios.

use super::helpers::{DatasetFiles, import_args, table_ids};
use crate::CliError;
use crate::import::{ImportArgs, ImportConfig, execute_import};
use osm2sql_core::output::OutputStats;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

/// Aggregates import scenario state so each step only needs a single world
/// argument.
#[derive(Debug)]
struct ImportWorld {
    dataset_files: DatasetFiles,
    result: RefCell<Option<Result<OutputStats, CliError>>>,
}

impl ImportWorld {
    fn new() -> Self {
        Self {
            dataset_files: DatasetFiles::new(),
            result: RefCell::new(None),
        }
    }

    fn dataset_files(&self) -> &DatasetFiles {
        &self.dataset_files
    }

    fn run(&self, args: ImportArgs) {
        let outcome = ImportConfig::try_from(args).and_then(|config| {
            config.validate_sources()?;
            execute_import(&config)
        });
        self.result.replace(Some(outcome));
    }

    fn expect_success(&self) -> OutputStats {
        let borrowed = self.result.borrow();
        match borrowed.as_ref().expect("import attempted") {
            Ok(stats) => *stats,
            Err(err) => panic!("expected success, got {err:?}"),
        }
    }
}

#[fixture]
fn world() -> ImportWorld {
    ImportWorld::new()
}

#[given("an OSM XML extract with a cafe and a road")]
fn extract_exists(#[from(world)] world: &ImportWorld) {
    assert!(
        world.dataset_files().extract().exists(),
        "expected the extract to exist on disk"
    );
}

#[given("the extract was imported in slim mode")]
fn imported_slim(#[from(world)] world: &ImportWorld) {
    let dataset = world.dataset_files();
    world.run(ImportArgs {
        slim: true,
        ..import_args(dataset, dataset.extract())
    });
    world.expect_success();
}

#[when("I import the extract")]
fn import_extract(#[from(world)] world: &ImportWorld) {
    let dataset = world.dataset_files();
    world.run(import_args(dataset, dataset.extract()));
}

#[when("I apply a diff deleting the cafe")]
fn apply_diff(#[from(world)] world: &ImportWorld) {
    let dataset = world.dataset_files();
    world.run(ImportArgs {
        slim: true,
        append: true,
        ..import_args(dataset, dataset.diff())
    });
}

#[when("I configure an append run without slim mode")]
fn append_without_slim(#[from(world)] world: &ImportWorld) {
    let dataset = world.dataset_files();
    world.run(ImportArgs {
        append: true,
        ..import_args(dataset, dataset.diff())
    });
}

#[then("the point table contains the cafe")]
fn point_table_has_cafe(#[from(world)] world: &ImportWorld) {
    let stats = world.expect_success();
    assert_eq!(stats.nodes, 3);
    assert_eq!(
        table_ids(world.dataset_files().database(), "planet_osm_point"),
        vec![3]
    );
}

#[then("the line table contains the road")]
fn line_table_has_road(#[from(world)] world: &ImportWorld) {
    world.expect_success();
    assert_eq!(
        table_ids(world.dataset_files().database(), "planet_osm_line"),
        vec![10]
    );
}

#[then("the point table is empty")]
fn point_table_empty(#[from(world)] world: &ImportWorld) {
    world.expect_success();
    assert!(table_ids(world.dataset_files().database(), "planet_osm_point").is_empty());
}

#[then("the CLI reports that append requires slim")]
fn reports_append_requires_slim(#[from(world)] world: &ImportWorld) {
    let borrowed = world.result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    assert!(
        matches!(error, CliError::AppendRequiresSlim),
        "unexpected error {error:?}"
    );
    assert!(error.to_string().contains("--slim"));
}

macro_rules! register_import_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/import_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: ImportWorld) {
            let _ = world;
        }
    };
}

register_import_scenario!(one_shot_import, "importing an XML extract in one-shot mode");
register_import_scenario!(slim_diff, "applying a diff to a slim import");
register_import_scenario!(rejecting_append_without_slim, "rejecting diffs without slim mode");
