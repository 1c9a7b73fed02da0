//! Behavioural tests for replaying changes on top of an import.

use osm2sql_core::middle::RamMiddle;
use osm2sql_core::output::{Output, OutputError, OutputOptions, OutputStats};
use osm2sql_core::table::TableId;
use osm2sql_core::test_support::{RecordingWriter, test_output};
use osm2sql_core::{ChangeAction, Element, Node, OsmId, TagList, Way};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

type TestOutput = Output<RamMiddle, RecordingWriter>;

fn node(id: OsmId, lat: f64, lon: f64) -> Node {
    Node {
        id,
        lat,
        lon,
        tags: TagList::new(),
    }
}

fn road(id: OsmId, nodes: &[OsmId]) -> Way {
    Way {
        id,
        nodes: nodes.to_vec(),
        tags: TagList::from([("highway", "residential")]),
    }
}

/// Two roads: way 10 over nodes 1 and 2, way 11 over nodes 3 and 4.
fn import_two_roads(append: bool) -> TestOutput {
    let mut output = test_output(OutputOptions {
        append,
        ..OutputOptions::default()
    });
    output.start().expect("batch opened");
    for (id, lat, lon) in [(1, 0.0, 0.0), (2, 0.0, 0.01), (3, 0.01, 0.0), (4, 0.01, 0.01)] {
        output.node_add(node(id, lat, lon)).expect("node added");
    }
    output.way_add(road(10, &[1, 2])).expect("way added");
    output.way_add(road(11, &[3, 4])).expect("way added");
    output.finish().expect("import finished");
    output
}

fn with_output<T>(output: &RefCell<Option<TestOutput>>, f: impl FnOnce(&mut TestOutput) -> T) -> T {
    f(output.borrow_mut().as_mut().expect("import ran"))
}

#[fixture]
fn output() -> RefCell<Option<TestOutput>> {
    RefCell::new(None)
}

#[fixture]
fn stats() -> RefCell<Option<OutputStats>> {
    RefCell::new(None)
}

#[fixture]
fn error() -> RefCell<Option<OutputError>> {
    RefCell::new(None)
}

#[given("an append-mode import of two separate roads")]
fn given_append_import(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    let mut pipeline = import_two_roads(true);
    pipeline.start().expect("diff batch opened");
    *output.borrow_mut() = Some(pipeline);
}

#[given("a one-shot import of two separate roads")]
fn given_one_shot_import(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    *output.borrow_mut() = Some(import_two_roads(false));
}

#[when("the first node of the first road is moved")]
fn when_node_moved(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    with_output(output, |pipeline| {
        pipeline
            .apply_change(ChangeAction::Modify, Element::Node(node(1, 0.0, -0.01)))
            .expect("node modified");
    });
}

#[when("the second road is deleted")]
fn when_way_deleted(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    with_output(output, |pipeline| {
        pipeline
            .apply_change(ChangeAction::Delete, Element::Way(road(11, &[])))
            .expect("way deleted");
    });
}

#[when("a change is applied to the first road")]
fn when_change_rejected(
    #[from(output)] output: &RefCell<Option<TestOutput>>,
    #[from(error)] error: &RefCell<Option<OutputError>>,
) {
    let result = with_output(output, |pipeline| {
        pipeline.apply_change(ChangeAction::Modify, Element::Way(road(10, &[2, 1])))
    });
    *error.borrow_mut() = result.err();
}

#[when("the diff is applied")]
fn when_diff_applied(
    #[from(output)] output: &RefCell<Option<TestOutput>>,
    #[from(stats)] stats: &RefCell<Option<OutputStats>>,
) {
    let finished = with_output(output, |pipeline| pipeline.finish().expect("diff applied"));
    *stats.borrow_mut() = Some(finished);
}

#[then("only the first road was re-rendered")]
fn then_only_first_road(#[from(stats)] stats: &RefCell<Option<OutputStats>>) {
    let finished = stats.borrow().expect("diff applied");
    assert_eq!(finished.pending_ways, 1, "only way 10 uses the moved node");
}

#[then("the first road starts at the new position")]
fn then_first_road_moved(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    with_output(output, |pipeline| {
        let lines = pipeline.writer().rows_in(TableId::Line);
        assert_eq!(lines.len(), 2, "no duplicate rows after the diff");
        let moved = lines.iter().find(|row| row.id == 10).expect("way 10");
        assert_eq!(moved.geometry, "LINESTRING(-0.01 0,0.01 0)");
    });
}

#[then("only the first road remains in the line table")]
fn then_second_road_gone(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    with_output(output, |pipeline| {
        assert_eq!(pipeline.writer().ids_in(TableId::Line), vec![10]);
    });
}

#[then("the change is rejected because slim mode is required")]
fn then_slim_required(#[from(error)] error: &RefCell<Option<OutputError>>) {
    let err = error.borrow_mut().take().expect("change rejected");
    assert!(matches!(err, OutputError::SlimRequired { .. }));
    assert!(err.to_string().contains("slim"));
}

#[scenario(path = "tests/features/append.feature", index = 0)]
fn scenario_node_moved(
    output: RefCell<Option<TestOutput>>,
    stats: RefCell<Option<OutputStats>>,
    error: RefCell<Option<OutputError>>,
) {
    let _ = (output, stats, error);
}

#[scenario(path = "tests/features/append.feature", index = 1)]
fn scenario_way_deleted(
    output: RefCell<Option<TestOutput>>,
    stats: RefCell<Option<OutputStats>>,
    error: RefCell<Option<OutputError>>,
) {
    let _ = (output, stats, error);
}

#[scenario(path = "tests/features/append.feature", index = 2)]
fn scenario_change_rejected(
    output: RefCell<Option<TestOutput>>,
    stats: RefCell<Option<OutputStats>>,
    error: RefCell<Option<OutputError>>,
) {
    let _ = (output, stats, error);
}
