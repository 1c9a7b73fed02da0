//! Behavioural tests for a one-shot import through the output pipeline.

use osm2sql_core::middle::RamMiddle;
use osm2sql_core::output::{Output, OutputOptions, OutputStats};
use osm2sql_core::table::TableId;
use osm2sql_core::test_support::{RecordingWriter, test_output};
use osm2sql_core::{Member, Node, OsmId, OsmType, Relation, TagList, Way};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

type TestOutput = Output<RamMiddle, RecordingWriter>;

fn tags(pairs: &[(&str, &str)]) -> TagList {
    pairs.iter().copied().collect()
}

fn way(id: OsmId, nodes: &[OsmId], pairs: &[(&str, &str)]) -> Way {
    Way {
        id,
        nodes: nodes.to_vec(),
        tags: tags(pairs),
    }
}

fn add_way(output: &RefCell<Option<TestOutput>>, way: Way) {
    output
        .borrow_mut()
        .as_mut()
        .expect("import started")
        .way_add(way)
        .expect("way added");
}

fn add_relation(output: &RefCell<Option<TestOutput>>, relation: Relation) {
    output
        .borrow_mut()
        .as_mut()
        .expect("import started")
        .relation_add(relation)
        .expect("relation added");
}

fn line_rows(output: &RefCell<Option<TestOutput>>, table: TableId) -> Vec<(OsmId, TagList)> {
    output
        .borrow()
        .as_ref()
        .expect("import started")
        .writer()
        .rows_in(table)
        .into_iter()
        .map(|row| (row.id, row.tags.clone()))
        .collect()
}

#[fixture]
fn output() -> RefCell<Option<TestOutput>> {
    RefCell::new(None)
}

#[fixture]
fn stats() -> RefCell<Option<OutputStats>> {
    RefCell::new(None)
}

#[given("an import over a small grid of nodes")]
fn given_grid(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    let mut pipeline = test_output(OutputOptions::default());
    pipeline.start().expect("batch opened");
    // Ids 1..=9, row-major, 0.01 degrees apart.
    for id in 1..=9_i32 {
        let row = (id - 1) / 3;
        let col = (id - 1) % 3;
        pipeline
            .node_add(Node {
                id: i64::from(id),
                lat: f64::from(row) * 0.01,
                lon: f64::from(col) * 0.01,
                tags: TagList::new(),
            })
            .expect("node added");
    }
    *output.borrow_mut() = Some(pipeline);
}

#[when("a way tagged highway=secondary is added")]
fn when_secondary(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    add_way(output, way(10, &[1, 2, 3], &[("highway", "secondary")]));
}

#[when("a way tagged highway=motorway, bridge=yes and layer=1 is added")]
fn when_motorway_bridge(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    add_way(
        output,
        way(
            10,
            &[4, 5, 6],
            &[("highway", "motorway"), ("bridge", "yes"), ("layer", "1")],
        ),
    );
}

#[when("two forest ways form the outer ring of an untagged multipolygon")]
fn when_forest_multipolygon(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    add_way(
        output,
        way(30, &[1, 3, 9], &[("landuse", "forest"), ("name", "North")]),
    );
    add_way(
        output,
        way(31, &[9, 7, 1], &[("landuse", "forest"), ("name", "South")]),
    );
    add_relation(
        output,
        Relation {
            id: 40,
            members: vec![
                Member::new(OsmType::Way, 30, "outer"),
                Member::new(OsmType::Way, 31, "outer"),
            ],
            tags: tags(&[("type", "multipolygon")]),
        },
    );
}

#[when("a local cycle route relation with ref 12 in alternate state is added")]
fn when_cycle_route(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    add_way(output, way(20, &[1, 2, 3], &[]));
    add_way(output, way(21, &[3, 6], &[]));
    add_relation(
        output,
        Relation {
            id: 50,
            members: vec![
                Member::new(OsmType::Way, 20, ""),
                Member::new(OsmType::Way, 21, ""),
            ],
            tags: tags(&[
                ("type", "route"),
                ("route", "bicycle"),
                ("network", "lcn"),
                ("state", "alternate"),
                ("ref", "12"),
            ]),
        },
    );
}

#[when("the import finishes")]
fn when_finished(
    #[from(output)] output: &RefCell<Option<TestOutput>>,
    #[from(stats)] stats: &RefCell<Option<OutputStats>>,
) {
    let finished = output
        .borrow_mut()
        .as_mut()
        .expect("import started")
        .finish()
        .expect("import finished");
    *stats.borrow_mut() = Some(finished);
}

#[then("the line table holds the way with z_order 6")]
fn then_z_order_6(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    let rows = line_rows(output, TableId::Line);
    assert_eq!(rows.len(), 1, "expected a single line row");
    let (id, row_tags) = rows.first().expect("one row");
    assert_eq!(*id, 10);
    assert_eq!(row_tags.get("z_order"), Some("6"));
}

#[then("the line table holds the way with z_order 29")]
fn then_z_order_29(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    let rows = line_rows(output, TableId::Line);
    assert_eq!(rows.len(), 1, "expected a single line row");
    let (_, row_tags) = rows.first().expect("one row");
    assert_eq!(row_tags.get("z_order"), Some("29"));
}

#[then("the roads table holds the way")]
fn then_roads(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    let ids: Vec<OsmId> = line_rows(output, TableId::Roads)
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![10]);
}

#[then("the polygon table holds only the relation with landuse=forest")]
fn then_relation_polygon(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    let rows = line_rows(output, TableId::Polygon);
    assert_eq!(rows.len(), 1, "expected a single polygon row");
    let (id, row_tags) = rows.first().expect("one row");
    assert_eq!(*id, -40, "relation rows carry the negated id");
    assert_eq!(row_tags.get("landuse"), Some("forest"));
    assert_eq!(row_tags.get("name"), None, "names differ between outers");
    assert!(row_tags.get("way_area").is_some());
}

#[then("neither outer way is written on its own")]
fn then_outers_suppressed(
    #[from(output)] output: &RefCell<Option<TestOutput>>,
    #[from(stats)] stats: &RefCell<Option<OutputStats>>,
) {
    assert!(line_rows(output, TableId::Line).is_empty());
    let finished = stats.borrow().expect("import finished");
    assert_eq!(finished.pending_ways, 0, "both outers were superseded");
}

#[then("the line table holds the route with lcn=alternate and lcn_ref=12")]
fn then_route_tags(#[from(output)] output: &RefCell<Option<TestOutput>>) {
    let rows = line_rows(output, TableId::Line);
    assert_eq!(rows.len(), 1, "member ways chain into one line");
    let (id, row_tags) = rows.first().expect("one row");
    assert_eq!(*id, -50);
    assert_eq!(row_tags.get("lcn"), Some("alternate"));
    assert_eq!(row_tags.get("lcn_ref"), Some("12"));
    assert_eq!(row_tags.get("route_pref_color"), Some("0"));
    assert_eq!(row_tags.get("network"), None, "network has no column");
}

#[scenario(path = "tests/features/import.feature", index = 0)]
fn scenario_secondary_road(
    output: RefCell<Option<TestOutput>>,
    stats: RefCell<Option<OutputStats>>,
) {
    let _ = (output, stats);
}

#[scenario(path = "tests/features/import.feature", index = 1)]
fn scenario_motorway_bridge(
    output: RefCell<Option<TestOutput>>,
    stats: RefCell<Option<OutputStats>>,
) {
    let _ = (output, stats);
}

#[scenario(path = "tests/features/import.feature", index = 2)]
fn scenario_untagged_multipolygon(
    output: RefCell<Option<TestOutput>>,
    stats: RefCell<Option<OutputStats>>,
) {
    let _ = (output, stats);
}

#[scenario(path = "tests/features/import.feature", index = 3)]
fn scenario_cycle_route(
    output: RefCell<Option<TestOutput>>,
    stats: RefCell<Option<OutputStats>>,
) {
    let _ = (output, stats);
}
