//! The import pipeline: classification, geometry and table output.
//!
//! [`Output`] consumes entities in id order (nodes, ways, relations), keeps
//! the middle store current, renders rows and hands them to a
//! [`TableWriter`]. Closed area ways are held back as pending until every
//! relation has had the chance to supersede them; [`Output::finish`] renders
//! whatever is still pending on a rayon pool and commits the batch.
//!
//! In append mode entities are changed through the `*_modify` and
//! `*_delete` operations, which need a slim middle store to find dependants.

use log::{debug, info};
use thiserror::Error;

use crate::geometry::GeometryBuilder;
use crate::middle::{Middle, MiddleError};
use crate::table::{GeometryFormat, TableError, TableId, TableWriter};
use crate::transform::TagTransform;
use crate::{ChangeAction, Element, Node, OsmId, OsmType, Relation, TagFlags, Way};

mod pending;
mod render;

use render::{RelationRows, Renderer, Row};

/// Errors raised by the pipeline. All are fatal.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The middle store failed.
    #[error(transparent)]
    Middle(#[from] MiddleError),
    /// The table writer failed.
    #[error(transparent)]
    Table(#[from] TableError),
    /// A change operation was attempted without a slim middle store.
    #[error("{operation} requires slim mode so dependants can be resolved")]
    SlimRequired {
        /// Rejected operation.
        operation: &'static str,
    },
    /// The pending flush could not start its worker pool.
    #[error("failed to start {workers} flush workers")]
    WorkerPool {
        /// Requested worker count.
        workers: usize,
        /// Underlying error.
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Pipeline options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    /// Rows of re-rendered entities replace earlier rows.
    pub append: bool,
    /// Geometry interchange format handed to the writer.
    pub geometry_format: GeometryFormat,
    /// Worker threads for the pending flush.
    pub flush_workers: usize,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            append: false,
            geometry_format: GeometryFormat::default(),
            flush_workers: 1,
        }
    }
}

/// Counters reported after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    /// Nodes processed.
    pub nodes: u64,
    /// Ways processed.
    pub ways: u64,
    /// Relations processed.
    pub relations: u64,
    /// Rows written across all tables.
    pub rows: u64,
    /// Pending ways rendered by the final flush.
    pub pending_ways: u64,
    /// Pending relations rendered by the final flush.
    pub pending_relations: u64,
}

/// The import pipeline over a middle store `M` and a table writer `W`.
#[derive(Debug)]
pub struct Output<M, W> {
    middle: M,
    writer: W,
    transform: TagTransform,
    builder: GeometryBuilder,
    options: OutputOptions,
    stats: OutputStats,
}

impl<M, W> Output<M, W>
where
    M: Middle,
    W: TableWriter,
{
    /// Assemble a pipeline. Call [`Output::start`] before feeding entities.
    pub fn new(
        middle: M,
        writer: W,
        transform: TagTransform,
        builder: GeometryBuilder,
        options: OutputOptions,
    ) -> Self {
        Self {
            middle,
            writer,
            transform,
            builder,
            options,
            stats: OutputStats::default(),
        }
    }

    /// Open the writer batch.
    pub fn start(&mut self) -> Result<(), OutputError> {
        self.writer.begin()?;
        Ok(())
    }

    /// Store a node and write it to the point table when exported.
    ///
    /// Exported nodes whose tags carry the `nocache` flag are not kept in
    /// the middle store.
    pub fn node_add(&mut self, node: Node) -> Result<(), OutputError> {
        let Node { id, lat, lon, mut tags } = node;
        let class = self.transform.classify(OsmType::Node, &mut tags);
        self.stats.nodes += 1;
        if !(class.keep && class.flags.contains(TagFlags::NOCACHE)) {
            self.middle.nodes_set(id, lat, lon)?;
        }
        if class.keep {
            let point = self.builder.project_point(lat, lon);
            self.writer.write_node(id, &tags, point.y(), point.x())?;
            self.stats.rows += 1;
        }
        Ok(())
    }

    /// Store a way. Exported areas wait in the pending register; other
    /// exported ways are written immediately.
    pub fn way_add(&mut self, way: Way) -> Result<(), OutputError> {
        let Way { id, nodes, mut tags } = way;
        let class = self.transform.classify(OsmType::Way, &mut tags);
        self.stats.ways += 1;
        let pending = class.keep && class.polygon;
        let stored = Way {
            id,
            nodes,
            tags,
        };
        self.middle.ways_set(&stored, pending)?;
        if class.keep && !class.polygon {
            let resolved = self.middle.nodes_get_list(&stored.nodes)?;
            let rows = self
                .renderer()
                .way_rows(id, stored.tags, &resolved, class.polygon);
            self.write_rows(rows)?;
        }
        Ok(())
    }

    /// Store a relation and render it. Member ways it supersedes leave the
    /// pending register.
    pub fn relation_add(&mut self, relation: Relation) -> Result<(), OutputError> {
        self.stats.relations += 1;
        self.middle.relations_set(&relation)?;
        let rendered = self.renderer().relation_rows(&self.middle, &relation)?;
        if let Some(rendered) = rendered {
            self.apply_relation_rows(rendered)?;
        }
        Ok(())
    }

    /// Dispatch an entity to the matching `*_add` operation.
    pub fn add(&mut self, element: Element) -> Result<(), OutputError> {
        match element {
            Element::Node(node) => self.node_add(node),
            Element::Way(way) => self.way_add(way),
            Element::Relation(relation) => self.relation_add(relation),
        }
    }

    /// Apply one change of a diff.
    pub fn apply_change(&mut self, action: ChangeAction, element: Element) -> Result<(), OutputError> {
        match (action, element) {
            (ChangeAction::Create, element) => self.add(element),
            (ChangeAction::Modify, Element::Node(node)) => self.node_modify(node),
            (ChangeAction::Modify, Element::Way(way)) => self.way_modify(way),
            (ChangeAction::Modify, Element::Relation(relation)) => self.relation_modify(relation),
            (ChangeAction::Delete, element) => match element.kind() {
                OsmType::Node => self.node_delete(element.id()),
                OsmType::Way => self.way_delete(element.id()),
                OsmType::Relation => self.relation_delete(element.id()),
            },
        }
    }

    /// Replace a node and mark its dependants pending.
    pub fn node_modify(&mut self, node: Node) -> Result<(), OutputError> {
        self.require_slim("node modify")?;
        let id = node.id;
        self.writer.delete_row(TableId::Point, id)?;
        self.middle.nodes_delete(id)?;
        self.node_add(node)?;
        self.middle.node_changed(id)?;
        Ok(())
    }

    /// Remove a node and mark its dependants pending.
    pub fn node_delete(&mut self, id: OsmId) -> Result<(), OutputError> {
        self.require_slim("node delete")?;
        self.writer.delete_row(TableId::Point, id)?;
        self.middle.nodes_delete(id)?;
        self.middle.node_changed(id)?;
        Ok(())
    }

    /// Replace a way and mark relations using it pending.
    pub fn way_modify(&mut self, way: Way) -> Result<(), OutputError> {
        self.require_slim("way modify")?;
        let id = way.id;
        self.delete_rows(id)?;
        self.middle.ways_delete(id)?;
        self.way_add(way)?;
        self.middle.way_changed(id)?;
        Ok(())
    }

    /// Remove a way and mark relations using it pending.
    pub fn way_delete(&mut self, id: OsmId) -> Result<(), OutputError> {
        self.require_slim("way delete")?;
        self.delete_rows(id)?;
        self.middle.ways_delete(id)?;
        self.middle.way_changed(id)?;
        Ok(())
    }

    /// Replace a relation. It is rendered again by the final flush.
    pub fn relation_modify(&mut self, relation: Relation) -> Result<(), OutputError> {
        self.require_slim("relation modify")?;
        let id = relation.id;
        self.delete_rows(-id)?;
        self.middle.relations_delete(id)?;
        self.middle.relations_set(&relation)?;
        self.middle.relation_changed(id)?;
        self.stats.relations += 1;
        Ok(())
    }

    /// Remove a relation. Its member ways become pending again, as do
    /// relations containing it.
    pub fn relation_delete(&mut self, id: OsmId) -> Result<(), OutputError> {
        self.require_slim("relation delete")?;
        self.delete_rows(-id)?;
        self.middle.relation_changed(id)?;
        self.middle.relations_delete(id)?;
        Ok(())
    }

    /// Render everything still pending, then commit the middle store and
    /// the writer batch.
    pub fn finish(&mut self) -> Result<OutputStats, OutputError> {
        let workers = self.options.flush_workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|source| OutputError::WorkerPool { workers, source })?;

        let way_ids = self.middle.pending_ways()?;
        info!("Rendering {} pending ways", way_ids.len());
        let renderer = self.renderer();
        let middle = &self.middle;
        let ways = pool.install(|| pending::render_ways(middle, renderer, &way_ids, workers))?;
        for (id, rows) in ways {
            if self.options.append {
                self.delete_rows(id)?;
            }
            self.write_rows(rows)?;
        }
        for id in &way_ids {
            self.middle.ways_done(*id)?;
        }
        self.stats.pending_ways += way_ids.len() as u64;

        let relation_ids = self.middle.pending_relations()?;
        info!("Rendering {} pending relations", relation_ids.len());
        let renderer = self.renderer();
        let middle = &self.middle;
        let relations =
            pool.install(|| pending::render_relations(middle, renderer, &relation_ids, workers))?;
        for (id, rendered) in relations {
            if self.options.append {
                self.delete_rows(-id)?;
            }
            if let Some(rendered) = rendered {
                self.apply_relation_rows(rendered)?;
            }
            self.middle.relations_done(id)?;
        }
        self.stats.pending_relations += relation_ids.len() as u64;

        self.middle.commit()?;
        self.writer.commit()?;
        info!(
            "Output finished: {} rows from {} nodes, {} ways, {} relations",
            self.stats.rows, self.stats.nodes, self.stats.ways, self.stats.relations
        );
        Ok(self.stats)
    }

    /// Counters so far.
    pub const fn stats(&self) -> OutputStats {
        self.stats
    }

    /// The middle store.
    pub const fn middle(&self) -> &M {
        &self.middle
    }

    /// The table writer.
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Take the pipeline apart.
    pub fn into_parts(self) -> (M, W) {
        (self.middle, self.writer)
    }

    fn renderer(&self) -> Renderer<'_> {
        Renderer {
            transform: &self.transform,
            builder: &self.builder,
            format: self.options.geometry_format,
        }
    }

    fn require_slim(&self, operation: &'static str) -> Result<(), OutputError> {
        if self.middle.is_slim() {
            Ok(())
        } else {
            Err(OutputError::SlimRequired { operation })
        }
    }

    fn apply_relation_rows(&mut self, rendered: RelationRows) -> Result<(), OutputError> {
        self.write_rows(rendered.rows)?;
        for way_id in rendered.superseded {
            debug!("way {way_id} superseded by a multipolygon");
            self.middle.ways_done(way_id)?;
            if self.options.append {
                self.delete_rows(way_id)?;
            }
        }
        Ok(())
    }

    fn write_rows(&mut self, rows: Vec<Row>) -> Result<(), OutputError> {
        for row in rows {
            self.writer
                .write_row(row.table, row.id, &row.tags, &row.geometry)?;
            self.stats.rows += 1;
        }
        Ok(())
    }

    /// Remove rows with `osm_id = id` from every way table.
    fn delete_rows(&mut self, id: OsmId) -> Result<(), OutputError> {
        for table in TableId::WAY_TABLES {
            self.writer.delete_row(table, id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingWriter, test_output};
    use crate::middle::RamMiddle;
    use crate::{Member, TagList};
    use rstest::{fixture, rstest};

    type TestOutput = Output<RamMiddle, RecordingWriter>;

    fn node(id: OsmId, lat: f64, lon: f64, tags: &[(&str, &str)]) -> Node {
        Node {
            id,
            lat,
            lon,
            tags: tags.iter().copied().collect(),
        }
    }

    fn way(id: OsmId, nodes: &[OsmId], tags: &[(&str, &str)]) -> Way {
        Way {
            id,
            nodes: nodes.to_vec(),
            tags: tags.iter().copied().collect(),
        }
    }

    /// Four corners of a 0.1 degree square, ids 1 to 4.
    fn corners(output: &mut TestOutput) {
        for (id, lat, lon) in [(1, 0.0, 0.0), (2, 0.0, 0.1), (3, 0.1, 0.1), (4, 0.1, 0.0)] {
            output.node_add(node(id, lat, lon, &[])).expect("node");
        }
    }

    #[fixture]
    fn output() -> TestOutput {
        let mut output = test_output(OutputOptions::default());
        output.start().expect("start");
        output
    }

    #[fixture]
    fn append_output() -> TestOutput {
        let mut output = test_output(OutputOptions {
            append: true,
            ..OutputOptions::default()
        });
        output.start().expect("start");
        output
    }

    #[rstest]
    fn exported_node_becomes_a_point(mut output: TestOutput) {
        output
            .node_add(node(7, 0.5, 0.25, &[("amenity", "cafe"), ("note", "x")]))
            .expect("node");
        output.node_add(node(8, 0.5, 0.5, &[])).expect("node");
        output.finish().expect("finish");

        let points = output.writer().rows_in(TableId::Point);
        assert_eq!(points.len(), 1);
        let point = points.first().expect("point");
        assert_eq!(point.id, 7);
        assert_eq!(point.geometry, "POINT(0.25 0.5)");
        assert_eq!(point.tags, TagList::from([("amenity", "cafe")]));
    }

    #[rstest]
    fn linear_way_is_written_immediately(mut output: TestOutput) {
        corners(&mut output);
        output
            .way_add(way(10, &[1, 2], &[("highway", "secondary")]))
            .expect("way");

        assert_eq!(output.writer().ids_in(TableId::Line), vec![10]);
        assert_eq!(output.writer().ids_in(TableId::Roads), vec![10]);
        let line = output.writer().rows_in(TableId::Line)[0].clone();
        assert_eq!(line.geometry, "LINESTRING(0 0,0.1 0)");
        assert_eq!(line.tags.get("z_order"), Some("6"));
    }

    #[rstest]
    fn area_waits_for_the_final_flush(mut output: TestOutput) {
        corners(&mut output);
        output
            .way_add(way(11, &[1, 2, 3, 4, 1], &[("landuse", "grass")]))
            .expect("way");
        assert!(output.writer().rows().is_empty());

        let stats = output.finish().expect("finish");
        assert_eq!(stats.pending_ways, 1);
        let polygons = output.writer().rows_in(TableId::Polygon);
        assert_eq!(polygons.len(), 1);
        let area: f64 = polygons[0]
            .tags
            .get("way_area")
            .expect("way_area")
            .parse()
            .expect("number");
        assert!(area > 0.0);
        assert_eq!(output.writer().commits(), 1);
    }

    #[rstest]
    fn area_no_keeps_a_closed_way_linear(mut output: TestOutput) {
        corners(&mut output);
        output
            .way_add(way(12, &[1, 2, 3, 4, 1], &[("leisure", "track"), ("area", "no")]))
            .expect("way");
        output.finish().expect("finish");
        assert_eq!(output.writer().ids_in(TableId::Line), vec![12]);
        assert!(output.writer().rows_in(TableId::Polygon).is_empty());
    }

    #[rstest]
    fn multipolygon_supersedes_matching_outer(mut output: TestOutput) {
        corners(&mut output);
        output
            .way_add(way(20, &[1, 2, 3, 4, 1], &[("landuse", "forest")]))
            .expect("way");
        output
            .relation_add(Relation {
                id: 5,
                members: vec![Member::new(OsmType::Way, 20, "outer")],
                tags: TagList::from([("type", "multipolygon")]),
            })
            .expect("relation");
        let stats = output.finish().expect("finish");

        assert_eq!(stats.pending_ways, 0);
        assert_eq!(output.writer().ids_in(TableId::Polygon), vec![-5]);
        let row = output.writer().rows_in(TableId::Polygon)[0].clone();
        assert_eq!(row.tags.get("landuse"), Some("forest"));
        assert!(row.geometry.starts_with("POLYGON(("));
    }

    #[rstest]
    fn nocache_node_is_not_stored(mut output: TestOutput) {
        output
            .node_add(node(1, 0.0, 0.0, &[("place", "village")]))
            .expect("node");
        output.node_add(node(2, 0.0, 0.1, &[])).expect("node");
        output
            .way_add(way(10, &[1, 2], &[("highway", "track")]))
            .expect("way");

        assert_eq!(output.writer().ids_in(TableId::Point), vec![1]);
        assert!(output.writer().rows_in(TableId::Line).is_empty());
    }

    #[rstest]
    #[case(ChangeAction::Delete, Element::Node(node(1, 0.0, 0.0, &[])), "node delete")]
    #[case(ChangeAction::Modify, Element::Way(way(1, &[], &[])), "way modify")]
    #[case(
        ChangeAction::Delete,
        Element::Relation(Relation { id: 1, members: Vec::new(), tags: TagList::new() }),
        "relation delete"
    )]
    fn changes_need_a_slim_store(
        mut output: TestOutput,
        #[case] action: ChangeAction,
        #[case] element: Element,
        #[case] expected: &str,
    ) {
        let err = output.apply_change(action, element).expect_err("rejected");
        assert!(matches!(err, OutputError::SlimRequired { operation } if operation == expected));
    }

    #[rstest]
    fn writes_outside_a_batch_fail() {
        let mut output = test_output(OutputOptions::default());
        let err = output
            .node_add(node(1, 0.0, 0.0, &[("amenity", "cafe")]))
            .expect_err("no batch");
        assert!(matches!(
            err,
            OutputError::Table(TableError::NoBatch { table: TableId::Point, .. })
        ));
    }

    #[rstest]
    fn node_modify_rerenders_dependent_ways_only(mut append_output: TestOutput) {
        let output = &mut append_output;
        corners(output);
        output
            .way_add(way(10, &[1, 2], &[("highway", "residential")]))
            .expect("way");
        output
            .way_add(way(11, &[3, 4], &[("highway", "residential")]))
            .expect("way");
        output.finish().expect("import");

        output.start().expect("start diff");
        output
            .apply_change(ChangeAction::Modify, Element::Node(node(1, 0.0, -0.1, &[])))
            .expect("modify");
        let stats = output.finish().expect("diff");

        assert_eq!(stats.pending_ways, 1);
        let lines = output.writer().rows_in(TableId::Line);
        assert_eq!(lines.len(), 2);
        let moved = lines.iter().find(|row| row.id == 10).expect("way 10");
        assert_eq!(moved.geometry, "LINESTRING(-0.1 0,0.1 0)");
        let untouched = lines.iter().find(|row| row.id == 11).expect("way 11");
        assert_eq!(untouched.geometry, "LINESTRING(0.1 0.1,0 0.1)");
    }

    #[rstest]
    fn relation_delete_restores_member_way(mut append_output: TestOutput) {
        let output = &mut append_output;
        corners(output);
        output
            .way_add(way(20, &[1, 2, 3, 4, 1], &[("landuse", "forest")]))
            .expect("way");
        output
            .relation_add(Relation {
                id: 5,
                members: vec![Member::new(OsmType::Way, 20, "outer")],
                tags: TagList::from([("type", "multipolygon")]),
            })
            .expect("relation");
        output.finish().expect("import");
        assert_eq!(output.writer().ids_in(TableId::Polygon), vec![-5]);

        output.start().expect("start diff");
        output.relation_delete(5).expect("delete");
        output.finish().expect("diff");
        assert_eq!(output.writer().ids_in(TableId::Polygon), vec![20]);
    }

    #[rstest]
    fn way_delete_removes_rows(mut append_output: TestOutput) {
        let output = &mut append_output;
        corners(output);
        output
            .way_add(way(10, &[1, 2], &[("highway", "primary")]))
            .expect("way");
        output.finish().expect("import");

        output.start().expect("start diff");
        output.way_delete(10).expect("delete");
        output.finish().expect("diff");
        assert!(output.writer().rows().is_empty());
    }
}
