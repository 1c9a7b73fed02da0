//! Test-only, in-memory `TableWriter` implementation and pipeline helpers
//! used by unit and behaviour tests.

use crate::geometry::{GeometryBuilder, Projection};
use crate::middle::RamMiddle;
use crate::output::{Output, OutputOptions};
use crate::table::{EncodedGeometry, TableError, TableId, TableWriter};
use crate::transform::{TagTransform, TransformSettings};
use crate::{ExportRegistry, HstoreMode, NodeCacheConfig, OsmId, TagList};

/// Style used by the behaviour tests: a handful of linear and area keys.
pub const TEST_STYLE: &str = "\
node,way  access      text  linear
node,way  amenity     text  polygon
node,way  boundary    text  linear
node,way  building    text  polygon
node,way  highway     text  linear
node,way  landuse     text  polygon
node,way  layer       text  linear
node,way  leisure     text  polygon
node,way  name        text  linear
node,way  natural     text  polygon
node,way  railway     text  linear
node,way  bridge      text  linear
node,way  tunnel      text  linear
node,way  ref         text  linear
node,way  route       text  linear
node,way  admin_level text  linear
node,way  waterway    text  polygon
node      place       text  nocache
way       area        text
way       lcn         text  linear
way       lcn_ref     text  linear
way       route_pref_color text linear
node,way  note        text  delete
node,way  source:*    text  delete
";

/// One row captured by [`RecordingWriter`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRow {
    /// Target table.
    pub table: TableId,
    /// Row id: way id, negated relation id, or node id.
    pub id: OsmId,
    /// Tags handed to the writer.
    pub tags: TagList,
    /// WKT, or hex WKB for binary output. Points are rendered as
    /// `POINT(lon lat)`.
    pub geometry: String,
}

/// In-memory `TableWriter` keeping rows in write order.
///
/// Writes outside a batch fail with [`TableError::NoBatch`], which mirrors
/// the contract real backends enforce.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    rows: Vec<RecordedRow>,
    in_batch: bool,
    commits: usize,
}

impl RecordingWriter {
    /// All rows currently present.
    pub fn rows(&self) -> &[RecordedRow] {
        &self.rows
    }

    /// Rows of one table.
    pub fn rows_in(&self, table: TableId) -> Vec<&RecordedRow> {
        self.rows.iter().filter(|row| row.table == table).collect()
    }

    /// Ids present in one table, in write order.
    pub fn ids_in(&self, table: TableId) -> Vec<OsmId> {
        self.rows_in(table).iter().map(|row| row.id).collect()
    }

    /// Number of committed batches.
    pub const fn commits(&self) -> usize {
        self.commits
    }

    fn ensure_batch(&self, operation: &'static str, table: TableId) -> Result<(), TableError> {
        if self.in_batch {
            Ok(())
        } else {
            Err(TableError::NoBatch { operation, table })
        }
    }
}

impl TableWriter for RecordingWriter {
    fn begin(&mut self) -> Result<(), TableError> {
        self.in_batch = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TableError> {
        self.in_batch = false;
        self.commits += 1;
        Ok(())
    }

    fn write_node(
        &mut self,
        id: OsmId,
        tags: &TagList,
        lat: f64,
        lon: f64,
    ) -> Result<(), TableError> {
        self.ensure_batch("write_node", TableId::Point)?;
        self.rows.push(RecordedRow {
            table: TableId::Point,
            id,
            tags: tags.clone(),
            geometry: format!("POINT({lon} {lat})"),
        });
        Ok(())
    }

    fn write_row(
        &mut self,
        table: TableId,
        id: OsmId,
        tags: &TagList,
        geometry: &EncodedGeometry,
    ) -> Result<(), TableError> {
        self.ensure_batch("write_row", table)?;
        self.rows.push(RecordedRow {
            table,
            id,
            tags: tags.clone(),
            geometry: geometry.to_text(),
        });
        Ok(())
    }

    fn delete_row(&mut self, table: TableId, id: OsmId) -> Result<(), TableError> {
        self.ensure_batch("delete_row", table)?;
        self.rows.retain(|row| !(row.table == table && row.id == id));
        Ok(())
    }
}

/// Tag transform over [`TEST_STYLE`].
///
/// # Panics
///
/// Panics if the bundled test style fails to parse.
pub fn test_transform(hstore: HstoreMode, settings: TransformSettings) -> TagTransform {
    let registry = ExportRegistry::parse_str(TEST_STYLE, hstore).expect("test style parses");
    TagTransform::new(registry, settings)
}

/// Pipeline over a RAM middle and a recording writer, working in
/// geographic coordinates so expected geometry reads as input degrees.
pub fn test_output(options: OutputOptions) -> Output<RamMiddle, RecordingWriter> {
    let middle = RamMiddle::new(NodeCacheConfig::default());
    let middle = if options.append {
        middle.accepting_changes()
    } else {
        middle
    };
    Output::new(
        middle,
        RecordingWriter::default(),
        test_transform(HstoreMode::None, TransformSettings::default()),
        GeometryBuilder::new(Projection::Geographic),
        options,
    )
}
