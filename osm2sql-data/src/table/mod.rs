//! SQLite implementation of the output table boundary.
//!
//! Four tables `<prefix>_point`, `<prefix>_line`, `<prefix>_polygon` and
//! `<prefix>_roads` hold one row per rendered geometry. Every style key with
//! a column gets a typed column; numeric values are repaired on the way in.
//! Tags without a column land in a JSON `tags` column when hstore output is
//! enabled, and each hstore prefix gets its own JSON column with the prefix
//! stripped from the keys.

use geo::Point;
use log::info;
use osm2sql_core::geometry::Geometry;
use osm2sql_core::table::{EncodedGeometry, GeometryFormat, TableError, TableId, TableWriter};
use osm2sql_core::transform::TagTransform;
use osm2sql_core::{HstoreMode, OsmId, OsmType, TagList};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::database::{Database, DatabaseError, placeholders, quote_ident};

mod coerce;

pub use coerce::ColumnKind;

/// Options for [`SqliteTableWriter::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteTableOptions {
    /// Table name prefix, e.g. `planet_osm`.
    pub prefix: String,
    /// Keep existing tables and their rows.
    pub append: bool,
    /// Index `osm_id` so rows can be deleted when diffs arrive.
    pub slim: bool,
    /// Encoding of the `way` column.
    pub geometry_format: GeometryFormat,
}

impl Default for SqliteTableOptions {
    fn default() -> Self {
        Self {
            prefix: "planet_osm".to_owned(),
            append: false,
            slim: false,
            geometry_format: GeometryFormat::Wkt,
        }
    }
}

/// Errors raised by [`SqliteTableWriter`].
#[derive(Debug, Error)]
pub enum SqliteTableError {
    /// The shared connection failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// Creating a table failed.
    #[error("failed to set up table {table}")]
    Schema {
        /// Table name.
        table: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Writing or deleting a row failed.
    #[error("failed to {operation} row {id} in {table}")]
    Row {
        /// Failing operation.
        operation: &'static str,
        /// Table name.
        table: String,
        /// Row id.
        id: OsmId,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Serialising a JSON column failed.
    #[error("failed to encode JSON tags for row {id}")]
    Json {
        /// Row id.
        id: OsmId,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

/// A typed style column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, equal to the tag key.
    pub name: String,
    /// Storage class.
    pub kind: ColumnKind,
}

#[derive(Debug, Clone)]
struct TableLayout {
    id: TableId,
    name: String,
    quoted: String,
    columns: Vec<Column>,
    insert_sql: String,
    delete_sql: String,
}

impl TableLayout {
    fn new(id: TableId, prefix: &str, columns: Vec<Column>, extra: &[String]) -> Self {
        let name = id.name(prefix);
        let quoted = quote_ident(&name);
        let mut names = vec![quote_ident("osm_id")];
        names.extend(columns.iter().map(|column| quote_ident(&column.name)));
        names.extend(extra.iter().map(|column| quote_ident(column)));
        names.push(quote_ident("way"));
        let insert_sql = format!(
            "INSERT INTO {quoted} ({}) VALUES ({})",
            names.join(","),
            placeholders(names.len())
        );
        let delete_sql = format!("DELETE FROM {quoted} WHERE osm_id = ?1");
        Self {
            id,
            name,
            quoted,
            columns,
            insert_sql,
            delete_sql,
        }
    }

    fn create_sql(&self, extra: &[String], slim: bool) -> String {
        let mut definitions = vec![format!("{} INTEGER NOT NULL", quote_ident("osm_id"))];
        definitions.extend(
            self.columns
                .iter()
                .map(|column| format!("{} {}", quote_ident(&column.name), column.kind.sql_type())),
        );
        definitions.extend(extra.iter().map(|column| format!("{} TEXT", quote_ident(column))));
        definitions.push(format!("{} BLOB", quote_ident("way")));
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            self.quoted,
            definitions.join(", ")
        );
        if slim {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} (osm_id);",
                quote_ident(&format!("{}_pkey", self.name)),
                self.quoted
            ));
        }
        sql
    }
}

/// Table writer storing rows in SQLite.
///
/// # Examples
/// ```
/// use osm2sql_core::table::{EncodedGeometry, TableId, TableWriter};
/// use osm2sql_core::transform::{TagTransform, TransformSettings};
/// use osm2sql_core::{ExportRegistry, HstoreMode, TagList};
/// use osm2sql_data::{Database, SqliteTableOptions, SqliteTableWriter};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = ExportRegistry::parse_str("node,way highway text linear", HstoreMode::None)?;
/// let transform = TagTransform::new(registry, TransformSettings::default());
/// let mut writer = SqliteTableWriter::open(
///     Database::open_in_memory()?,
///     &transform,
///     SqliteTableOptions::default(),
/// )?;
/// writer.begin()?;
/// let geometry = EncodedGeometry::Wkt("LINESTRING(0 0,1 1)".to_owned());
/// writer.write_row(TableId::Line, 7, &TagList::from([("highway", "path")]), &geometry)?;
/// writer.commit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteTableWriter {
    db: Database,
    options: SqliteTableOptions,
    hstore: HstoreMode,
    hstore_columns: Vec<String>,
    extra_columns: Vec<String>,
    tables: Vec<TableLayout>,
    in_batch: bool,
}

impl SqliteTableWriter {
    /// Create (or, in append mode, reuse) the output tables on `db`.
    pub fn open(
        db: Database,
        transform: &TagTransform,
        options: SqliteTableOptions,
    ) -> Result<Self, SqliteTableError> {
        let registry = transform.registry();
        let hstore = registry.hstore();
        let hstore_columns = transform.settings().hstore_columns.clone();
        let mut extra_columns = hstore_columns.clone();
        if hstore.is_enabled() {
            extra_columns.push("tags".to_owned());
        }

        let point_columns = style_columns(transform, OsmType::Node);
        let mut way_columns = style_columns(transform, OsmType::Way);
        for (name, kind) in [("z_order", ColumnKind::Integer), ("way_area", ColumnKind::Real)] {
            if !way_columns.iter().any(|column| column.name == name) {
                way_columns.push(Column {
                    name: name.to_owned(),
                    kind,
                });
            }
        }

        let tables: Vec<TableLayout> = TableId::ALL
            .into_iter()
            .map(|id| {
                let columns = if id == TableId::Point {
                    point_columns.clone()
                } else {
                    way_columns.clone()
                };
                TableLayout::new(id, &options.prefix, columns, &extra_columns)
            })
            .collect();

        {
            let conn = db.writer()?;
            for table in &tables {
                let schema_error = |source| SqliteTableError::Schema {
                    table: table.name.clone(),
                    source,
                };
                if !options.append {
                    info!("Setting up table {}", table.name);
                    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.quoted))
                        .map_err(schema_error)?;
                }
                conn.execute_batch(&table.create_sql(&extra_columns, options.slim))
                    .map_err(schema_error)?;
            }
        }
        db.commit()?;

        Ok(Self {
            db,
            options,
            hstore,
            hstore_columns,
            extra_columns,
            tables,
            in_batch: false,
        })
    }

    /// Typed style columns of `table`, in insertion order.
    pub fn columns(&self, table: TableId) -> &[Column] {
        self.layout(table)
            .map(|layout| layout.columns.as_slice())
            .unwrap_or_default()
    }

    /// Names of the JSON columns following the style columns.
    pub fn json_columns(&self) -> &[String] {
        &self.extra_columns
    }

    fn layout(&self, table: TableId) -> Option<&TableLayout> {
        self.tables.iter().find(|layout| layout.id == table)
    }

    fn require_batch(&self, operation: &'static str, table: TableId) -> Result<(), TableError> {
        if self.in_batch {
            Ok(())
        } else {
            Err(TableError::NoBatch { operation, table })
        }
    }

    fn row_values(
        &self,
        layout: &TableLayout,
        id: OsmId,
        tags: &TagList,
        geometry: Value,
    ) -> Result<Vec<Value>, SqliteTableError> {
        let mut values = Vec::with_capacity(layout.columns.len() + self.extra_columns.len() + 2);
        values.push(Value::Integer(id));
        for column in &layout.columns {
            values.push(column_value(column, tags.get(&column.name)));
        }
        for prefix in &self.hstore_columns {
            let stripped: Map<String, JsonValue> = tags
                .pairs()
                .filter_map(|(key, value)| {
                    key.strip_prefix(prefix.as_str())
                        .map(|short| (short.to_owned(), JsonValue::from(value)))
                })
                .collect();
            values.push(json_value(id, stripped)?.unwrap_or(Value::Null));
        }
        if self.hstore.is_enabled() {
            let general: Map<String, JsonValue> = tags
                .pairs()
                .filter(|(key, _)| !matches!(*key, "z_order" | "way_area"))
                .filter(|(key, _)| {
                    self.hstore == HstoreMode::All
                        || !layout.columns.iter().any(|column| column.name == *key)
                })
                .map(|(key, value)| (key.to_owned(), JsonValue::from(value)))
                .collect();
            values.push(
                serde_json::to_string(&general)
                    .map(Value::Text)
                    .map_err(|source| SqliteTableError::Json { id, source })?,
            );
        }
        values.push(geometry);
        Ok(values)
    }

    fn insert(
        &self,
        table: TableId,
        id: OsmId,
        tags: &TagList,
        geometry: Value,
    ) -> Result<(), SqliteTableError> {
        let Some(layout) = self.layout(table) else {
            return Ok(());
        };
        let values = self.row_values(layout, id, tags, geometry)?;
        let conn = self.db.writer()?;
        conn.prepare_cached(&layout.insert_sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
            .map(|_| ())
            .map_err(|source| SqliteTableError::Row {
                operation: "insert",
                table: layout.name.clone(),
                id,
                source,
            })
    }

    fn remove(&self, table: TableId, id: OsmId) -> Result<(), SqliteTableError> {
        let Some(layout) = self.layout(table) else {
            return Ok(());
        };
        let conn = self.db.writer()?;
        conn.prepare_cached(&layout.delete_sql)
            .and_then(|mut stmt| stmt.execute([id]))
            .map(|_| ())
            .map_err(|source| SqliteTableError::Row {
                operation: "delete",
                table: layout.name.clone(),
                id,
                source,
            })
    }
}

fn style_columns(transform: &TagTransform, kind: OsmType) -> Vec<Column> {
    transform
        .registry()
        .columns(kind)
        .into_iter()
        .map(|rule| Column {
            name: rule.key.clone(),
            kind: ColumnKind::from_style(&rule.column_type),
        })
        .collect()
}

fn column_value(column: &Column, raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match column.kind {
        ColumnKind::Integer => coerce::integer(raw).map_or(Value::Null, Value::Integer),
        ColumnKind::Real => coerce::real(raw).map_or(Value::Null, Value::Real),
        ColumnKind::Text => Value::Text(raw.to_owned()),
    }
}

fn json_value(id: OsmId, map: Map<String, JsonValue>) -> Result<Option<Value>, SqliteTableError> {
    if map.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(&map)
        .map(|text| Some(Value::Text(text)))
        .map_err(|source| SqliteTableError::Json { id, source })
}

fn geometry_value(geometry: &EncodedGeometry) -> Value {
    match geometry {
        EncodedGeometry::Wkt(text) => Value::Text(text.clone()),
        EncodedGeometry::Wkb(bytes) => Value::Blob(bytes.clone()),
    }
}

fn backend(operation: &'static str) -> impl FnOnce(SqliteTableError) -> TableError {
    move |err| TableError::backend(operation, err)
}

impl TableWriter for SqliteTableWriter {
    fn begin(&mut self) -> Result<(), TableError> {
        drop(self.db.writer().map_err(SqliteTableError::from).map_err(backend("begin"))?);
        self.in_batch = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TableError> {
        self.db
            .commit()
            .map_err(SqliteTableError::from)
            .map_err(backend("commit"))?;
        self.in_batch = false;
        Ok(())
    }

    fn write_node(
        &mut self,
        id: OsmId,
        tags: &TagList,
        lat: f64,
        lon: f64,
    ) -> Result<(), TableError> {
        self.require_batch("write_node", TableId::Point)?;
        let point = Geometry::Point(Point::new(lon, lat));
        let encoded = EncodedGeometry::encode(&point, self.options.geometry_format);
        self.insert(TableId::Point, id, tags, geometry_value(&encoded))
            .map_err(backend("write_node"))
    }

    fn write_row(
        &mut self,
        table: TableId,
        id: OsmId,
        tags: &TagList,
        geometry: &EncodedGeometry,
    ) -> Result<(), TableError> {
        self.require_batch("write_row", table)?;
        self.insert(table, id, tags, geometry_value(geometry))
            .map_err(backend("write_row"))
    }

    fn delete_row(&mut self, table: TableId, id: OsmId) -> Result<(), TableError> {
        self.require_batch("delete_row", table)?;
        self.remove(table, id).map_err(backend("delete_row"))
    }
}
