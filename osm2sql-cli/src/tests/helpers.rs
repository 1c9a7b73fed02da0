//! Test helpers for composing import datasets and arguments.

use crate::import::{ImportArgs, ProjectionArg};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

const EXTRACT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <node id="1" lat="51.5" lon="-0.1"/>
  <node id="2" lat="51.5" lon="-0.09"/>
  <node id="3" lat="51.501" lon="-0.095">
    <tag k="amenity" v="cafe"/>
    <tag k="name" v="Corner"/>
  </node>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
    <tag k="name" v="Loop"/>
  </way>
</osm>
"#;

const DELETE_CAFE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osmChange version="0.6" generator="test">
  <delete>
    <node id="3"/>
  </delete>
</osmChange>
"#;

/// An extract, a diff and a database path inside one temporary directory.
#[derive(Debug)]
pub(super) struct DatasetFiles {
    _dir: TempDir,
    extract: Utf8PathBuf,
    diff: Utf8PathBuf,
    database: Utf8PathBuf,
}

impl DatasetFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let extract = root.join("extract.osm");
        let diff = root.join("delete-cafe.osc");
        fs::write(&extract, EXTRACT).expect("write extract");
        fs::write(&diff, DELETE_CAFE).expect("write diff");
        Self {
            _dir: dir,
            extract,
            diff,
            database: root.join("out/osm.sqlite"),
        }
    }

    pub(super) fn extract(&self) -> &Utf8Path {
        &self.extract
    }

    pub(super) fn diff(&self) -> &Utf8Path {
        &self.diff
    }

    pub(super) fn database(&self) -> &Utf8Path {
        &self.database
    }
}

/// Arguments importing `input` into the dataset database in lat/lon.
pub(super) fn import_args(dataset: &DatasetFiles, input: &Utf8Path) -> ImportArgs {
    ImportArgs {
        inputs: vec![input.to_path_buf()],
        database: Some(dataset.database().to_path_buf()),
        projection: Some(ProjectionArg::Latlong),
        cache: Some(16),
        ..ImportArgs::default()
    }
}

/// Ids stored in `table`, ascending.
pub(super) fn table_ids(database: &Utf8Path, table: &str) -> Vec<i64> {
    let conn = rusqlite::Connection::open(database.as_std_path()).expect("open database");
    let mut stmt = conn
        .prepare(&format!("SELECT osm_id FROM {table} ORDER BY osm_id"))
        .expect("prepare query");
    stmt.query_map([], |row| row.get(0))
        .expect("query ids")
        .collect::<Result<_, _>>()
        .expect("read ids")
}
