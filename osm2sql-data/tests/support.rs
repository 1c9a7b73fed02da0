use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use osm2sql_core::HstoreMode;
use osm2sql_core::geometry::{GeometryBuilder, Projection};
use osm2sql_core::output::{Output, OutputOptions};
use osm2sql_core::test_support::test_transform;
use osm2sql_core::transform::TransformSettings;
use osm2sql_data::{
    Database, MiddleMode, SqliteMiddle, SqliteMiddleOptions, SqliteTableOptions,
    SqliteTableWriter,
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::{Builder, TempPath};

/// Epsilon for floating-point coordinate comparisons in tests
const COORDINATE_EPSILON: f64 = 1.0e-7;

/// Pipeline over the SQLite middle and table writer.
pub type SqliteOutput = Output<SqliteMiddle, SqliteTableWriter>;

/// Directory containing the encoded fixture blobs.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Decode a Base64-encoded fixture into a temporary `.osm.pbf` file.
pub fn decode_fixture(dir: &Path, stem: &str) -> TempPath {
    let encoded_path = dir.join(format!("{stem}.osm.pbf.b64"));
    let encoded = fs::read_to_string(&encoded_path).unwrap_or_else(|err| {
        panic!("failed to read base64 fixture {encoded_path:?}: {err}");
    });
    let cleaned: String = encoded
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    let decoded = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .unwrap_or_else(|err| {
            panic!("failed to decode base64 fixture {encoded_path:?}: {err}");
        });
    write_temp(stem, ".osm.pbf", &decoded)
}

/// Write an XML document into a temporary file with the given suffix.
pub fn write_xml(stem: &str, suffix: &str, document: &str) -> TempPath {
    write_temp(stem, suffix, document.as_bytes())
}

fn write_temp(stem: &str, suffix: &str, contents: &[u8]) -> TempPath {
    let mut tempfile = Builder::new()
        .prefix(stem)
        .suffix(suffix)
        .tempfile()
        .unwrap_or_else(|err| {
            panic!("failed to create temporary fixture for {stem}: {err}");
        });
    tempfile.write_all(contents).unwrap_or_else(|err| {
        panic!("failed to write fixture for {stem}: {err}");
    });
    tempfile.flush().unwrap_or_else(|err| {
        panic!("failed to flush fixture for {stem}: {err}");
    });
    tempfile.into_temp_path()
}

/// View a temporary path as UTF-8.
pub fn utf8(path: &Path) -> &Utf8Path {
    Utf8Path::from_path(path).unwrap_or_else(|| panic!("non UTF-8 temp path {path:?}"))
}

/// Database file inside `dir`.
pub fn database_path(dir: &Path) -> Utf8PathBuf {
    utf8(dir).join("osm.sqlite")
}

/// Slim pipeline over `db` in geographic coordinates using the test style.
pub fn sqlite_output(db: &Database, append: bool) -> SqliteOutput {
    let transform = test_transform(HstoreMode::None, TransformSettings::default());
    let mode = if append {
        MiddleMode::Append
    } else {
        MiddleMode::Create
    };
    let middle = SqliteMiddle::open(
        db.clone(),
        SqliteMiddleOptions {
            mode,
            ..SqliteMiddleOptions::default()
        },
    )
    .expect("middle tables opened");
    let writer = SqliteTableWriter::open(
        db.clone(),
        &transform,
        SqliteTableOptions {
            append,
            slim: true,
            ..SqliteTableOptions::default()
        },
    )
    .expect("output tables opened");
    Output::new(
        middle,
        writer,
        transform,
        GeometryBuilder::new(Projection::Geographic),
        OutputOptions {
            append,
            ..OutputOptions::default()
        },
    )
}

/// Ids in `table`, ascending.
pub fn table_ids(db: &Database, table: &str) -> Vec<i64> {
    let conn = db.lock().expect("connection lock");
    let mut stmt = conn
        .prepare(&format!("SELECT osm_id FROM {table} ORDER BY osm_id"))
        .expect("prepare id query");
    stmt.query_map([], |row| row.get(0))
        .expect("query ids")
        .collect::<Result<_, _>>()
        .expect("read ids")
}

/// One text column of the row `id` in `table`.
pub fn column_text(db: &Database, table: &str, column: &str, id: i64) -> Option<String> {
    let conn = db.lock().expect("connection lock");
    conn.query_row(
        &format!("SELECT {column} FROM {table} WHERE osm_id = ?1"),
        [id],
        |row| row.get(0),
    )
    .expect("row present")
}

/// Compare floating-point coordinates within a small epsilon.
pub fn assert_close(actual: f64, expected: f64) {
    let delta = (actual - expected).abs();
    assert!(
        delta <= COORDINATE_EPSILON,
        "expected {expected}, got {actual} (|Δ| = {delta})"
    );
}
