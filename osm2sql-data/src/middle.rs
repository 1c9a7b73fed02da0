//! Slim middle store persisted in SQLite.
//!
//! Node positions, way node lists and relation member lists survive the run
//! so later diffs can find every way and relation a change touches. Reverse
//! lookup tables (`*_way_nodes`, `*_rel_members`) are kept in step with the
//! primary rows. A RAM node cache sits in front of the node table.

use std::borrow::Cow;

use log::{debug, info};
use osm2sql_core::middle::{Middle, MiddleError, MiddleQuery, WayNodes, resolve_ways};
use osm2sql_core::{
    Member, NodeCache, NodeCacheConfig, NodeCacheError, NodeList, OsmId, OsmType, Relation,
    TagList, Way,
};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::{Database, DatabaseError, IN_CHUNK, placeholders, quote_ident};

/// Whether an existing store is reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MiddleMode {
    /// Drop and recreate the middle tables.
    #[default]
    Create,
    /// Keep existing middle tables; diffs are applied on top.
    Append,
}

/// Options for [`SqliteMiddle::open`].
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteMiddleOptions {
    /// Table name prefix, e.g. `planet_osm`.
    pub prefix: String,
    /// Create or append.
    pub mode: MiddleMode,
    /// Node cache in front of the node table.
    pub cache: NodeCacheConfig,
}

impl Default for SqliteMiddleOptions {
    fn default() -> Self {
        Self {
            prefix: "planet_osm".to_owned(),
            mode: MiddleMode::Create,
            cache: NodeCacheConfig::default(),
        }
    }
}

/// Errors raised by [`SqliteMiddle`].
#[derive(Debug, Error)]
pub enum SqliteMiddleError {
    /// The shared connection failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// Creating or dropping middle tables failed.
    #[error("failed to set up middle tables with prefix {prefix:?}")]
    Schema {
        /// Table prefix.
        prefix: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A statement failed.
    #[error("middle {operation} failed for id {id}")]
    Statement {
        /// Failing operation.
        operation: &'static str,
        /// Entity the statement concerned.
        id: OsmId,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Encoding a list for storage failed.
    #[error("failed to encode stored data for id {id}")]
    Encode {
        /// Entity id.
        id: OsmId,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// A stored list could not be decoded.
    #[error("stored data for id {id} is corrupt")]
    Decode {
        /// Entity id.
        id: OsmId,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// A stored member carried an unknown type code.
    #[error("relation {relation} has a member of unknown type {code:?}")]
    MemberType {
        /// Relation id.
        relation: OsmId,
        /// Offending code.
        code: char,
    },
}

impl From<SqliteMiddleError> for MiddleError {
    fn from(err: SqliteMiddleError) -> Self {
        Self::backend(err)
    }
}

#[derive(Debug)]
struct Tables {
    nodes: String,
    ways: String,
    way_nodes: String,
    rels: String,
    rel_members: String,
}

impl Tables {
    fn new(prefix: &str) -> Self {
        Self {
            nodes: quote_ident(&format!("{prefix}_nodes")),
            ways: quote_ident(&format!("{prefix}_ways")),
            way_nodes: quote_ident(&format!("{prefix}_way_nodes")),
            rels: quote_ident(&format!("{prefix}_rels")),
            rel_members: quote_ident(&format!("{prefix}_rel_members")),
        }
    }
}

/// Middle store backed by SQLite tables.
///
/// # Examples
/// ```
/// use osm2sql_core::middle::{Middle, MiddleQuery};
/// use osm2sql_data::{Database, SqliteMiddle, SqliteMiddleOptions};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::open_in_memory()?;
/// let mut middle = SqliteMiddle::open(db, SqliteMiddleOptions::default())?;
/// middle.nodes_set(1, 51.5, -0.1)?;
/// assert_eq!(middle.nodes_get_list(&[1, 2])?.resolved, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteMiddle {
    db: Database,
    prefix: String,
    tables: Tables,
    cache: NodeCache,
}

impl SqliteMiddle {
    /// Open the middle tables on `db`, creating them as `options.mode`
    /// requires.
    pub fn open(db: Database, options: SqliteMiddleOptions) -> Result<Self, SqliteMiddleError> {
        let tables = Tables::new(&options.prefix);
        {
            let conn = db.writer()?;
            let schema_error = |source| SqliteMiddleError::Schema {
                prefix: options.prefix.clone(),
                source,
            };
            if options.mode == MiddleMode::Create {
                info!("Dropping middle tables with prefix {}", options.prefix);
                conn.execute_batch(&format!(
                    "DROP TABLE IF EXISTS {};
                     DROP TABLE IF EXISTS {};
                     DROP TABLE IF EXISTS {};
                     DROP TABLE IF EXISTS {};
                     DROP TABLE IF EXISTS {};",
                    tables.nodes, tables.ways, tables.way_nodes, tables.rels, tables.rel_members
                ))
                .map_err(schema_error)?;
            }
            conn.execute_batch(&schema_sql(&options.prefix, &tables))
                .map_err(schema_error)?;
        }
        db.commit()?;
        Ok(Self {
            db,
            prefix: options.prefix,
            tables,
            cache: NodeCache::new(options.cache),
        })
    }

    /// The shared database handle.
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Table name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn fetch_nodes(
        &self,
        conn: &Connection,
        ids: &[OsmId],
        list: &mut NodeList,
    ) -> Result<(), SqliteMiddleError> {
        let missing: Vec<usize> = list.missing_positions().collect();
        if missing.is_empty() {
            return Ok(());
        }
        let wanted: Vec<OsmId> = missing.iter().filter_map(|idx| ids.get(*idx).copied()).collect();
        let mut found = std::collections::HashMap::new();
        for chunk in wanted.chunks(IN_CHUNK) {
            let sql = format!(
                "SELECT id, lat, lon FROM {} WHERE id IN ({})",
                self.tables.nodes,
                placeholders(chunk.len())
            );
            let mut stmt = conn
                .prepare_cached(&sql)
                .map_err(|source| statement("node lookup", lead(chunk), source))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, OsmId>(0)?, row.get::<_, f64>(1)?, row.get::<_, f64>(2)?))
                })
                .map_err(|source| statement("node lookup", lead(chunk), source))?;
            for row in rows {
                let (id, lat, lon) = row.map_err(|source| statement("node lookup", 0, source))?;
                found.insert(id, geo::Coord { x: lon, y: lat });
            }
        }
        for idx in missing {
            if let Some(coord) = ids.get(idx).and_then(|id| found.get(id)) {
                list.fill(idx, *coord);
            }
        }
        Ok(())
    }

    fn load_ways(&self, conn: &Connection, ids: &[OsmId]) -> Result<Vec<Way>, SqliteMiddleError> {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let mut ways = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(IN_CHUNK) {
            let sql = format!(
                "SELECT id, nodes, tags FROM {} WHERE id IN ({})",
                self.tables.ways,
                placeholders(chunk.len())
            );
            let mut stmt = conn
                .prepare_cached(&sql)
                .map_err(|source| statement("way lookup", lead(chunk), source))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((
                        row.get::<_, OsmId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|source| statement("way lookup", lead(chunk), source))?;
            for row in rows {
                let (id, nodes, tags) = row.map_err(|source| statement("way lookup", 0, source))?;
                ways.push(Way {
                    id,
                    nodes: serde_json::from_str(&nodes)
                        .map_err(|source| SqliteMiddleError::Decode { id, source })?,
                    tags: decode_tags(id, &tags)?,
                });
            }
        }
        Ok(ways)
    }

    fn ids(
        &self,
        conn: &Connection,
        sql: &str,
        operation: &'static str,
        id: OsmId,
        params: impl rusqlite::Params,
    ) -> Result<Vec<OsmId>, SqliteMiddleError> {
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|source| statement(operation, id, source))?;
        let rows = stmt
            .query_map(params, |row| row.get::<_, OsmId>(0))
            .map_err(|source| statement(operation, id, source))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|source| statement(operation, id, source))
    }

    fn exec(
        conn: &Connection,
        sql: &str,
        operation: &'static str,
        id: OsmId,
        params: impl rusqlite::Params,
    ) -> Result<usize, SqliteMiddleError> {
        conn.prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params))
            .map_err(|source| statement(operation, id, source))
    }

    fn relations_using(
        &self,
        conn: &Connection,
        kind: OsmType,
        id: OsmId,
    ) -> Result<Vec<OsmId>, SqliteMiddleError> {
        let sql = format!(
            "SELECT DISTINCT rel_id FROM {} WHERE member_type = ?1 AND member_id = ?2",
            self.tables.rel_members
        );
        self.ids(
            conn,
            &sql,
            "relation parent lookup",
            id,
            params![kind.code().to_string(), id],
        )
    }

    fn mark_relations_pending(
        &self,
        conn: &Connection,
        ids: &[OsmId],
    ) -> Result<(), SqliteMiddleError> {
        let sql = format!("UPDATE {} SET pending = 1 WHERE id = ?1", self.tables.rels);
        for id in ids {
            Self::exec(conn, &sql, "relation pending mark", *id, params![id])?;
        }
        Ok(())
    }

    fn pending(&self, table: &str, operation: &'static str) -> Result<Vec<OsmId>, MiddleError> {
        let conn = self.db.lock().map_err(SqliteMiddleError::from)?;
        let sql = format!("SELECT id FROM {table} WHERE pending = 1 ORDER BY id");
        Ok(self.ids(&conn, &sql, operation, 0, params![])?)
    }

    fn set_pending(
        &self,
        table: &str,
        id: OsmId,
        pending: bool,
        operation: &'static str,
    ) -> Result<(), MiddleError> {
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let sql = format!("UPDATE {table} SET pending = ?1 WHERE id = ?2");
        Self::exec(&conn, &sql, operation, id, params![pending, id])?;
        Ok(())
    }
}

fn schema_sql(prefix: &str, tables: &Tables) -> String {
    let index = |suffix: &str| quote_ident(&format!("{prefix}_{suffix}"));
    format!(
        "CREATE TABLE IF NOT EXISTS {nodes} (
            id INTEGER PRIMARY KEY,
            lat REAL NOT NULL,
            lon REAL NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {ways} (
            id INTEGER PRIMARY KEY,
            nodes TEXT NOT NULL,
            tags TEXT NOT NULL,
            pending INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS {ways_pending} ON {ways} (pending) WHERE pending = 1;
        CREATE TABLE IF NOT EXISTS {way_nodes} (
            node_id INTEGER NOT NULL,
            way_id INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {way_nodes_node} ON {way_nodes} (node_id);
        CREATE INDEX IF NOT EXISTS {way_nodes_way} ON {way_nodes} (way_id);
        CREATE TABLE IF NOT EXISTS {rels} (
            id INTEGER PRIMARY KEY,
            members TEXT NOT NULL,
            tags TEXT NOT NULL,
            pending INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS {rels_pending} ON {rels} (pending) WHERE pending = 1;
        CREATE TABLE IF NOT EXISTS {rel_members} (
            member_type TEXT NOT NULL,
            member_id INTEGER NOT NULL,
            rel_id INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {rel_members_member} ON {rel_members} (member_type, member_id);
        CREATE INDEX IF NOT EXISTS {rel_members_rel} ON {rel_members} (rel_id);",
        nodes = tables.nodes,
        ways = tables.ways,
        way_nodes = tables.way_nodes,
        rels = tables.rels,
        rel_members = tables.rel_members,
        ways_pending = index("ways_pending"),
        way_nodes_node = index("way_nodes_node"),
        way_nodes_way = index("way_nodes_way"),
        rels_pending = index("rels_pending"),
        rel_members_member = index("rel_members_member"),
        rel_members_rel = index("rel_members_rel"),
    )
}

fn lead(chunk: &[OsmId]) -> OsmId {
    chunk.first().copied().unwrap_or_default()
}

fn statement(operation: &'static str, id: OsmId, source: rusqlite::Error) -> SqliteMiddleError {
    SqliteMiddleError::Statement {
        operation,
        id,
        source,
    }
}

fn encode_tags(id: OsmId, tags: &TagList) -> Result<String, SqliteMiddleError> {
    let pairs: Vec<(&str, &str)> = tags.pairs().collect();
    serde_json::to_string(&pairs).map_err(|source| SqliteMiddleError::Encode { id, source })
}

fn decode_tags(id: OsmId, raw: &str) -> Result<TagList, SqliteMiddleError> {
    let pairs: Vec<(String, String)> =
        serde_json::from_str(raw).map_err(|source| SqliteMiddleError::Decode { id, source })?;
    Ok(pairs.into_iter().collect())
}

/// Relation member as stored in the `members` column.
#[derive(Debug, Serialize, Deserialize)]
struct StoredMember<'a> {
    #[serde(rename = "type")]
    kind: char,
    #[serde(rename = "ref")]
    id: OsmId,
    #[serde(borrow)]
    role: Cow<'a, str>,
}

fn encode_members(relation: &Relation) -> Result<String, SqliteMiddleError> {
    let members: Vec<StoredMember<'_>> = relation
        .members
        .iter()
        .map(|member| StoredMember {
            kind: member.kind.code(),
            id: member.id,
            role: Cow::Borrowed(member.role.as_str()),
        })
        .collect();
    serde_json::to_string(&members).map_err(|source| SqliteMiddleError::Encode {
        id: relation.id,
        source,
    })
}

fn decode_members(id: OsmId, raw: &str) -> Result<Vec<Member>, SqliteMiddleError> {
    let members: Vec<StoredMember<'_>> =
        serde_json::from_str(raw).map_err(|source| SqliteMiddleError::Decode { id, source })?;
    members
        .into_iter()
        .map(|member| {
            OsmType::from_code(member.kind)
                .map(|kind| Member::new(kind, member.id, member.role))
                .ok_or(SqliteMiddleError::MemberType {
                    relation: id,
                    code: member.kind,
                })
        })
        .collect()
}

impl MiddleQuery for SqliteMiddle {
    fn nodes_get_list(&self, ids: &[OsmId]) -> Result<NodeList, MiddleError> {
        let mut list = self.cache.get_list(ids);
        if list.resolved < ids.len() {
            let conn = self.db.lock().map_err(SqliteMiddleError::from)?;
            self.fetch_nodes(&conn, ids, &mut list)?;
        }
        Ok(list)
    }

    fn ways_get(&self, id: OsmId) -> Result<Option<WayNodes>, MiddleError> {
        Ok(self.ways_get_list(&[id])?.into_iter().next())
    }

    fn ways_get_list(&self, ids: &[OsmId]) -> Result<Vec<WayNodes>, MiddleError> {
        let ways = {
            let conn = self.db.lock().map_err(SqliteMiddleError::from)?;
            self.load_ways(&conn, ids)?
        };
        resolve_ways(self, ways)
    }

    fn relations_get(&self, id: OsmId) -> Result<Option<Relation>, MiddleError> {
        let conn = self.db.lock().map_err(SqliteMiddleError::from)?;
        let sql = format!("SELECT members, tags FROM {} WHERE id = ?1", self.tables.rels);
        let row = conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.query_row(params![id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .optional()
            })
            .map_err(|source| statement("relation lookup", id, source))?;
        let Some((members, tags)) = row else {
            return Ok(None);
        };
        Ok(Some(Relation {
            id,
            members: decode_members(id, &members)?,
            tags: decode_tags(id, &tags)?,
        }))
    }
}

impl Middle for SqliteMiddle {
    fn nodes_set(&mut self, id: OsmId, lat: f64, lon: f64) -> Result<(), MiddleError> {
        let coord = self
            .cache
            .quantize(lat, lon)
            .ok_or(NodeCacheError::CoordinateOutOfRange { id, lat, lon })?;
        match self.cache.set(id, lat, lon) {
            // The table holds every node, so a full dense cache only costs
            // speed.
            Ok(()) | Err(NodeCacheError::DenseCapacity { .. }) => {}
            Err(err) => return Err(err.into()),
        }
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, lat, lon) VALUES (?1, ?2, ?3)",
            self.tables.nodes
        );
        Self::exec(&conn, &sql, "node insert", id, params![id, coord.y, coord.x])?;
        Ok(())
    }

    fn nodes_delete(&mut self, id: OsmId) -> Result<(), MiddleError> {
        self.cache.delete(id);
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.tables.nodes);
        Self::exec(&conn, &sql, "node delete", id, params![id])?;
        Ok(())
    }

    fn node_changed(&mut self, id: OsmId) -> Result<(), MiddleError> {
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let sql = format!(
            "SELECT DISTINCT way_id FROM {} WHERE node_id = ?1",
            self.tables.way_nodes
        );
        let ways = self.ids(&conn, &sql, "node dependants", id, params![id])?;
        let mark = format!("UPDATE {} SET pending = 1 WHERE id = ?1", self.tables.ways);
        for way_id in &ways {
            Self::exec(&conn, &mark, "way pending mark", *way_id, params![way_id])?;
            let parents = self.relations_using(&conn, OsmType::Way, *way_id)?;
            self.mark_relations_pending(&conn, &parents)?;
        }
        let parents = self.relations_using(&conn, OsmType::Node, id)?;
        self.mark_relations_pending(&conn, &parents)?;
        debug!("node {id} changed: {} ways pending", ways.len());
        Ok(())
    }

    fn ways_set(&mut self, way: &Way, pending: bool) -> Result<(), MiddleError> {
        let nodes = serde_json::to_string(&way.nodes).map_err(|source| {
            SqliteMiddleError::Encode {
                id: way.id,
                source,
            }
        })?;
        let tags = encode_tags(way.id, &way.tags)?;
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let upsert = format!(
            "INSERT OR REPLACE INTO {} (id, nodes, tags, pending) VALUES (?1, ?2, ?3, ?4)",
            self.tables.ways
        );
        Self::exec(&conn, &upsert, "way insert", way.id, params![way.id, nodes, tags, pending])?;

        let clear = format!("DELETE FROM {} WHERE way_id = ?1", self.tables.way_nodes);
        Self::exec(&conn, &clear, "way node index", way.id, params![way.id])?;
        let link = format!(
            "INSERT INTO {} (node_id, way_id) VALUES (?1, ?2)",
            self.tables.way_nodes
        );
        let mut seen = std::collections::HashSet::new();
        for node_id in way.nodes.iter().filter(|id| seen.insert(**id)) {
            Self::exec(&conn, &link, "way node index", way.id, params![node_id, way.id])?;
        }
        Ok(())
    }

    fn ways_done(&mut self, id: OsmId) -> Result<(), MiddleError> {
        self.set_pending(&self.tables.ways, id, false, "way done")
    }

    fn ways_delete(&mut self, id: OsmId) -> Result<(), MiddleError> {
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let way = format!("DELETE FROM {} WHERE id = ?1", self.tables.ways);
        Self::exec(&conn, &way, "way delete", id, params![id])?;
        let links = format!("DELETE FROM {} WHERE way_id = ?1", self.tables.way_nodes);
        Self::exec(&conn, &links, "way delete", id, params![id])?;
        Ok(())
    }

    fn way_changed(&mut self, id: OsmId) -> Result<(), MiddleError> {
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let parents = self.relations_using(&conn, OsmType::Way, id)?;
        self.mark_relations_pending(&conn, &parents)?;
        Ok(())
    }

    fn relations_set(&mut self, relation: &Relation) -> Result<(), MiddleError> {
        let members = encode_members(relation)?;
        let tags = encode_tags(relation.id, &relation.tags)?;
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let upsert = format!(
            "INSERT INTO {} (id, members, tags) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET members = excluded.members, tags = excluded.tags",
            self.tables.rels
        );
        Self::exec(
            &conn,
            &upsert,
            "relation insert",
            relation.id,
            params![relation.id, members, tags],
        )?;

        let clear = format!("DELETE FROM {} WHERE rel_id = ?1", self.tables.rel_members);
        Self::exec(&conn, &clear, "relation member index", relation.id, params![relation.id])?;
        let link = format!(
            "INSERT INTO {} (member_type, member_id, rel_id) VALUES (?1, ?2, ?3)",
            self.tables.rel_members
        );
        let mut seen = std::collections::HashSet::new();
        for member in relation
            .members
            .iter()
            .filter(|member| seen.insert((member.kind, member.id)))
        {
            Self::exec(
                &conn,
                &link,
                "relation member index",
                relation.id,
                params![member.kind.code().to_string(), member.id, relation.id],
            )?;
        }
        Ok(())
    }

    fn relations_done(&mut self, id: OsmId) -> Result<(), MiddleError> {
        self.set_pending(&self.tables.rels, id, false, "relation done")
    }

    fn relations_delete(&mut self, id: OsmId) -> Result<(), MiddleError> {
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let members = format!(
            "SELECT member_id FROM {} WHERE rel_id = ?1 AND member_type = 'w'",
            self.tables.rel_members
        );
        let way_ids = self.ids(&conn, &members, "relation delete", id, params![id])?;
        let mark = format!("UPDATE {} SET pending = 1 WHERE id = ?1", self.tables.ways);
        for way_id in &way_ids {
            Self::exec(&conn, &mark, "way pending mark", *way_id, params![way_id])?;
        }
        let rel = format!("DELETE FROM {} WHERE id = ?1", self.tables.rels);
        Self::exec(&conn, &rel, "relation delete", id, params![id])?;
        let links = format!("DELETE FROM {} WHERE rel_id = ?1", self.tables.rel_members);
        Self::exec(&conn, &links, "relation delete", id, params![id])?;
        Ok(())
    }

    fn relation_changed(&mut self, id: OsmId) -> Result<(), MiddleError> {
        let conn = self.db.writer().map_err(SqliteMiddleError::from)?;
        let mut ids = vec![id];
        ids.extend(self.relations_using(&conn, OsmType::Relation, id)?);
        self.mark_relations_pending(&conn, &ids)?;
        Ok(())
    }

    fn pending_ways(&self) -> Result<Vec<OsmId>, MiddleError> {
        self.pending(&self.tables.ways, "pending ways")
    }

    fn pending_relations(&self) -> Result<Vec<OsmId>, MiddleError> {
        self.pending(&self.tables.rels, "pending relations")
    }

    fn commit(&mut self) -> Result<(), MiddleError> {
        self.db.commit().map_err(SqliteMiddleError::from)?;
        Ok(())
    }

    fn is_slim(&self) -> bool {
        true
    }
}
