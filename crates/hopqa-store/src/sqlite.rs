//! SQLite-backed entity/relationship graph store.
//!
//! One connection behind a mutex; the lock is held per statement, so
//! concurrent traversals interleave at neighbor-fetch granularity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hopqa_core::{Error, Result, TraversalDirection};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info, warn};

use crate::backend::GraphStore;
use crate::schema::SCHEMA_SQL;
use crate::types::*;

const ENTITY_COLUMNS: &str = "id, canonical_name, entity_type, confidence, centrality_score";

/// SQLite parameter limit headroom for `IN (...)` lists.
const MAX_IN_PARAMS: usize = 500;

const NEIGHBORS_BOTH_SQL: &str = "
    SELECT r.rel_type, r.weight, r.source_id = ?1 AS forward,
           CASE WHEN r.source_id = ?1 THEN r.target_id ELSE r.source_id END AS other_id,
           e.id, e.canonical_name, e.entity_type, e.centrality_score
    FROM relationships r
    LEFT JOIN entities e
      ON e.id = CASE WHEN r.source_id = ?1 THEN r.target_id ELSE r.source_id END
    WHERE r.source_id = ?1 OR r.target_id = ?1
    ORDER BY r.id";

const NEIGHBORS_OUT_SQL: &str = "
    SELECT r.rel_type, r.weight, 1 AS forward, r.target_id AS other_id,
           e.id, e.canonical_name, e.entity_type, e.centrality_score
    FROM relationships r
    LEFT JOIN entities e ON e.id = r.target_id
    WHERE r.source_id = ?1
    ORDER BY r.id";

/// Map a rusqlite error, separating lock contention from hard failures.
fn db_err(e: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) {
            return Error::Busy(e.to_string());
        }
    }
    Error::Database(e.to_string())
}

/// SQLite graph store.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    min_weight: f64,
    max_weight: f64,
}

#[derive(Debug, Clone)]
struct Neighbor {
    node: PathNode,
    hop: PathHop,
}

impl SqliteGraphStore {
    /// Open or create the store at `db_dir/hopqa.db`.
    ///
    /// `weight_bounds` is the `(min, max)` range relationship weights are clamped into.
    pub fn open(db_dir: impl AsRef<Path>, weight_bounds: (f64, f64)) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("hopqa.db");

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            min_weight: weight_bounds.0,
            max_weight: weight_bounds.1,
        };

        let stats = store.stats()?;
        info!(
            "SqliteGraphStore initialized: {} entities, {} relationships, path={}",
            stats.total_entities,
            stats.total_relationships,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| {
            Error::Config(format!("cannot open graph database {}: {}", db_path.display(), e))
        })?;
        conn.busy_timeout(Duration::from_millis(2000)).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA cache_size = -32768;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn clamp_weight(&self, weight: Option<f64>) -> Option<f64> {
        weight.map(|w| {
            let clamped = w.clamp(self.min_weight, self.max_weight);
            if clamped != w {
                debug!("Clamped relationship weight {} to {}", w, clamped);
            }
            clamped
        })
    }

    // ---------------------------------------------------------------
    // Writes (upstream loaders, tests)
    // ---------------------------------------------------------------

    /// Insert or update an entity. An incoming `None` score keeps the stored one.
    pub fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        let conn = self.conn.lock();
        Self::upsert_entity_on(&conn, entity)
    }

    fn upsert_entity_on(conn: &Connection, entity: &Entity) -> Result<()> {
        conn.prepare_cached(
            "INSERT INTO entities (id, canonical_name, entity_type, confidence, centrality_score)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                canonical_name = excluded.canonical_name,
                entity_type = excluded.entity_type,
                confidence = excluded.confidence,
                centrality_score = COALESCE(excluded.centrality_score, entities.centrality_score)",
        )
        .map_err(db_err)?
        .execute(params![
            entity.id,
            entity.canonical_name,
            entity.entity_type.to_uppercase(),
            entity.confidence.clamp(0.0, 1.0),
            entity.centrality_score,
        ])
        .map_err(db_err)?;
        Ok(())
    }

    /// Insert a relationship, clamping its weight into the configured bounds.
    pub fn add_relationship(&self, rel: &Relationship) -> Result<i64> {
        let conn = self.conn.lock();
        self.add_relationship_on(&conn, rel)
    }

    fn add_relationship_on(&self, conn: &Connection, rel: &Relationship) -> Result<i64> {
        conn.prepare_cached(
            "INSERT INTO relationships (source_id, target_id, rel_type, weight, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(db_err)?
        .insert(params![
            rel.source_id,
            rel.target_id,
            rel.rel_type,
            self.clamp_weight(rel.weight),
            rel.confidence.clamp(0.0, 1.0),
        ])
        .map_err(db_err)
    }

    /// Load a whole graph in one transaction. Returns (entities, relationships) written.
    pub fn import_graph(&self, graph: &GraphSnapshot) -> Result<(usize, usize)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let mut entities = 0;
        for entity in &graph.nodes {
            if entity.id.trim().is_empty() || entity.canonical_name.trim().is_empty() {
                warn!("Skipping entity with empty id or name: {:?}", entity);
                continue;
            }
            Self::upsert_entity_on(&tx, entity)?;
            entities += 1;
        }
        for rel in &graph.edges {
            self.add_relationship_on(&tx, rel)?;
        }
        tx.commit().map_err(db_err)?;
        info!("Imported {} entities, {} relationships", entities, graph.edges.len());
        Ok((entities, graph.edges.len()))
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    pub fn count_entities(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))
            .map_err(db_err)
    }

    pub fn count_relationships(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))
            .map_err(db_err)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let total_entities = self.count_entities()?;
        let total_relationships = self.count_relationships()?;
        let scored_entities: i64 = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT COUNT(*) FROM entities WHERE centrality_score IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .map_err(db_err)?
        };
        let db_size_mb = std::fs::metadata(&self.db_path)
            .map(|m| m.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);

        Ok(StoreStats {
            total_entities,
            total_relationships,
            scored_entities,
            db_path: self.db_path.display().to_string(),
            db_size_mb: (db_size_mb * 100.0).round() / 100.0,
        })
    }

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    fn row_to_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entity> {
        Ok(Entity {
            id: row.get(0)?,
            canonical_name: row.get(1)?,
            entity_type: row.get(2)?,
            confidence: row.get(3)?,
            centrality_score: row.get(4)?,
        })
    }

    /// Append ` AND upper(column) IN (?, ...)` for a tag filter. `column` is
    /// always a literal from this module; tags travel as bound values.
    fn push_type_clause(sql: &mut String, values: &mut Vec<Value>, filter: &TypeFilter, column: &str) {
        if let TypeFilter::Tags(tags) = filter {
            let placeholders = vec!["?"; tags.len()].join(", ");
            sql.push_str(&format!(" AND upper({}) IN ({})", column, placeholders));
            values.extend(tags.iter().map(|t| Value::Text(t.to_uppercase())));
        }
    }

    fn query_entities(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Entity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(values), Self::row_to_entity)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn neighbors(&self, node_id: &str, direction: TraversalDirection) -> Result<Vec<Neighbor>> {
        let sql = match direction {
            TraversalDirection::Both => NEIGHBORS_BOTH_SQL,
            TraversalDirection::Outgoing => NEIGHBORS_OUT_SQL,
        };
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql).map_err(db_err)?;
        let mut rows = stmt.query(params![node_id]).map_err(db_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            let rel_type: String = row.get(0).map_err(db_err)?;
            let weight: Option<f64> = row.get(1).map_err(db_err)?;
            let forward: bool = row.get(2).map_err(db_err)?;
            let other_id: String = row.get(3).map_err(db_err)?;
            let id: Option<String> = row.get(4).map_err(db_err)?;
            let name: Option<String> = row.get(5).map_err(db_err)?;

            let (Some(id), Some(name)) = (id, name) else {
                warn!(
                    "Skipping malformed path record: {} -[{}]- {} has no entity row",
                    node_id, rel_type, other_id
                );
                continue;
            };
            out.push(Neighbor {
                node: PathNode {
                    id,
                    name,
                    entity_type: row.get(6).map_err(db_err)?,
                    centrality_score: row.get(7).map_err(db_err)?,
                },
                hop: PathHop {
                    rel_type,
                    direction: if forward {
                        HopDirection::Forward
                    } else {
                        HopDirection::Backward
                    },
                    weight,
                },
            });
        }
        Ok(out)
    }
}

/// Depth-first walk collecting fixed-length simple paths.
struct Walk<'a> {
    store: &'a SqliteGraphStore,
    direction: TraversalDirection,
    control: &'a TraversalControl,
    depth: usize,
    limit: usize,
    cache: HashMap<String, Vec<Neighbor>>,
    nodes: Vec<PathNode>,
    hops: Vec<PathHop>,
    results: Vec<TraversalPath>,
    out_of_budget: bool,
}

impl Walk<'_> {
    fn done(&self) -> bool {
        self.out_of_budget || self.results.len() >= self.limit
    }

    fn extend(&mut self) -> Result<()> {
        if self.done() {
            return Ok(());
        }
        if self.hops.len() == self.depth {
            self.results.push(TraversalPath {
                nodes: self.nodes.clone(),
                hops: self.hops.clone(),
            });
            return Ok(());
        }

        self.control.checkpoint()?;
        if !self.control.try_visit() {
            self.out_of_budget = true;
            return Ok(());
        }

        let current = match self.nodes.last() {
            Some(n) => n.id.clone(),
            None => return Ok(()),
        };
        let neighbors = match self.cache.get(&current) {
            Some(n) => n.clone(),
            None => {
                let fetched = self.store.neighbors(&current, self.direction)?;
                self.cache.insert(current, fetched.clone());
                fetched
            }
        };

        for neighbor in neighbors {
            if self.nodes.iter().any(|n| n.id == neighbor.node.id) {
                continue;
            }
            self.nodes.push(neighbor.node);
            self.hops.push(neighbor.hop);
            let step = self.extend();
            self.nodes.pop();
            self.hops.pop();
            step?;
            if self.done() {
                break;
            }
        }
        Ok(())
    }
}

impl GraphStore for SqliteGraphStore {
    fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let conn = self.conn.lock();
        let entity = conn
            .prepare_cached(&format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLUMNS))
            .map_err(db_err)?
            .query_row(params![id], Self::row_to_entity)
            .optional()
            .map_err(db_err);
        entity
    }

    fn get_by_exact_name(&self, name: &str, filter: &TypeFilter) -> Result<Vec<Entity>> {
        let mut sql = format!(
            "SELECT {} FROM entities WHERE canonical_name = ? COLLATE NOCASE",
            ENTITY_COLUMNS
        );
        let mut values = vec![Value::Text(name.trim().to_string())];
        Self::push_type_clause(&mut sql, &mut values, filter, "entity_type");
        sql.push_str(" ORDER BY id");
        self.query_entities(&sql, values)
    }

    fn get_by_substring(
        &self,
        fragment: &str,
        filter: &TypeFilter,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let fragment = fragment.trim();
        if fragment.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let max_len = (fragment.chars().count() * 2) as i64;
        let mut sql = format!(
            "SELECT {} FROM entities WHERE instr(lower(canonical_name), lower(?)) > 0
             AND length(canonical_name) <= ?",
            ENTITY_COLUMNS
        );
        let mut values = vec![Value::Text(fragment.to_string()), Value::Integer(max_len)];
        Self::push_type_clause(&mut sql, &mut values, filter, "entity_type");
        sql.push_str(" ORDER BY length(canonical_name), id LIMIT ?");
        values.push(Value::Integer(limit as i64));
        self.query_entities(&sql, values)
    }

    fn scan_entities(&self, limit: usize) -> Result<Vec<Entity>> {
        let sql = format!(
            "SELECT {} FROM entities ORDER BY COALESCE(centrality_score, 0) DESC, id LIMIT ?",
            ENTITY_COLUMNS
        );
        self.query_entities(&sql, vec![Value::Integer(limit as i64)])
    }

    fn bulk_get_by_name(&self, names: &[String]) -> Result<Vec<Entity>> {
        let mut out = Vec::new();
        for chunk in names.chunks(MAX_IN_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM entities WHERE canonical_name IN ({}) ORDER BY id",
                ENTITY_COLUMNS, placeholders
            );
            let values = chunk.iter().map(|n| Value::Text(n.clone())).collect();
            out.extend(self.query_entities(&sql, values)?);
        }
        Ok(out)
    }

    fn traverse(
        &self,
        start_id: &str,
        hop_depth: usize,
        limit: usize,
        direction: TraversalDirection,
        control: &TraversalControl,
    ) -> Result<Vec<TraversalPath>> {
        if hop_depth == 0 || limit == 0 {
            return Ok(Vec::new());
        }
        control.checkpoint()?;
        let start = self
            .get_entity(start_id)?
            .ok_or_else(|| Error::NotFound(format!("entity {}", start_id)))?;

        let mut walk = Walk {
            store: self,
            direction,
            control,
            depth: hop_depth,
            limit,
            cache: HashMap::new(),
            nodes: vec![PathNode::from(&start)],
            hops: Vec::new(),
            results: Vec::new(),
            out_of_budget: false,
        };
        walk.extend()?;

        if walk.out_of_budget {
            debug!(
                "Traversal from {} at depth {} stopped: visit budget exhausted",
                start_id, hop_depth
            );
        }
        Ok(walk.results)
    }

    fn snapshot(&self, filter: &TypeFilter) -> Result<GraphSnapshot> {
        let mut node_sql = format!("SELECT {} FROM entities WHERE 1 = 1", ENTITY_COLUMNS);
        let mut node_values = Vec::new();
        Self::push_type_clause(&mut node_sql, &mut node_values, filter, "entity_type");
        node_sql.push_str(" ORDER BY id");
        let nodes = self.query_entities(&node_sql, node_values)?;

        let mut edge_sql = String::from(
            "SELECT r.source_id, r.target_id, r.rel_type, r.weight, r.confidence
             FROM relationships r
             JOIN entities s ON s.id = r.source_id
             JOIN entities t ON t.id = r.target_id
             WHERE 1 = 1",
        );
        let mut edge_values = Vec::new();
        Self::push_type_clause(&mut edge_sql, &mut edge_values, filter, "s.entity_type");
        Self::push_type_clause(&mut edge_sql, &mut edge_values, filter, "t.entity_type");
        edge_sql.push_str(" ORDER BY r.id");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&edge_sql).map_err(db_err)?;
        let edges = stmt
            .query_map(params_from_iter(edge_values), |row| {
                Ok(Relationship {
                    source_id: row.get(0)?,
                    target_id: row.get(1)?,
                    rel_type: row.get(2)?,
                    weight: row.get(3)?,
                    confidence: row.get(4)?,
                })
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;

        Ok(GraphSnapshot { nodes, edges })
    }

    fn write_score(&self, entity_id: &str, score: f64) -> Result<()> {
        let conn = self.conn.lock();
        let count = conn
            .prepare_cached("UPDATE entities SET centrality_score = ?1 WHERE id = ?2")
            .map_err(db_err)?
            .execute(params![score, entity_id])
            .map_err(db_err)?;
        if count == 0 {
            return Err(Error::NotFound(format!("entity {}", entity_id)));
        }
        Ok(())
    }

    fn clear_scores(&self, filter: &TypeFilter) -> Result<usize> {
        let mut sql = String::from("UPDATE entities SET centrality_score = NULL WHERE 1 = 1");
        let mut values = Vec::new();
        Self::push_type_clause(&mut sql, &mut values, filter, "entity_type");
        let conn = self.conn.lock();
        conn.execute(&sql, params_from_iter(values)).map_err(db_err)
    }

    fn replace_scores(&self, filter: &TypeFilter, scores: &[(String, f64)]) -> Result<usize> {
        let mut clear_sql = String::from("UPDATE entities SET centrality_score = NULL WHERE 1 = 1");
        let mut values = Vec::new();
        Self::push_type_clause(&mut clear_sql, &mut values, filter, "entity_type");

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let cleared = tx
            .execute(&clear_sql, params_from_iter(values))
            .map_err(db_err)?;
        let mut written = 0;
        {
            let mut stmt = tx
                .prepare_cached("UPDATE entities SET centrality_score = ?1 WHERE id = ?2")
                .map_err(db_err)?;
            for (id, score) in scores {
                written += stmt.execute(params![score, id]).map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        debug!("Replaced scores: cleared={}, written={}", cleared, written);
        Ok(written)
    }
}
