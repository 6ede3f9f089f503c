//! Append-only snapshot history on SQLite.
//!
//! Two tables, one row per observation, no updates and no deletes.
//! The schema is kept exactly as existing history databases have it, so
//! a database written by an older deployment keeps working:
//!
//! - `health_snapshots`: one row per node observation
//! - `sentinel_snapshots`: one row per Sentinel observation
//!
//! `total_clusters_monitored` on the sentinel table duplicates the
//! row's own `masters_monitored` and stays only for schema
//! compatibility.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::snapshot::{HealthStatus, NodeRole, NodeSnapshot, SentinelSnapshot};

pub const DEFAULT_PAGE_SIZE: u32 = 5000;

/// One page of a history query. Index 0 is the newest page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub size: u32,
    pub index: u32,
}

impl Page {
    pub fn new(size: u32, index: u32) -> Self {
        Self { size, index }
    }

    fn offset(&self) -> u64 {
        self.size as u64 * self.index as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            size: DEFAULT_PAGE_SIZE,
            index: 0,
        }
    }
}

/// A sentinel observation read back from history.
///
/// The persisted sentinel row never carried a status column, so reads
/// return this projection instead of a full `SentinelSnapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelHistoryRow {
    pub id: i64,
    pub timestamp: String,
    pub endpoint: Endpoint,
    pub masters_monitored: u32,
    pub is_tilt: bool,
    pub running_scripts: u32,
}

/// Append-only history store. Writes are serialized through one
/// connection; a cycle's batch commits before the next batch starts.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;

            CREATE TABLE IF NOT EXISTS health_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT,
                cluster_name TEXT,
                role TEXT,
                host TEXT,
                port INTEGER,
                health TEXT,
                keys INTEGER,
                clients INTEGER,
                memory TEXT,
                master_host TEXT,
                master_port INTEGER
            );

            CREATE TABLE IF NOT EXISTS sentinel_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT,
                host TEXT,
                port INTEGER,
                masters_monitored INTEGER,
                is_tilt INTEGER,
                running_scripts INTEGER,
                total_clusters_monitored INTEGER
            );
            ",
        )
    }

    /// Append one cycle's node observations in a single transaction.
    ///
    /// A row that fails to bind is skipped with a warning; the rest of
    /// the batch still commits. Returns the number of rows written.
    pub fn save_node_snapshots(&self, rows: &[NodeSnapshot]) -> Result<usize> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO health_snapshots
                 (timestamp, cluster_name, role, host, port, health,
                  keys, clients, memory, master_host, master_port)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for snap in rows {
                let result = stmt.execute(params![
                    snap.timestamp,
                    snap.cluster,
                    snap.role.as_str(),
                    snap.endpoint.host,
                    snap.endpoint.port,
                    snap.health.as_str(),
                    snap.keys.map(|k| k as i64),
                    snap.clients,
                    snap.memory,
                    snap.master.host,
                    snap.master.port,
                ]);
                match result {
                    Ok(_) => written += 1,
                    Err(e) => log::warn!("skipping history row for {}: {}", snap.endpoint, e),
                }
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Append one cycle's Sentinel observations.
    ///
    /// `total_clusters_monitored` is written equal to the row's own
    /// `masters_monitored`, which is what existing databases hold.
    pub fn save_sentinel_snapshots(&self, rows: &[SentinelSnapshot]) -> Result<usize> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sentinel_snapshots
                 (timestamp, host, port, masters_monitored, is_tilt,
                  running_scripts, total_clusters_monitored)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for snap in rows {
                let result = stmt.execute(params![
                    snap.timestamp,
                    snap.endpoint.host,
                    snap.endpoint.port,
                    snap.masters_monitored,
                    snap.is_tilt,
                    snap.running_scripts,
                    snap.masters_monitored,
                ]);
                match result {
                    Ok(_) => written += 1,
                    Err(e) => log::warn!("skipping sentinel row for {}: {}", snap.endpoint, e),
                }
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Node history, newest first. `cluster` filters to one cluster;
    /// `page` of `None` returns the whole (filtered) history.
    ///
    /// Ordering is `timestamp DESC, id DESC`: timestamps are
    /// second-granular and whole batches share one, so the id tiebreak
    /// is what keeps pages disjoint.
    pub fn query_node_history(
        &self,
        cluster: Option<&str>,
        page: Option<Page>,
    ) -> Result<Vec<NodeSnapshot>> {
        let conn = self.conn.lock();
        // SQLite treats a negative LIMIT as unlimited
        let (limit, offset) = match page {
            Some(p) => (p.size as i64, p.offset() as i64),
            None => (-1i64, 0i64),
        };

        let mut out = Vec::new();
        match cluster {
            Some(name) => {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, cluster_name, role, host, port, health,
                            keys, clients, memory, master_host, master_port
                     FROM health_snapshots
                     WHERE cluster_name = ?1
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt.query_map(params![name, limit, offset], node_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, cluster_name, role, host, port, health,
                            keys, clients, memory, master_host, master_port
                     FROM health_snapshots
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt.query_map(params![limit, offset], node_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    pub fn count_node_history(&self, cluster: Option<&str>) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = match cluster {
            Some(name) => conn.query_row(
                "SELECT COUNT(*) FROM health_snapshots WHERE cluster_name = ?1",
                params![name],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM health_snapshots", [], |row| {
                row.get(0)
            })?,
        };
        Ok(count as u64)
    }

    /// Sentinel history, newest first.
    pub fn query_sentinel_history(&self, page: Option<Page>) -> Result<Vec<SentinelHistoryRow>> {
        let conn = self.conn.lock();
        let (limit, offset) = match page {
            Some(p) => (p.size as i64, p.offset() as i64),
            None => (-1i64, 0i64),
        };

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, host, port, masters_monitored, is_tilt, running_scripts
             FROM sentinel_snapshots
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit, offset], |row| {
            Ok(SentinelHistoryRow {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                endpoint: Endpoint::new(row.get::<_, String>(2)?, row.get::<_, u16>(3)?),
                masters_monitored: row.get::<_, i64>(4)? as u32,
                is_tilt: row.get(5)?,
                running_scripts: row.get::<_, i64>(6)? as u32,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_sentinel_history(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sentinel_snapshots", [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    /// Distinct cluster names that ever appeared in history, sorted.
    pub fn cluster_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT cluster_name FROM health_snapshots ORDER BY cluster_name",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn node_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeSnapshot> {
    Ok(NodeSnapshot {
        timestamp: row.get(0)?,
        cluster: row.get(1)?,
        role: NodeRole::from_db(&row.get::<_, String>(2)?),
        endpoint: Endpoint::new(row.get::<_, String>(3)?, row.get::<_, u16>(4)?),
        health: HealthStatus::from_db(&row.get::<_, String>(5)?),
        keys: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        clients: row.get::<_, Option<i64>>(7)?.map(|v| v as u32),
        memory: row.get(8)?,
        master: Endpoint::new(row.get::<_, String>(9)?, row.get::<_, u16>(10)?),
    })
}
