//! SQLite-backed `ObservationStore`.
//!
//! Schema mirrors the original `notary_db.py`'s `observations` table, with
//! the uniqueness/index discipline the continuity algorithm needs. Writes
//! for a given service are serialized through a single connection guarded
//! by a `tokio::sync::Mutex`, and each `report_observation` call runs
//! inside one `BEGIN IMMEDIATE` transaction so the continuity algorithm's
//! read-modify-write is atomic.

use crate::error::StoreError;
use crate::model::{Observation, DEFAULT_UPDATE_LIMIT_SECS};
use crate::store::ObservationStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tokio::sync::Mutex;

/// SQLite-backed implementation of [`ObservationStore`].
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    update_limit_secs: i64,
}

impl SqliteStore {
    /// Open (creating if needed) a SQLite database at `path` and ensure the
    /// schema exists.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("failed to open {path}: {e}")))?;
        Self::from_connection(conn)
    }

    /// An in-memory store, primarily for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("failed to open in-memory db: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            update_limit_secs: DEFAULT_UPDATE_LIMIT_SECS,
        })
    }

    /// Override `UPDATE_LIMIT` (default 48h). Exposed for tests exercising
    /// boundary behavior around the gap window.
    pub fn with_update_limit_secs(mut self, secs: i64) -> Self {
        self.update_limit_secs = secs;
        self
    }

    /// Apply the continuity algorithm at an explicit timestamp. Used
    /// directly by tests; the trait method below delegates here with
    /// `now = Utc::now()`.
    pub async fn report_observation_at(
        &self,
        service: &str,
        key: &str,
        now: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        apply_continuity(&conn, service, key, now, self.update_limit_secs)
            .map_err(to_store_error)
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS services (
            id   INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS observations (
            id         INTEGER PRIMARY KEY,
            service_id INTEGER NOT NULL REFERENCES services(id),
            key        TEXT NOT NULL,
            start      INTEGER NOT NULL,
            end        INTEGER NOT NULL,
            UNIQUE(service_id, key, start),
            UNIQUE(service_id, key, end)
        );
        CREATE INDEX IF NOT EXISTS idx_obs_service_key_end ON observations(service_id, key, end);
        CREATE INDEX IF NOT EXISTS idx_obs_end ON observations(end);
        ",
    )
}

fn to_store_error(e: rusqlite::Error) -> StoreError {
    use rusqlite::ffi::ErrorCode;
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Unique
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn get_or_create_service(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO services (name) VALUES (?1)",
        params![name],
    )?;
    conn.query_row(
        "SELECT id FROM services WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
}

/// The continuity algorithm: given the most recent observation for
/// `service` across all keys, decide whether `key`'s sighting at `now`
/// extends an existing span or opens a new one.
fn apply_continuity(
    conn: &Connection,
    service: &str,
    key: &str,
    now: i64,
    update_limit: i64,
) -> rusqlite::Result<()> {
    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| {
        let service_id = get_or_create_service(conn, service)?;

        let most_recent: Option<(i64, String, i64)> = conn
            .query_row(
                "SELECT id, key, end FROM observations
                 WHERE service_id = ?1
                 ORDER BY end DESC, start DESC
                 LIMIT 1",
                params![service_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match most_recent {
            Some((mr_id, mrk, mrt)) if mrk == key => {
                // Case A: same key as the most recent sighting.
                if now - mrt <= update_limit {
                    if now > mrt {
                        conn.execute(
                            "UPDATE observations SET end = ?1 WHERE id = ?2",
                            params![now, mr_id],
                        )?;
                    }
                    // now <= mrt: duplicate/out-of-order call, end unchanged.
                } else {
                    insert_observation(conn, service_id, key, now, now)?;
                }
            }
            Some((_, mrk, mrt)) => {
                // Case B: key changed (or differs from most recent key).
                insert_observation(conn, service_id, key, now, now)?;
                if now - mrt <= update_limit {
                    conn.execute(
                        "UPDATE observations SET end = ?1
                         WHERE service_id = ?2 AND key = ?3 AND end = ?4",
                        params![now - 1, service_id, mrk, mrt],
                    )?;
                }
            }
            None => {
                // No prior observation at all.
                insert_observation(conn, service_id, key, now, now)?;
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            tracing::warn!(service, key, error = %e, "report_observation failed, rolled back");
            Err(e)
        }
    }
}

fn insert_observation(
    conn: &Connection,
    service_id: i64,
    key: &str,
    start: i64,
    end: i64,
) -> rusqlite::Result<()> {
    match conn.execute(
        "INSERT INTO observations (service_id, key, start, end) VALUES (?1, ?2, ?3, ?4)",
        params![service_id, key, start, end],
    ) {
        Ok(_) => Ok(()),
        // A racing duplicate insert is idempotent intent, not an error.
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ffi::ErrorCode::ConstraintViolation =>
        {
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ObservationStore for SqliteStore {
    async fn report_observation(&self, service: &str, key: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::Constraint("key must not be empty".into()));
        }
        let now = chrono::Utc::now().timestamp();
        if now < 0 {
            return Err(StoreError::Constraint("negative timestamp".into()));
        }
        self.report_observation_at(service, key, now).await
    }

    async fn get_observations(&self, service: &str) -> Result<Vec<Observation>, StoreError> {
        let conn = self.conn.lock().await;
        let service_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM services WHERE name = ?1",
                params![service],
                |row| row.get(0),
            )
            .optional()
            .map_err(to_store_error)?;

        let Some(service_id) = service_id else {
            return Ok(Vec::new());
        };

        let mut stmt = conn
            .prepare(
                "SELECT key, start, end FROM observations
                 WHERE service_id = ?1
                 ORDER BY key ASC, start ASC",
            )
            .map_err(to_store_error)?;
        let rows = stmt
            .query_map(params![service_id], |row| {
                Ok(Observation::new(
                    row.get::<_, String>(0)?,
                    row.get(1)?,
                    row.get(2)?,
                ))
            })
            .map_err(to_store_error)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(to_store_error)?);
        }
        Ok(out)
    }

    async fn insert_service(&self, service: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        get_or_create_service(&conn, service)
            .map(|_| ())
            .map_err(to_store_error)
    }

    async fn insert_bulk_services(&self, services: &[String]) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(to_store_error)?;
        for name in services {
            if let Err(e) = get_or_create_service(&conn, name) {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(to_store_error(e));
            }
        }
        conn.execute_batch("COMMIT").map_err(to_store_error)?;
        Ok(())
    }

    async fn count_services(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))
            .map(|n: i64| n as u64)
            .map_err(to_store_error)
    }

    async fn count_observations(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))
            .map(|n: i64| n as u64)
            .map_err(to_store_error)
    }

    async fn get_all_service_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT name FROM services ORDER BY name ASC")
            .map_err(to_store_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(to_store_error)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(to_store_error)?);
        }
        Ok(out)
    }

    async fn get_newest_service_names(&self, end_limit: i64) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT s.name FROM services s
                 JOIN observations o ON o.service_id = s.id
                 WHERE o.end > ?1
                 ORDER BY s.name ASC",
            )
            .map_err(to_store_error)?;
        let rows = stmt
            .query_map(params![end_limit], |row| row.get::<_, String>(0))
            .map_err(to_store_error)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(to_store_error)?);
        }
        Ok(out)
    }

    async fn get_oldest_service_names(&self, end_limit: i64) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT s.name FROM services s
                 WHERE (SELECT MAX(o.end) FROM observations o WHERE o.service_id = s.id) <= ?1",
            )
            .map_err(to_store_error)?;
        let rows = stmt
            .query_map(params![end_limit], |row| row.get::<_, String>(0))
            .map_err(to_store_error)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(to_store_error)?);
        }
        Ok(out)
    }
}
