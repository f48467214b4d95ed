//! Export/import of observation tuples to the line-oriented file format
//! used by the original Python implementation's `db2file.py`/`file2db.py`
//! tools: one `service,key,start,end` tuple per line, `#`-prefixed lines
//! ignored.
//!
//! CLI wrappers around these formats are out of scope; only the
//! underlying read/write logic is.

use crate::error::StoreError;
use crate::model::Observation;
use crate::store::ObservationStore;
use std::io::{BufRead, Write};

/// Write every observation of every known service as `service,key,start,end`
/// lines.
pub async fn export_tuples<S, W>(store: &S, mut out: W) -> Result<(), StoreError>
where
    S: ObservationStore,
    W: Write,
{
    for service in store.get_all_service_names().await? {
        for obs in store.get_observations(&service).await? {
            writeln!(out, "{},{},{},{}", service, obs.key, obs.start, obs.end)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
    }
    Ok(())
}

/// Read `service,key,start,end` tuples (skipping blank and `#`-comment
/// lines) and feed each through [`ObservationStore::report_observation`]-
/// equivalent raw insertion, preserving the original start/end rather than
/// re-deriving them from "now".
///
/// Re-importing is idempotent: a tuple whose `(service, key, start)` or
/// `(service, key, end)` already exists is silently skipped, matching the
/// store's normal race-absorption behavior.
pub async fn import_tuples<R>(conn: &rusqlite::Connection, input: R) -> Result<u64, StoreError>
where
    R: BufRead,
{
    let mut imported = 0u64;
    for line in input.lines() {
        let line = line.map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Split from the right: `service` itself contains a comma
        // (`host:port,type`), so only the trailing `key,start,end` fields
        // can be peeled off unambiguously.
        let rparts: Vec<&str> = line.rsplitn(4, ',').collect();
        let [end, start, key, service]: [&str; 4] = match rparts.try_into() {
            Ok(quad) => quad,
            Err(_) => continue,
        };

        let start: i64 = match start.parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let end: i64 = match end.parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if start < 0 || end < start {
            continue;
        }

        conn.execute(
            "INSERT OR IGNORE INTO services (name) VALUES (?1)",
            rusqlite::params![service],
        )
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let service_id: i64 = conn
            .query_row(
                "SELECT id FROM services WHERE name = ?1",
                rusqlite::params![service],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO observations (service_id, key, start, end) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![service_id, key, start, end],
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        imported += changed as u64;
    }
    Ok(imported)
}

/// Render observations as tuples in memory, primarily for tests that don't
/// want to stand up a writer.
pub fn observations_to_tuples(service: &str, obs: &[Observation]) -> Vec<String> {
    obs.iter()
        .map(|o| format!("{},{},{},{}", service, o.key, o.start, o.end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_store::SqliteStore;

    #[tokio::test]
    async fn export_then_import_round_trips_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .report_observation_at("foo:443,2", "aa", 100)
            .await
            .unwrap();
        store
            .report_observation_at("bar:22,1", "bb", 200)
            .await
            .unwrap();

        let mut buf = Vec::new();
        export_tuples(&store, &mut buf).await.unwrap();

        let fresh_conn = rusqlite::Connection::open_in_memory().unwrap();
        fresh_conn
            .execute_batch(
                "CREATE TABLE services (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
                 CREATE TABLE observations (
                    id INTEGER PRIMARY KEY,
                    service_id INTEGER NOT NULL,
                    key TEXT NOT NULL,
                    start INTEGER NOT NULL,
                    end INTEGER NOT NULL,
                    UNIQUE(service_id, key, start),
                    UNIQUE(service_id, key, end)
                 );",
            )
            .unwrap();

        let imported = import_tuples(&fresh_conn, buf.as_slice()).await.unwrap();
        assert_eq!(imported, 2);

        let count: i64 = fresh_conn
            .query_row("SELECT COUNT(*) FROM observations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn import_skips_comments_and_malformed_lines() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE services (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
             CREATE TABLE observations (
                id INTEGER PRIMARY KEY, service_id INTEGER NOT NULL, key TEXT NOT NULL,
                start INTEGER NOT NULL, end INTEGER NOT NULL,
                UNIQUE(service_id, key, start), UNIQUE(service_id, key, end)
             );",
        )
        .unwrap();

        let input = "# a comment\n\nfoo:443,2,aa,100,100\nnotatuple\n";
        let imported = import_tuples(&conn, input.as_bytes()).await.unwrap();
        assert_eq!(imported, 1);
    }
}
