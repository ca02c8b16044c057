//! SQLite snapshot storage.
//!
//! Persists snapshots keyed by (profile, name) in a single table:
//! - snapshots: profile, name, ordinal, timestamp, payload
//!
//! Pure data layer, no policy. Ordinals are assigned per profile at insert
//! time, ascending from 0. Every mutation runs inside a transaction so a
//! crash mid-put never leaves a half-written payload visible on reopen.

use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};

/// Snapshot metadata as stored in the database. The payload is loaded
/// separately since listings don't need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    pub name: String,
    pub ordinal: u64,
    pub timestamp: i64,
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile TEXT NOT NULL,
            name TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            payload BLOB NOT NULL,
            UNIQUE(profile, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_profile ON snapshots(profile)",
        [],
    )?;

    Ok(())
}

fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Database handle. Open once, reuse across all operations.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        init_schema(&conn)?;
        Ok(Store { conn })
    }

    /// Insert a snapshot and return its ordinal. Fails with `SnapshotExists`
    /// if (profile, name) is already present, unless `overwrite` is set, in
    /// which case the payload and timestamp are replaced and the existing
    /// ordinal is kept.
    pub fn put(
        &mut self,
        profile: &str,
        name: &str,
        payload: &[u8],
        overwrite: bool,
    ) -> Result<u64> {
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT ordinal FROM snapshots WHERE profile = ?1 AND name = ?2",
                params![profile, name],
                |row| row.get(0),
            )
            .optional()?;

        let ordinal = match existing {
            Some(ordinal) if overwrite => {
                tx.execute(
                    "UPDATE snapshots SET payload = ?3, timestamp = ?4
                     WHERE profile = ?1 AND name = ?2",
                    params![profile, name, payload, unix_timestamp()],
                )?;
                ordinal
            }
            Some(_) => {
                return Err(Error::SnapshotExists(name.to_string(), profile.to_string()));
            }
            None => {
                let next: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(ordinal) + 1, 0) FROM snapshots WHERE profile = ?1",
                    params![profile],
                    |row| row.get(0),
                )?;

                tx.execute(
                    "INSERT INTO snapshots (profile, name, ordinal, timestamp, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![profile, name, next, unix_timestamp(), payload],
                )?;
                next
            }
        };

        tx.commit()?;
        debug!("put {profile}/{name} -> ordinal {ordinal} ({} bytes)", payload.len());
        Ok(ordinal as u64)
    }

    /// Load a snapshot's payload. Fails with `NotFound` if absent.
    pub fn get(&self, profile: &str, name: &str) -> Result<Vec<u8>> {
        self.conn
            .query_row(
                "SELECT payload FROM snapshots WHERE profile = ?1 AND name = ?2",
                params![profile, name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("snapshot '{name}' in profile '{profile}'")))
    }

    /// Load one snapshot's metadata without its payload.
    pub fn meta(&self, profile: &str, name: &str) -> Result<SnapshotMeta> {
        self.conn
            .query_row(
                "SELECT name, ordinal, timestamp FROM snapshots
                 WHERE profile = ?1 AND name = ?2",
                params![profile, name],
                |row| {
                    Ok(SnapshotMeta {
                        name: row.get(0)?,
                        ordinal: row.get::<_, i64>(1)?.max(0) as u64,
                        timestamp: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("snapshot '{name}' in profile '{profile}'")))
    }

    /// List snapshot metadata for a profile, ordinal ascending. An unknown
    /// profile yields an empty list, not an error.
    pub fn list(&self, profile: &str) -> Result<Vec<SnapshotMeta>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, ordinal, timestamp FROM snapshots
             WHERE profile = ?1
             ORDER BY ordinal ASC",
        )?;

        let metas = stmt
            .query_map(params![profile], |row| {
                Ok(SnapshotMeta {
                    name: row.get(0)?,
                    ordinal: row.get::<_, i64>(1)?.max(0) as u64,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(metas)
    }

    /// Delete one snapshot. Fails with `NotFound` if absent.
    pub fn delete(&mut self, profile: &str, name: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM snapshots WHERE profile = ?1 AND name = ?2",
            params![profile, name],
        )?;

        if deleted == 0 {
            return Err(Error::NotFound(format!(
                "snapshot '{name}' in profile '{profile}'"
            )));
        }

        debug!("deleted {profile}/{name}");
        Ok(())
    }

    /// Delete every snapshot in a profile. Idempotent, a no-op if the profile
    /// is unknown or already empty.
    pub fn delete_all(&mut self, profile: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM snapshots WHERE profile = ?1",
            params![profile],
        )?;

        debug!("cleared {profile} ({deleted} snapshots)");
        Ok(())
    }

    /// Profiles with at least one stored snapshot.
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT profile FROM snapshots ORDER BY profile ASC")?;

        let profiles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(profiles)
    }
}
