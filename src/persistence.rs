//! # Location Store
//!
//! SQLite storage for inferred home and work records, keyed by user.
//!
//! Saving a user's locations is idempotent: the home row is replaced, never
//! duplicated, and the user's work rows are replaced as a set in the same
//! transaction. A per-user `locations_loaded` flag records that inference
//! has run for the user.

use chrono::{DateTime, FixedOffset};
use log::debug;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{ClusterId, LocationRole, Result, SignificantLocation};

/// SQLite-backed store of significant locations.
pub struct LocationStore {
    db: Connection,
}

impl LocationStore {
    /// Open (or create) a store at `db_path`.
    pub fn open(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        Ok(Self { db })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                locations_loaded INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER DEFAULT (strftime('%s', 'now'))
            );

            -- At most one home per user
            CREATE TABLE IF NOT EXISTS home (
                user_id TEXT PRIMARY KEY,
                cluster_id INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                timestamp TEXT NOT NULL,
                address TEXT,
                FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS work (
                user_id TEXT NOT NULL,
                cluster_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                timestamp TEXT NOT NULL,
                address TEXT,
                has_multiple_workplaces INTEGER NOT NULL,
                PRIMARY KEY (user_id, cluster_id),
                FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE
            );
            "#,
        )?;
        Ok(())
    }

    /// Replace the stored locations of `user`.
    pub fn save(&mut self, user: &str, locations: &[SignificantLocation]) -> Result<()> {
        let tx = self.db.transaction()?;

        tx.execute(
            "INSERT INTO users (user_id, locations_loaded) VALUES (?1, 1)
             ON CONFLICT(user_id) DO UPDATE SET
                locations_loaded = 1,
                updated_at = strftime('%s', 'now')",
            params![user],
        )?;

        tx.execute("DELETE FROM home WHERE user_id = ?1", params![user])?;
        tx.execute("DELETE FROM work WHERE user_id = ?1", params![user])?;

        let mut position = 0i64;
        for location in locations {
            match location.role {
                LocationRole::Home => {
                    tx.execute(
                        "INSERT OR REPLACE INTO home
                            (user_id, cluster_id, latitude, longitude, timestamp, address)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            user,
                            location.cluster_id,
                            location.latitude,
                            location.longitude,
                            location.timestamp,
                            location.address,
                        ],
                    )?;
                }
                LocationRole::Work => {
                    tx.execute(
                        "INSERT OR REPLACE INTO work
                            (user_id, cluster_id, position, latitude, longitude, timestamp,
                             address, has_multiple_workplaces)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            user,
                            location.cluster_id,
                            position,
                            location.latitude,
                            location.longitude,
                            location.timestamp,
                            location.address,
                            location.has_multiple_workplaces,
                        ],
                    )?;
                    position += 1;
                }
            }
        }

        tx.commit()?;
        debug!(
            "[LocationStore] Saved {} locations for {}",
            locations.len(),
            user
        );
        Ok(())
    }

    /// The user's home, if stored.
    pub fn home(&self, user: &str) -> Result<Option<SignificantLocation>> {
        let home = self
            .db
            .query_row(
                "SELECT cluster_id, latitude, longitude, timestamp, address
                 FROM home WHERE user_id = ?1",
                params![user],
                |row| location_from_row(row, LocationRole::Home, false),
            )
            .optional()?;
        Ok(home)
    }

    /// The user's work locations in inference order.
    pub fn work(&self, user: &str) -> Result<Vec<SignificantLocation>> {
        let mut stmt = self.db.prepare(
            "SELECT cluster_id, latitude, longitude, timestamp, address, has_multiple_workplaces
             FROM work WHERE user_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![user], |row| {
            let multiple: bool = row.get(5)?;
            location_from_row(row, LocationRole::Work, multiple)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Whether locations have been saved for the user.
    pub fn is_loaded(&self, user: &str) -> Result<bool> {
        let loaded: Option<bool> = self
            .db
            .query_row(
                "SELECT locations_loaded FROM users WHERE user_id = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()?;
        Ok(loaded.unwrap_or(false))
    }

    /// All users with stored locations, sorted.
    pub fn users(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .db
            .prepare("SELECT user_id FROM users ORDER BY user_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Remove a user and all their locations.
    pub fn remove_user(&mut self, user: &str) -> Result<()> {
        self.db
            .execute("DELETE FROM users WHERE user_id = ?1", params![user])?;
        Ok(())
    }
}

fn location_from_row(
    row: &Row<'_>,
    role: LocationRole,
    has_multiple_workplaces: bool,
) -> rusqlite::Result<SignificantLocation> {
    let cluster_id: ClusterId = row.get(0)?;
    let timestamp: DateTime<FixedOffset> = row.get(3)?;
    Ok(SignificantLocation {
        role,
        cluster_id,
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        timestamp,
        address: row.get(4)?,
        has_multiple_workplaces,
    })
}
