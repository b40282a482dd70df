//! Local persistence of exploration trees.
//!
//! The store is keyed by root id: each row holds one whole tree as JSON, so
//! writing a root writes its descendants and deleting a root deletes them.

mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::SecondsFormat;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::Item;

/// Key-value gateway for root items.
///
/// Implementations are blocking; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait ItemStore: Send + Sync {
    /// Insert or replace one root.
    fn put(&self, item: &Item) -> Result<()>;

    /// Insert or replace several roots in one transaction.
    fn bulk_put(&self, items: &[Item]) -> Result<()>;

    /// Remove a root and its tree. Returns whether a row existed.
    fn delete(&self, id: Uuid) -> Result<bool>;

    fn get(&self, id: Uuid) -> Result<Option<Item>>;

    /// Every stored root, newest first.
    fn get_all(&self) -> Result<Vec<Item>>;
}

/// SQLite-backed [`ItemStore`].
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "teardown")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("teardown.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }
}

impl ItemStore for Database {
    fn put(&self, item: &Item) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        write_item(&conn, item)
    }

    fn bulk_put(&self, items: &[Item]) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        for item in items {
            write_item(&tx, item)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM explorations WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    fn get(&self, id: Uuid) -> Result<Option<Item>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM explorations WHERE id = ?",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn get_all(&self) -> Result<Vec<Item>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt =
            conn.prepare("SELECT id, payload FROM explorations ORDER BY timestamp DESC, id")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let items = rows
            .into_iter()
            .filter_map(|(id, json)| match serde_json::from_str::<Item>(&json) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!("Skipping unreadable exploration {}: {}", id, e);
                    None
                }
            })
            .collect();

        Ok(items)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn write_item(conn: &Connection, item: &Item) -> Result<()> {
    let payload = serde_json::to_string(item)?;
    conn.execute(
        "INSERT INTO explorations (id, name, payload, timestamp)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            payload = excluded.payload,
            timestamp = excluded.timestamp",
        (
            item.id.to_string(),
            &item.name,
            &payload,
            item.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
        ),
    )?;
    Ok(())
}
