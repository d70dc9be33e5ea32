//! `SQLite` component store: schema, pragmas and transactional lookups.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::info;

use crate::model::{Component, EntityId};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS components (
    id TEXT PRIMARY KEY,
    repository TEXT NOT NULL,
    grp TEXT,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    format TEXT NOT NULL,
    last_blob_updated INTEGER,
    last_downloaded INTEGER,
    prerelease INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_components_repository ON components(repository);
";

const SELECT_COLUMNS: &str = "id, repository, grp, name, version, format, last_blob_updated, last_downloaded, prerelease";

/// Resolves component ids against the authoritative store.
///
/// Implementations answer inside whatever transaction the caller opened;
/// an absent row is `Ok(None)`, never an error.
pub trait ComponentLookup {
    fn find_component(&self, id: &EntityId) -> crate::error::Result<Option<Component>>;
}

pub struct ComponentStore {
    conn: Connection,
}

impl ComponentStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating store directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening component store at {}", path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        info!(path = %path.display(), "opened component store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .with_context(|| "applying component store schema")?;
        Ok(Self { conn })
    }

    pub fn insert_component(&self, component: &Component) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO components
                 (id, repository, grp, name, version, format, last_blob_updated, last_downloaded, prerelease)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    component.id.as_str(),
                    component.repository,
                    component.group,
                    component.name,
                    component.version,
                    component.format,
                    component.last_blob_updated,
                    component.last_downloaded,
                    component.prerelease,
                ],
            )
            .with_context(|| format!("inserting component {}", component.id))?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn delete_component(&self, id: &EntityId) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM components WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM components", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Opens a transaction for the caller to resolve components in.
    pub fn begin(&mut self) -> Result<StorageTx<'_>> {
        Ok(StorageTx {
            tx: self.conn.transaction()?,
        })
    }
}

pub struct StorageTx<'a> {
    tx: Transaction<'a>,
}

impl StorageTx<'_> {
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

impl ComponentLookup for StorageTx<'_> {
    fn find_component(&self, id: &EntityId) -> crate::error::Result<Option<Component>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM components WHERE id = ?1");
        let component = self
            .tx
            .query_row(&sql, params![id.as_str()], row_to_component)
            .optional()?;
        Ok(component)
    }
}

fn row_to_component(row: &rusqlite::Row<'_>) -> rusqlite::Result<Component> {
    Ok(Component {
        id: EntityId::new(row.get::<_, String>(0)?),
        repository: row.get(1)?,
        group: row.get(2)?,
        name: row.get(3)?,
        version: row.get(4)?,
        format: row.get(5)?,
        last_blob_updated: row.get(6)?,
        last_downloaded: row.get(7)?,
        prerelease: row.get(8)?,
    })
}
