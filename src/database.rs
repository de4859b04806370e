//! The persistence seam (guild settings and cached track resolutions) and
//! its SQLite implementation.

use crate::error::StoreError;
use crate::ids::GuildId;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Per-guild settings the engine persists across restarts.
pub trait SettingsStore: Send + Sync {
    /// Loads the stored volume for a guild, `None` if it never stored one.
    fn load_guild_volume(&self, guild: GuildId) -> Result<Option<u8>, StoreError>;

    fn save_guild_volume(&self, guild: GuildId, volume: u8) -> Result<(), StoreError>;
}

/// A persisted track resolution: the lookup key, the encoded descriptor,
/// and when the entry stops being trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub data: String,
    pub expires_at: DateTime<Utc>,
}

/// Storage for cache entries, keyed by the query/URL string.
///
/// Must support concurrent read/insert/update/delete; the resolution cache
/// and its background refresher share one instance.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    fn insert(&self, entry: &CacheEntry) -> Result<(), StoreError>;

    /// Replaces the stored descriptor and extends the expiry.
    fn update(&self, key: &str, data: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Extends the expiry without touching the descriptor.
    fn touch(&self, key: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All entries whose expiry has passed the given cutoff.
    fn expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<CacheEntry>, StoreError>;
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError(e.to_string())
    }
}

/// SQLite-backed implementation of both store traits.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and ensures the tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path.as_ref())?)?;
        info!(path = %path.as_ref().display(), "opened audio database");
        Ok(store)
    }

    /// An in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS audio_settings (
                guild_id INTEGER PRIMARY KEY,
                volume INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS track_cache (
                url TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                expires INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError(format!("database lock poisoned: {e}")))
    }
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    let expires: i64 = row.get(2)?;
    Ok(CacheEntry {
        key: row.get(0)?,
        data: row.get(1)?,
        expires_at: DateTime::from_timestamp(expires, 0).unwrap_or(DateTime::UNIX_EPOCH),
    })
}

impl SettingsStore for SqliteStore {
    fn load_guild_volume(&self, guild: GuildId) -> Result<Option<u8>, StoreError> {
        let conn = self.lock()?;
        let volume = conn
            .query_row(
                "SELECT volume FROM audio_settings WHERE guild_id = ?1",
                params![guild.0],
                |row| row.get::<_, u8>(0),
            )
            .optional()?;
        Ok(volume)
    }

    fn save_guild_volume(&self, guild: GuildId, volume: u8) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO audio_settings (guild_id, volume) VALUES (?1, ?2)",
            params![guild.0, volume],
        )?;
        Ok(())
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.lock()?;
        let entry = conn
            .query_row(
                "SELECT url, data, expires FROM track_cache WHERE url = ?1",
                params![key],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn insert(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO track_cache (url, data, expires) VALUES (?1, ?2, ?3)",
            params![entry.key, entry.data, entry.expires_at.timestamp()],
        )?;
        Ok(())
    }

    fn update(&self, key: &str, data: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE track_cache SET data = ?2, expires = ?3 WHERE url = ?1",
            params![key, data, expires_at.timestamp()],
        )?;
        Ok(())
    }

    fn touch(&self, key: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE track_cache SET expires = ?2 WHERE url = ?1",
            params![key, expires_at.timestamp()],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM track_cache WHERE url = ?1", params![key])?;
        Ok(())
    }

    fn expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<CacheEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT url, data, expires FROM track_cache WHERE expires <= ?1")?;
        let rows = stmt.query_map(params![cutoff.timestamp()], entry_from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
