//! SQLite-based response cache storage
//!
//! Stores request/response pairs keyed by fingerprint. Entry validity is
//! evaluated at read time against the TTL policy, so policy changes apply to
//! rows already on disk. The public read/write surface never errors: storage
//! failures log and degrade to a miss or a no-op, because caching is an
//! optimization, not a correctness requirement.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::key::fingerprint;
use crate::cache::{CacheKind, TtlPolicy};
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed response cache
pub struct ResponseCache {
    conn: Connection,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Open or create cache storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/tillsync on Linux/macOS)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("tillsync"))
    }

    /// Open cache storage at a specific directory (for testing)
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        Self::open_at_with(cache_dir, TtlPolicy::default(), Arc::new(SystemClock))
    }

    /// Open with an explicit TTL policy and time source.
    pub fn open_at_with(
        cache_dir: &Path,
        policy: TtlPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("responses.db");
        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            if db_path.exists() {
                std::fs::remove_file(&db_path)
                    .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
            }
            return Self::open_at_with(cache_dir, policy, clock);
        }

        // Initialize schema
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                body TEXT,
                seller_id TEXT,
                response TEXT NOT NULL,
                cache_kind TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_url ON cache_entries(url);
            CREATE INDEX IF NOT EXISTS idx_cache_kind ON cache_entries(cache_kind);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn,
            policy,
            clock,
        })
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Get the cached response for a request, or `None` on miss or expiry.
    /// An expired hit deletes the stale row before reporting the miss.
    /// Storage failures degrade to a miss.
    pub fn get(
        &self,
        method: &str,
        url: &str,
        body: Option<&Value>,
        seller_id: Option<&str>,
    ) -> Option<Value> {
        match self.try_get(method, url, body, seller_id) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", url, e);
                None
            }
        }
    }

    fn try_get(
        &self,
        method: &str,
        url: &str,
        body: Option<&Value>,
        seller_id: Option<&str>,
    ) -> Result<Option<Value>> {
        let key = fingerprint(method, url, body, seller_id);

        let row: Option<(String, String, i64)> = self
            .conn
            .query_row(
                "SELECT response, cache_kind, created_at FROM cache_entries
                 WHERE cache_key = ?1",
                [&key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((response, kind_label, created_at)) = row else {
            return Ok(None);
        };

        let kind = CacheKind::parse(&kind_label);
        let age_ms = self.clock.now_millis().saturating_sub(created_at);
        if age_ms >= self.policy.ttl(kind).as_millis() as i64 {
            log::debug!("Cache entry expired for {} ({})", url, kind_label);
            self.conn
                .execute("DELETE FROM cache_entries WHERE cache_key = ?1", [&key])?;
            return Ok(None);
        }

        match serde_json::from_str(&response) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // Unreadable row is as good as absent; drop it.
                self.conn
                    .execute("DELETE FROM cache_entries WHERE cache_key = ?1", [&key])?;
                Err(CacheError::Corrupt(e.to_string()))
            }
        }
    }

    /// Store a response with a fresh timestamp, overwriting any entry at the
    /// same key (last-write-wins). Best-effort: failures log and are dropped.
    pub fn put(
        &self,
        method: &str,
        url: &str,
        body: Option<&Value>,
        response: &Value,
        seller_id: Option<&str>,
        kind: CacheKind,
    ) {
        if let Err(e) = self.try_put(method, url, body, response, seller_id, kind) {
            log::warn!("Cache write failed for {}: {}", url, e);
        }
    }

    fn try_put(
        &self,
        method: &str,
        url: &str,
        body: Option<&Value>,
        response: &Value,
        seller_id: Option<&str>,
        kind: CacheKind,
    ) -> Result<()> {
        let key = fingerprint(method, url, body, seller_id);
        let serialized = response.to_string();

        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entries
             (cache_key, method, url, body, seller_id, response, cache_kind, created_at, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                key,
                method.to_uppercase(),
                url,
                body.map(Value::to_string),
                seller_id,
                serialized,
                kind.as_str(),
                self.clock.now_millis(),
                serialized.len()
            ],
        )?;
        Ok(())
    }

    /// Delete cached entries. With no pattern, clears everything; with a
    /// pattern, deletes every entry whose URL contains it as a substring.
    /// Idempotent; returns the number of rows removed (0 on failure).
    pub fn invalidate(&self, url_pattern: Option<&str>) -> usize {
        let result = match url_pattern {
            None => self.conn.execute("DELETE FROM cache_entries", []),
            Some(pattern) => self.conn.execute(
                "DELETE FROM cache_entries WHERE instr(url, ?1) > 0",
                [pattern],
            ),
        };

        match result {
            Ok(removed) => {
                if removed > 0 {
                    log::debug!(
                        "Invalidated {} cache entries (pattern: {:?})",
                        removed,
                        url_pattern
                    );
                }
                removed
            }
            Err(e) => {
                log::warn!("Cache invalidation failed: {}", e);
                0
            }
        }
    }

    /// Get cache statistics, scanning live against the TTL policy.
    pub fn stats(&self) -> Result<CacheStats> {
        let total_entries: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        let total_size: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
            [],
            |r| r.get(0),
        )?;

        let mut by_kind = HashMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT cache_kind, COUNT(*) FROM cache_entries GROUP BY cache_kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            by_kind.insert(kind, count as usize);
        }

        let now = self.clock.now_millis();
        let mut expired = 0i64;
        for kind in CacheKind::ALL {
            let cutoff = now - self.policy.ttl(kind).as_millis() as i64;
            expired += self.conn.query_row(
                "SELECT COUNT(*) FROM cache_entries WHERE cache_kind = ?1 AND created_at <= ?2",
                params![kind.as_str(), cutoff],
                |r| r.get::<_, i64>(0),
            )?;
        }

        Ok(CacheStats {
            total_entries: total_entries as usize,
            total_size_bytes: total_size as usize,
            by_kind,
            expired_count: expired as usize,
        })
    }

    /// Delete every expired entry and return how many were removed. `get`
    /// already self-heals on read; this bounds growth for entries that are
    /// never read again.
    pub fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now_millis();
        let mut removed = 0;
        for kind in CacheKind::ALL {
            let cutoff = now - self.policy.ttl(kind).as_millis() as i64;
            removed += self.conn.execute(
                "DELETE FROM cache_entries WHERE cache_kind = ?1 AND created_at <= ?2",
                params![kind.as_str(), cutoff],
            )?;
        }
        if removed > 0 {
            log::debug!("Swept {} expired cache entries", removed);
        }
        Ok(removed)
    }
}

/// Statistics about cache state
#[derive(Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: usize,
    pub by_kind: HashMap<String, usize>,
    pub expired_count: usize,
}
