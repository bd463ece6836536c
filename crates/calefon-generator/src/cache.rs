//! Generated-content cache.
//!
//! Durable key to text store for narrative fragments. Entries are never
//! expired; every put is persisted before it returns so an interrupted run
//! loses at most the fragment being generated.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use calefon_core::config::{CacheBackend, CacheConfig};
use dashmap::DashMap;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::{debug, warn};

/// Cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON store is not a string-to-string object.
    #[error("invalid cache file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A thread panicked while holding the store lock.
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Persistent key-value storage behind a [`ContentCache`].
pub trait ContentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value, persisting it before returning.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Returns whether it was present.
    fn remove(&self, key: &str) -> Result<bool>;

    /// All keys, sorted.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Single JSON object file, rewritten in full on every put.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let text = raw.strip_prefix('\u{feff}').unwrap_or(&raw).trim();
            if text.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(text).map_err(|source| CacheError::Json {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "opened JSON cache");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(|source| CacheError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = tmp_path(&self.path);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl ContentStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&entries)?;
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// Embedded SQLite store with one row per fragment.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS fragments (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl ContentStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM fragments WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute(
            "INSERT INTO fragments (key, value, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let removed = conn.execute("DELETE FROM fragments WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT key FROM fragments ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

/// Cache key, `{kind}_{slug}` or `{kind}_{slug}_{item}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a brand introduction.
    #[must_use]
    pub fn brand(slug: &str) -> Self {
        Self(format!("brand_intro_{slug}"))
    }

    /// Key for a model introduction.
    #[must_use]
    pub fn model(slug: &str, model_id: &str) -> Self {
        Self(format!("model_intro_{slug}_{model_id}"))
    }

    /// Key for a repair guide body.
    #[must_use]
    pub fn repair(slug: &str, repair_id: &str) -> Self {
        Self(format!("repair_guide_{slug}_{repair_id}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of [`ContentCache::get_or_generate`].
#[derive(Debug)]
pub enum Lookup<E> {
    /// Value was already stored.
    Hit(String),
    /// Value was produced by the generator and stored.
    Generated(String),
    /// Generator failed; nothing was stored.
    Failed(E),
}

/// Memoizing cache with at most one generation in flight per key.
pub struct ContentCache {
    store: Box<dyn ContentStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("in_flight", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl ContentCache {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: impl ContentStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            locks: DashMap::new(),
        }
    }

    /// Open the configured backend.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        let cache = match config.backend {
            CacheBackend::Json => Self::new(JsonFileStore::open(&config.path)?),
            CacheBackend::Sqlite => Self::new(SqliteStore::open(&config.path)?),
        };
        Ok(cache)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.store.put(key, value)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.store.remove(key)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    /// Return the stored value for `key`, or run `generate` and store its output.
    ///
    /// Concurrent callers with the same key wait for the first one, so
    /// `generate` runs at most once per missing key. A failed put is logged
    /// and the generated value is still returned.
    pub fn get_or_generate<E, F>(&self, key: &CacheKey, generate: F) -> Result<Lookup<E>>
    where
        F: FnOnce() -> std::result::Result<String, E>,
    {
        self.lookup(key, true, generate)
    }

    /// Like [`get_or_generate`](Self::get_or_generate), but a generated value
    /// is only returned, never stored.
    pub fn get_or_compute<E, F>(&self, key: &CacheKey, compute: F) -> Result<Lookup<E>>
    where
        F: FnOnce() -> std::result::Result<String, E>,
    {
        self.lookup(key, false, compute)
    }

    fn lookup<E, F>(&self, key: &CacheKey, persist: bool, generate: F) -> Result<Lookup<E>>
    where
        F: FnOnce() -> std::result::Result<String, E>,
    {
        if let Some(value) = self.store.get(key.as_str())? {
            return Ok(Lookup::Hit(value));
        }
        if !persist {
            return Ok(match generate() {
                Ok(value) => Lookup::Generated(value),
                Err(e) => Lookup::Failed(e),
            });
        }

        let lock = self
            .locks
            .entry(key.as_str().to_string())
            .or_default()
            .clone();
        let _guard = lock.lock().map_err(|_| CacheError::Poisoned)?;

        if let Some(value) = self.store.get(key.as_str())? {
            return Ok(Lookup::Hit(value));
        }

        match generate() {
            Ok(value) => {
                if let Err(e) = self.store.put(key.as_str(), &value) {
                    warn!(key = %key, error = %e, "failed to persist generated content");
                }
                Ok(Lookup::Generated(value))
            }
            Err(e) => Ok(Lookup::Failed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_cache_keys() {
        assert_eq!(CacheKey::brand("ariston").as_str(), "brand_intro_ariston");
        assert_eq!(
            CacheKey::model("thermo-star", "ts-60").as_str(),
            "model_intro_thermo-star_ts-60"
        );
        assert_eq!(
            CacheKey::repair("james", "cambiar-anodo").to_string(),
            "repair_guide_james_cambiar-anodo"
        );
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data/generated_content.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.put("brand_intro_james", "<p>James</p>").unwrap();
        assert_eq!(
            store.get("brand_intro_james").unwrap().as_deref(),
            Some("<p>James</p>")
        );
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("brand_intro_james").unwrap().as_deref(),
            Some("<p>James</p>")
        );
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_json_store_reads_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("generated_content.json");
        fs::write(&path, "\u{feff}{\"b\": \"2\", \"a\": \"1\"}").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "[1, 2]").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(CacheError::Json { .. })
        ));
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        let store = SqliteStore::open(&path).unwrap();
        store.put("k", "v1").unwrap();
        store.put("k", "v2").unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(reopened.keys().unwrap(), vec!["k"]);
        assert!(reopened.remove("k").unwrap());
        assert!(reopened.get("k").unwrap().is_none());
    }

    #[test]
    fn test_open_from_config() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            backend: CacheBackend::Sqlite,
            path: dir.path().join("cache.db"),
        };

        let cache = ContentCache::open(&config).unwrap();
        cache.put("a", "b").unwrap();
        assert_eq!(cache.get("a").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_get_or_generate_hit_and_miss() {
        let cache = ContentCache::new(SqliteStore::in_memory().unwrap());
        let key = CacheKey::brand("james");

        let first = cache
            .get_or_generate(&key, || Ok::<_, String>("<p>x</p>".to_string()))
            .unwrap();
        assert!(matches!(first, Lookup::Generated(ref v) if v == "<p>x</p>"));

        let second = cache
            .get_or_generate(&key, || Err::<String, _>("must not run".to_string()))
            .unwrap();
        assert!(matches!(second, Lookup::Hit(ref v) if v == "<p>x</p>"));
    }

    #[test]
    fn test_get_or_compute_does_not_store() {
        let cache = ContentCache::new(SqliteStore::in_memory().unwrap());
        let key = CacheKey::brand("james");

        let computed = cache
            .get_or_compute(&key, || Ok::<_, String>("<p>local</p>".to_string()))
            .unwrap();
        assert!(matches!(computed, Lookup::Generated(ref v) if v == "<p>local</p>"));
        assert!(cache.get(key.as_str()).unwrap().is_none());

        cache.put(key.as_str(), "<p>stored</p>").unwrap();
        let hit = cache
            .get_or_compute(&key, || Err::<String, _>("must not run"))
            .unwrap();
        assert!(matches!(hit, Lookup::Hit(ref v) if v == "<p>stored</p>"));
    }

    #[test]
    fn test_failed_generation_not_stored() {
        let cache = ContentCache::new(SqliteStore::in_memory().unwrap());
        let key = CacheKey::brand("james");

        let result = cache
            .get_or_generate(&key, || Err::<String, _>("offline"))
            .unwrap();
        assert!(matches!(result, Lookup::Failed("offline")));
        assert!(cache.get(key.as_str()).unwrap().is_none());
    }

    #[test]
    fn test_at_most_one_generation_per_key() {
        let dir = TempDir::new().unwrap();
        let cache = ContentCache::new(JsonFileStore::open(dir.path().join("c.json")).unwrap());
        let calls = AtomicUsize::new(0);
        let key = CacheKey::model("james", "j-80");

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    cache
                        .get_or_generate(&key, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok::<_, String>("body".to_string())
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(key.as_str()).unwrap().as_deref(), Some("body"));
    }
}
