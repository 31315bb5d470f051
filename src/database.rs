use crate::error::Result;
use crate::filter::{matches_category, KeywordMatcher};
use crate::product::ProductRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use tracing::debug;

pub const PRODUCTS_KEY: &str = "products";
pub const METADATA_KEY: &str = "metadata";

/// Minimal persistent key-value interface the cache is stored in.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create or open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Run metadata written after every merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub last_updated: DateTime<Utc>,
    pub total_products: usize,
    pub last_run_scraped: usize,
}

/// In-memory search over cached records.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub keyword: String,
    pub category: String,
    pub max_results: usize,
}

/// URL-keyed product cache on top of a [`KeyValueStore`].
pub struct CacheStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> CacheStore<S> {
    pub fn new(store: S) -> Self {
        CacheStore { store }
    }

    pub fn get_all_records(&self) -> Result<BTreeMap<String, ProductRecord>> {
        match self.store.get(PRODUCTS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn get_metadata(&self) -> Result<Option<CacheMetadata>> {
        match self.store.get(METADATA_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn cached_urls(&self) -> Result<HashSet<String>> {
        Ok(self.get_all_records()?.into_keys().collect())
    }

    /// Insert or overwrite every record by URL, then write fresh metadata.
    pub fn merge(&self, records: &[ProductRecord]) -> Result<CacheMetadata> {
        let mut all = self.get_all_records()?;
        for record in records {
            all.insert(record.url.clone(), record.clone());
        }
        self.store.set(PRODUCTS_KEY, &serde_json::to_string(&all)?)?;

        let metadata = CacheMetadata {
            last_updated: Utc::now(),
            total_products: all.len(),
            last_run_scraped: records.len(),
        };
        self.store.set(METADATA_KEY, &serde_json::to_string(&metadata)?)?;
        debug!(
            "Cache merged {} records, {} total",
            metadata.last_run_scraped, metadata.total_products
        );

        Ok(metadata)
    }

    /// Records whose name, description, brand, categories, features or specs
    /// match the keyword and whose categories or URL match the category.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<ProductRecord>> {
        let matcher = KeywordMatcher::new(&query.keyword);
        Ok(self
            .get_all_records()?
            .into_values()
            .filter(|record| matcher.matches_lowercase(&record.search_haystack()))
            .filter(|record| {
                matches_category(&record.categories.join(" "), &query.category)
                    || matches_category(&record.url, &query.category)
            })
            .take(query.max_results)
            .collect())
    }
}
