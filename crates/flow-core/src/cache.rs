use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::types::{FileExtraction, FlowError};

const SCHEMA_VERSION: &str = "1";
const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Persistent per-file memoization of extraction results, keyed by
/// `(path, mtime, size)` with a content fingerprint stored for diagnostics
/// only (spec.md §4.2). Single-writer: only the builder's coordinator
/// thread calls `put`.
pub struct FileCache {
    conn: Connection,
}

impl FileCache {
    pub fn open(path: &Path) -> Result<Self, FlowError> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_or_wipe()?;
        Ok(cache)
    }

    pub fn in_memory() -> Result<Self, FlowError> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_or_wipe()?;
        Ok(cache)
    }

    fn initialize_or_wipe(&self) -> Result<(), FlowError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             CREATE TABLE IF NOT EXISTS file_cache (
                 file_path TEXT PRIMARY KEY,
                 mtime_ns INTEGER NOT NULL,
                 size INTEGER NOT NULL,
                 content_hash TEXT NOT NULL,
                 extraction BLOB NOT NULL
             );",
        )?;

        let stored_schema: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = 'schema_version'",
                [],
                |r| r.get(0),
            )
            .optional()?;
        let stored_tool: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = 'tool_version'",
                [],
                |r| r.get(0),
            )
            .optional()?;

        let mismatch = stored_schema.as_deref() != Some(SCHEMA_VERSION)
            || stored_tool.as_deref() != Some(TOOL_VERSION);

        if mismatch {
            self.conn.execute_batch("DELETE FROM file_cache;")?;
            self.conn.execute(
                "INSERT INTO cache_meta (key, value) VALUES ('schema_version', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![SCHEMA_VERSION],
            )?;
            self.conn.execute(
                "INSERT INTO cache_meta (key, value) VALUES ('tool_version', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![TOOL_VERSION],
            )?;
        }
        Ok(())
    }

    /// Returns the cached extraction iff `(stored mtime, stored size) ==
    /// (current mtime, current size)`. Content hash is never consulted on
    /// this path (spec.md §4.2).
    pub fn get(&self, file_path: &str, mtime_ns: i64, size: i64) -> Option<FileExtraction> {
        let row: Option<(i64, i64, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT mtime_ns, size, extraction FROM file_cache WHERE file_path = ?1",
                params![file_path],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()
            .ok()
            .flatten();

        let (stored_mtime, stored_size, blob) = row?;
        if stored_mtime != mtime_ns || stored_size != size {
            return None;
        }
        bincode::deserialize(&blob).ok()
    }

    /// Overwrite. Failures to serialize silently skip the put (spec.md
    /// §4.2: "failures to stat or read the file silently skip the put").
    pub fn put(
        &self,
        file_path: &str,
        mtime_ns: i64,
        size: i64,
        content_hash: &str,
        extraction: &FileExtraction,
    ) {
        let blob = match bincode::serialize(extraction) {
            Ok(b) => b,
            Err(_) => return,
        };
        let _ = self.conn.execute(
            "INSERT INTO file_cache (file_path, mtime_ns, size, content_hash, extraction)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(file_path) DO UPDATE SET
                mtime_ns = excluded.mtime_ns,
                size = excluded.size,
                content_hash = excluded.content_hash,
                extraction = excluded.extraction",
            params![file_path, mtime_ns, size, content_hash, blob],
        );
    }

    pub fn len(&self) -> usize {
        self.conn
            .query_row("SELECT COUNT(*) FROM file_cache", [], |r| r.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassDef, FunctionDef};

    fn sample_extraction() -> FileExtraction {
        let mut e = FileExtraction::default();
        e.functions.push(FunctionDef {
            name: "f".into(),
            qualified_name: "f".into(),
            file: "a.py".into(),
            line: 1,
            is_method: false,
            is_async: false,
            containing_class: None,
            return_type: None,
        });
        e.classes.push(ClassDef {
            name: "C".into(),
            qualified_name: "C".into(),
            file: "a.py".into(),
            line: 5,
            base_names: vec![],
            is_abstract: false,
            abstract_methods: vec![],
        });
        e
    }

    #[test]
    fn put_then_get_roundtrips() {
        let cache = FileCache::in_memory().unwrap();
        let extraction = sample_extraction();
        cache.put("a.py", 100, 200, "hash1", &extraction);
        let got = cache.get("a.py", 100, 200).unwrap();
        assert_eq!(got, extraction);
    }

    #[test]
    fn mismatched_mtime_misses() {
        let cache = FileCache::in_memory().unwrap();
        cache.put("a.py", 100, 200, "hash1", &sample_extraction());
        assert!(cache.get("a.py", 101, 200).is_none());
    }

    #[test]
    fn mismatched_size_misses() {
        let cache = FileCache::in_memory().unwrap();
        cache.put("a.py", 100, 200, "hash1", &sample_extraction());
        assert!(cache.get("a.py", 100, 201).is_none());
    }

    #[test]
    fn missing_file_returns_none() {
        let cache = FileCache::in_memory().unwrap();
        assert!(cache.get("nonexistent.py", 0, 0).is_none());
    }

    #[test]
    fn put_overwrites() {
        let cache = FileCache::in_memory().unwrap();
        cache.put("a.py", 100, 200, "hash1", &sample_extraction());
        let mut updated = sample_extraction();
        updated.functions.clear();
        cache.put("a.py", 300, 400, "hash2", &updated);
        assert!(cache.get("a.py", 100, 200).is_none());
        let got = cache.get("a.py", 300, 400).unwrap();
        assert!(got.functions.is_empty());
    }

    #[test]
    fn schema_mismatch_wipes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let cache = FileCache::open(&path).unwrap();
            cache.put("a.py", 100, 200, "hash1", &sample_extraction());
            cache
                .conn
                .execute(
                    "UPDATE cache_meta SET value = 'bogus' WHERE key = 'schema_version'",
                    [],
                )
                .unwrap();
        }
        let cache = FileCache::open(&path).unwrap();
        assert!(cache.is_empty());
    }
}
