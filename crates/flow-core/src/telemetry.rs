//! Privacy-safe telemetry for flow.
//!
//! Stores aggregate command metrics in a separate `telemetry.db`. **By
//! design**, no fields exist for file paths, function names, source code,
//! or any user-identifiable information — only counts and durations.

use std::path::Path;

use rusqlite::{params, Connection};

use crate::types::FlowError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct TelemetryEvent {
    pub id: Option<i64>,
    pub timestamp: String,
    pub command: String,
    pub duration_ms: u64,
    pub exit_code: i32,
    pub files_analyzed: u32,
    pub cache_hits: u32,
    pub cache_misses: u32,
    pub entrypoint_count: u32,
    pub escape_count: u32,
}

pub struct TelemetryStore {
    conn: Connection,
}

impl TelemetryStore {
    pub fn open(path: &Path) -> Result<Self, FlowError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, FlowError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), FlowError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                command TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                exit_code INTEGER NOT NULL,
                files_analyzed INTEGER DEFAULT 0,
                cache_hits INTEGER DEFAULT 0,
                cache_misses INTEGER DEFAULT 0,
                entrypoint_count INTEGER DEFAULT 0,
                escape_count INTEGER DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);",
        )?;
        Ok(())
    }

    pub fn record(&self, event: &TelemetryEvent) -> Result<(), FlowError> {
        self.conn.execute(
            "INSERT INTO events (timestamp, command, duration_ms, exit_code,
             files_analyzed, cache_hits, cache_misses, entrypoint_count, escape_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.timestamp,
                event.command,
                event.duration_ms,
                event.exit_code,
                event.files_analyzed,
                event.cache_hits,
                event.cache_misses,
                event.entrypoint_count,
                event.escape_count,
            ],
        )?;
        Ok(())
    }

    pub fn recent_events(&self, limit: u32) -> Result<Vec<TelemetryEvent>, FlowError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, command, duration_ms, exit_code,
                    files_analyzed, cache_hits, cache_misses, entrypoint_count, escape_count
             FROM events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(TelemetryEvent {
                id: Some(row.get(0)?),
                timestamp: row.get(1)?,
                command: row.get(2)?,
                duration_ms: row.get(3)?,
                exit_code: row.get(4)?,
                files_analyzed: row.get(5)?,
                cache_hits: row.get(6)?,
                cache_misses: row.get(7)?,
                entrypoint_count: row.get(8)?,
                escape_count: row.get(9)?,
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    pub fn prune(&self, days: u32) -> Result<u64, FlowError> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM events WHERE timestamp < datetime('now', '-{days} days')"),
            [],
        )?;
        Ok(deleted as u64)
    }
}

/// Create a new `TelemetryEvent` with the current UTC timestamp.
pub fn new_event(command: &str, duration_ms: u64, exit_code: i32) -> TelemetryEvent {
    TelemetryEvent {
        id: None,
        timestamp: utc_now(),
        command: command.to_string(),
        duration_ms,
        exit_code,
        files_analyzed: 0,
        cache_hits: 0,
        cache_misses: 0,
        entrypoint_count: 0,
        escape_count: 0,
    }
}

/// UTC timestamp in SQLite-native format (`YYYY-MM-DD HH:MM:SS`), computed
/// without a chrono dependency.
fn utc_now() -> String {
    let now = std::time::SystemTime::now();
    let secs = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let days_since_epoch = secs / 86400;
    let time_of_day = secs % 86400;
    let (year, month, day) = days_to_ymd(days_since_epoch);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

fn days_to_ymd(mut days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }
    let months: [u64; 12] = if is_leap(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };
    let mut month = 1;
    for &m in &months {
        if days < m {
            break;
        }
        days -= m;
        month += 1;
    }
    (year, month, days + 1)
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_recall() {
        let store = TelemetryStore::in_memory().unwrap();
        let mut event = new_event("audit", 42, 0);
        event.files_analyzed = 10;
        event.cache_hits = 8;
        store.record(&event).unwrap();
        let events = store.recent_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].command, "audit");
        assert_eq!(events[0].files_analyzed, 10);
    }

    #[test]
    fn recent_events_orders_newest_first() {
        let store = TelemetryStore::in_memory().unwrap();
        store.record(&new_event("a", 1, 0)).unwrap();
        store.record(&new_event("b", 2, 0)).unwrap();
        let events = store.recent_events(10).unwrap();
        assert_eq!(events[0].command, "b");
        assert_eq!(events[1].command, "a");
    }

    #[test]
    fn timestamp_format_is_well_formed() {
        let ts = utc_now();
        assert_eq!(ts.len(), 19);
        assert_eq!(ts.as_bytes()[4], b'-');
        assert_eq!(ts.as_bytes()[13], b':');
    }
}
