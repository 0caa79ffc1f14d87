//! SQLite-based store implementation

use chrono::{DateTime, Local, NaiveDate};
use headroom_util::LoadId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AuditEvent, LoadSnapshot, Store, StoreError, StoreResult};

const DAY_FORMAT: &str = "%Y-%m-%d";

const LOAD_STATE_COLUMNS: &str = "load_id, quota_anchor, served_mins, window_runtime_mins, \
     is_running, start_ts, cooldown_start, catchup_active, catchup_run_secs, \
     run_today_secs, today, last_reason, updated_at";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Quota and run state, one row per load
            CREATE TABLE IF NOT EXISTS load_state (
                load_id TEXT PRIMARY KEY,
                quota_anchor TEXT,
                served_mins INTEGER NOT NULL DEFAULT 0,
                window_runtime_mins INTEGER NOT NULL DEFAULT 0,
                is_running INTEGER NOT NULL DEFAULT 0,
                start_ts TEXT,
                cooldown_start TEXT,
                catchup_active INTEGER NOT NULL DEFAULT 0,
                catchup_run_secs INTEGER NOT NULL DEFAULT 0,
                run_today_secs INTEGER NOT NULL DEFAULT 0,
                today TEXT,
                last_reason TEXT,
                updated_at TEXT NOT NULL
            );

            -- Daily runtime history
            CREATE TABLE IF NOT EXISTS daily_runtime (
                load_id TEXT NOT NULL,
                day TEXT NOT NULL,
                runtime_secs INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (load_id, day)
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_daily_runtime_day ON daily_runtime(day);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn parse_ts(value: Option<String>) -> Option<DateTime<Local>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Local))
            .ok()
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<LoadSnapshot> {
    let load_id: String = row.get(0)?;
    let today: Option<String> = row.get(10)?;
    let updated_at: Option<String> = row.get(12)?;

    Ok(LoadSnapshot {
        load_id: LoadId::new(load_id),
        quota_anchor: parse_ts(row.get(1)?),
        served_mins: row.get::<_, i64>(2)?.max(0) as u32,
        window_runtime_mins: row.get::<_, i64>(3)?.max(0) as u32,
        is_running: row.get(4)?,
        start_ts: parse_ts(row.get(5)?),
        cooldown_start: parse_ts(row.get(6)?),
        catchup_active: row.get(7)?,
        catchup_run_secs: row.get::<_, i64>(8)?.max(0) as u64,
        run_today_secs: row.get::<_, i64>(9)?.max(0) as u64,
        today: today.and_then(|d| NaiveDate::parse_from_str(&d, DAY_FORMAT).ok()),
        last_reason: row.get(11)?,
        updated_at: parse_ts(updated_at).unwrap_or_else(headroom_util::now),
    })
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = parse_ts(Some(timestamp_str)).unwrap_or_else(headroom_util::now);
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn save_load_snapshot(&self, snapshot: &LoadSnapshot) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            &format!(
                r#"
                INSERT INTO load_state ({LOAD_STATE_COLUMNS})
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(load_id) DO UPDATE SET
                    quota_anchor = excluded.quota_anchor,
                    served_mins = excluded.served_mins,
                    window_runtime_mins = excluded.window_runtime_mins,
                    is_running = excluded.is_running,
                    start_ts = excluded.start_ts,
                    cooldown_start = excluded.cooldown_start,
                    catchup_active = excluded.catchup_active,
                    catchup_run_secs = excluded.catchup_run_secs,
                    run_today_secs = excluded.run_today_secs,
                    today = excluded.today,
                    last_reason = excluded.last_reason,
                    updated_at = excluded.updated_at
                "#
            ),
            params![
                snapshot.load_id.as_str(),
                snapshot.quota_anchor.map(|t| t.to_rfc3339()),
                snapshot.served_mins as i64,
                snapshot.window_runtime_mins as i64,
                snapshot.is_running,
                snapshot.start_ts.map(|t| t.to_rfc3339()),
                snapshot.cooldown_start.map(|t| t.to_rfc3339()),
                snapshot.catchup_active,
                snapshot.catchup_run_secs as i64,
                snapshot.run_today_secs as i64,
                snapshot.today.map(|d| d.format(DAY_FORMAT).to_string()),
                snapshot.last_reason,
                snapshot.updated_at.to_rfc3339(),
            ],
        )?;

        debug!(load_id = %snapshot.load_id, served_mins = snapshot.served_mins, "Load state saved");
        Ok(())
    }

    fn load_snapshot(&self, load_id: &LoadId) -> StoreResult<Option<LoadSnapshot>> {
        let conn = self.conn()?;

        let snapshot = conn
            .query_row(
                &format!("SELECT {LOAD_STATE_COLUMNS} FROM load_state WHERE load_id = ?"),
                [load_id.as_str()],
                snapshot_from_row,
            )
            .optional()?;

        Ok(snapshot)
    }

    fn load_all_snapshots(&self) -> StoreResult<Vec<LoadSnapshot>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {LOAD_STATE_COLUMNS} FROM load_state ORDER BY load_id"
        ))?;
        let rows = stmt.query_map([], snapshot_from_row)?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        Ok(snapshots)
    }

    fn add_daily_runtime(
        &self,
        load_id: &LoadId,
        day: NaiveDate,
        runtime: Duration,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let day_str = day.format(DAY_FORMAT).to_string();
        let secs = runtime.as_secs() as i64;

        conn.execute(
            r#"
            INSERT INTO daily_runtime (load_id, day, runtime_secs)
            VALUES (?, ?, ?)
            ON CONFLICT(load_id, day)
            DO UPDATE SET runtime_secs = runtime_secs + excluded.runtime_secs
            "#,
            params![load_id.as_str(), day_str, secs],
        )?;

        debug!(load_id = %load_id, day = %day_str, added_secs = secs, "Daily runtime added");
        Ok(())
    }

    fn get_daily_runtime(&self, load_id: &LoadId, day: NaiveDate) -> StoreResult<Duration> {
        let conn = self.conn()?;
        let day_str = day.format(DAY_FORMAT).to_string();

        let secs: Option<i64> = conn
            .query_row(
                "SELECT runtime_secs FROM daily_runtime WHERE load_id = ? AND day = ?",
                params![load_id.as_str(), day_str],
                |row| row.get(0),
            )
            .optional()?;

        Ok(Duration::from_secs(secs.unwrap_or(0).max(0) as u64))
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::at(
                AuditEventType::LoadStarted {
                    load_id: LoadId::new("pump"),
                    reason: "Start ok".into(),
                    headroom_w: Some(1500),
                },
                at(10, 0),
            ))
            .unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, AuditEventType::LoadStarted { .. }));
        assert_eq!(events[0].timestamp, at(10, 0));
        assert!(matches!(events[1].event, AuditEventType::ServiceStarted));

        assert_eq!(store.get_recent_audits(1).unwrap().len(), 1);
    }

    #[test]
    fn test_daily_runtime() {
        let store = SqliteStore::in_memory().unwrap();
        let load_id = LoadId::new("pump");
        let today = at(12, 0).date_naive();

        let runtime = store.get_daily_runtime(&load_id, today).unwrap();
        assert_eq!(runtime, Duration::ZERO);

        store
            .add_daily_runtime(&load_id, today, Duration::from_secs(300))
            .unwrap();
        store
            .add_daily_runtime(&load_id, today, Duration::from_secs(200))
            .unwrap();
        assert_eq!(
            store.get_daily_runtime(&load_id, today).unwrap(),
            Duration::from_secs(500)
        );

        let tomorrow = today.succ_opt().unwrap();
        assert_eq!(store.get_daily_runtime(&load_id, tomorrow).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_load_snapshot_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        let load_id = LoadId::new("heater");

        assert!(store.load_snapshot(&load_id).unwrap().is_none());

        let mut snapshot = LoadSnapshot::empty(load_id.clone(), at(9, 0));
        snapshot.quota_anchor = Some(at(0, 0));
        snapshot.served_mins = 12;
        snapshot.window_runtime_mins = 12;
        snapshot.is_running = true;
        snapshot.start_ts = Some(at(8, 48));
        snapshot.today = Some(at(9, 0).date_naive());
        snapshot.run_today_secs = 720;
        snapshot.last_reason = Some("Start ok".into());
        store.save_load_snapshot(&snapshot).unwrap();

        let loaded = store.load_snapshot(&load_id).unwrap().unwrap();
        assert_eq!(loaded, snapshot);

        snapshot.is_running = false;
        snapshot.start_ts = None;
        snapshot.cooldown_start = Some(at(9, 30));
        store.save_load_snapshot(&snapshot).unwrap();

        let all = store.load_all_snapshots().unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_running);
        assert_eq!(all[0].cooldown_start, Some(at(9, 30)));
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headroomd.db");
        let load_id = LoadId::new("pump");

        {
            let store = SqliteStore::open(&path).unwrap();
            let mut snapshot = LoadSnapshot::empty(load_id.clone(), at(9, 0));
            snapshot.served_mins = 45;
            store.save_load_snapshot(&snapshot).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_snapshot(&load_id).unwrap().unwrap();
        assert_eq!(loaded.served_mins, 45);
    }
}
