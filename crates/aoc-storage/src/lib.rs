use aoc_core::{
    HistoryEntry, PersistenceError, ProjectHistory, ProjectStorage, StorageOperation,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

pub const PROJECT_SCHEMA_VERSION: i64 = 1;

const ACTIVE_PROJECT_KEY: &str = "active_project";
const HISTORY_LIMIT_KEY: &str = "history_max_entries";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

/// SQLite-backed project registry.
///
/// Projects are kept one row per id with the record stored verbatim, so a
/// single project can be deleted without rewriting the whole set.
pub struct ProjectStore {
    conn: Connection,
}

impl ProjectStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let current = self.schema_version()?;
        if current > PROJECT_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: PROJECT_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_project_registry.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    /// Replaces the stored set with `projects_json`, an object keyed by id.
    pub fn replace_projects(&mut self, projects_json: &[u8]) -> Result<(), StorageError> {
        let records: Map<String, Value> = serde_json::from_slice(projects_json)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let updated_at = Utc::now().to_rfc3339();

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM projects", [])?;
        for (project_id, record) in &records {
            if !record.is_object() {
                return Err(StorageError::Serialization(format!(
                    "project {project_id} is not a JSON object"
                )));
            }
            let record_json = serde_json::to_string(record)
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            tx.execute(
                "
                INSERT INTO projects (project_id, record_json, updated_at)
                VALUES (?1, ?2, ?3)
                ",
                params![project_id, record_json, updated_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// The stored set as one JSON object, or an empty buffer when no project
    /// is stored.
    pub fn load_projects(&self) -> Result<Vec<u8>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT project_id, record_json FROM projects ORDER BY project_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Map::new();
        for row in rows {
            let (project_id, record_json) = row?;
            let record: Value = serde_json::from_str(&record_json)
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            records.insert(project_id, record);
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::to_vec(&Value::Object(records))
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    pub fn remove_project(&self, project_id: &str) -> Result<bool, StorageError> {
        let changes = self
            .conn
            .execute("DELETE FROM projects WHERE project_id = ?1", [project_id])?;
        Ok(changes > 0)
    }

    pub fn project_count(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?)
    }

    pub fn write_active_project(&self, project_id: &str) -> Result<(), StorageError> {
        self.write_setting(ACTIVE_PROJECT_KEY, project_id)
    }

    pub fn read_active_project(&self) -> Result<String, StorageError> {
        Ok(self.setting(ACTIVE_PROJECT_KEY)?.unwrap_or_default())
    }

    pub fn write_history(&mut self, history: &ProjectHistory) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM project_history", [])?;
        for (position, entry) in history.entries().iter().enumerate() {
            tx.execute(
                "
                INSERT INTO project_history (position, path, last_used, use_count)
                VALUES (?1, ?2, ?3, ?4)
                ",
                params![
                    position as i64,
                    entry.path,
                    entry.last_used.to_rfc3339(),
                    i64::from(entry.use_count),
                ],
            )?;
        }
        tx.execute(
            "
            INSERT INTO registry_settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            ",
            params![HISTORY_LIMIT_KEY, history.max_entries().to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// `None` until a history has been written once.
    pub fn read_history(&self) -> Result<Option<ProjectHistory>, StorageError> {
        let Some(limit) = self.setting(HISTORY_LIMIT_KEY)? else {
            return Ok(None);
        };
        let max_entries = limit
            .parse::<usize>()
            .map_err(|err| StorageError::Serialization(format!("history limit: {err}")))?;

        let mut stmt = self.conn.prepare(
            "
            SELECT path, last_used, use_count
            FROM project_history
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (path, last_used, use_count) = row?;
            entries.push(HistoryEntry {
                path,
                last_used: parse_timestamp(last_used)?,
                use_count: u32::try_from(use_count).unwrap_or(u32::MAX),
            });
        }
        Ok(Some(ProjectHistory::from_entries(entries, max_entries)))
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        let exists = self
            .conn
            .query_row(
                "
                SELECT 1
                FROM sqlite_master
                WHERE type='table' AND name = ?1
                LIMIT 1
                ",
                [table_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM registry_settings WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn write_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "
            INSERT INTO registry_settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            ",
            params![key, value],
        )?;
        Ok(())
    }
}

impl ProjectStorage for ProjectStore {
    fn save_projects(&mut self, projects_json: &[u8]) -> Result<(), PersistenceError> {
        self.replace_projects(projects_json)
            .map_err(|err| persistence(StorageOperation::SaveProjects, err))
    }

    fn projects(&self) -> Result<Vec<u8>, PersistenceError> {
        self.load_projects()
            .map_err(|err| persistence(StorageOperation::LoadProjects, err))
    }

    fn delete_project(&mut self, project_id: &str) -> Result<(), PersistenceError> {
        self.remove_project(project_id)
            .map(|_| ())
            .map_err(|err| persistence(StorageOperation::DeleteProject, err))
    }

    fn set_active_project(&mut self, project_id: &str) -> Result<(), PersistenceError> {
        self.write_active_project(project_id)
            .map_err(|err| persistence(StorageOperation::SetActiveProject, err))
    }

    fn active_project(&self) -> Result<String, PersistenceError> {
        self.read_active_project()
            .map_err(|err| persistence(StorageOperation::LoadActiveProject, err))
    }

    fn save_project_history(&mut self, history: &ProjectHistory) -> Result<(), PersistenceError> {
        self.write_history(history)
            .map_err(|err| persistence(StorageOperation::SaveHistory, err))
    }

    fn project_history(&self) -> Result<Option<ProjectHistory>, PersistenceError> {
        self.read_history()
            .map_err(|err| persistence(StorageOperation::LoadHistory, err))
    }
}

fn persistence(operation: StorageOperation, err: StorageError) -> PersistenceError {
    PersistenceError::new(operation, err.to_string())
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StorageError::Timestamp(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn record(id: &str, path: &str) -> Value {
        serde_json::json!({
            "id": id,
            "path": path,
            "name": "",
            "active": false,
            "lastAccessed": "2026-03-01T10:00:00Z",
            "instances": [],
        })
    }

    #[test]
    fn migration_creates_registry_tables() {
        let db = ProjectStore::open_in_memory().expect("open db");
        for table in ["projects", "registry_settings", "project_history"] {
            assert!(db.table_exists(table).expect("table check"));
        }
        assert_eq!(
            db.schema_version().expect("schema version"),
            PROJECT_SCHEMA_VERSION
        );
    }

    #[test]
    fn newer_schema_is_rejected() {
        let file = NamedTempFile::new().expect("temp db");
        {
            let conn = Connection::open(file.path()).expect("open raw");
            conn.execute("PRAGMA user_version = 9", []).expect("bump");
        }
        assert!(matches!(
            ProjectStore::open(file.path()),
            Err(StorageError::UnsupportedSchemaVersion { found: 9, .. })
        ));
    }

    #[test]
    fn empty_store_reports_nothing_stored() {
        let db = ProjectStore::open_in_memory().expect("open db");
        assert!(db.projects().expect("projects").is_empty());
        assert_eq!(db.active_project().expect("active"), "");
        assert!(db.project_history().expect("history").is_none());
    }

    #[test]
    fn project_set_roundtrip_replaces_previous_rows() {
        let mut db = ProjectStore::open_in_memory().expect("open db");
        let mut set = Map::new();
        set.insert("p-1".to_string(), record("p-1", "/srv/a"));
        set.insert("p-2".to_string(), record("p-2", "/srv/b"));
        let payload = serde_json::to_vec(&set).expect("encode");
        db.save_projects(&payload).expect("save");

        let loaded: Map<String, Value> =
            serde_json::from_slice(&db.projects().expect("load")).expect("decode");
        assert_eq!(loaded, set);

        set.remove("p-1");
        db.save_projects(&serde_json::to_vec(&set).expect("encode"))
            .expect("save again");
        assert_eq!(db.project_count().expect("count"), 1);
    }

    #[test]
    fn delete_project_removes_single_row() {
        let mut db = ProjectStore::open_in_memory().expect("open db");
        let mut set = Map::new();
        set.insert("p-1".to_string(), record("p-1", "/srv/a"));
        set.insert("p-2".to_string(), record("p-2", "/srv/b"));
        db.save_projects(&serde_json::to_vec(&set).expect("encode"))
            .expect("save");

        db.delete_project("p-1").expect("delete");
        db.delete_project("p-unknown").expect("delete unknown is fine");
        let loaded: Map<String, Value> =
            serde_json::from_slice(&db.projects().expect("load")).expect("decode");
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["p-2"]);
    }

    #[test]
    fn malformed_project_payload_is_a_persistence_error() {
        let mut db = ProjectStore::open_in_memory().expect("open db");
        let err = db.save_projects(b"[1, 2]").expect_err("array payload");
        assert_eq!(err.operation, StorageOperation::SaveProjects);

        let err = db
            .save_projects(br#"{"p-1": 3}"#)
            .expect_err("scalar record");
        assert_eq!(err.operation, StorageOperation::SaveProjects);
        assert_eq!(db.project_count().expect("count"), 0);
    }

    #[test]
    fn active_marker_roundtrip_on_disk() {
        let file = NamedTempFile::new().expect("temp db");
        {
            let mut db = ProjectStore::open(file.path()).expect("open db");
            db.set_active_project("p-7").expect("set active");
        }
        let mut db = ProjectStore::open(file.path()).expect("reopen db");
        assert_eq!(db.active_project().expect("active"), "p-7");
        db.set_active_project("").expect("clear active");
        assert_eq!(db.active_project().expect("active"), "");
    }

    #[test]
    fn history_roundtrip_preserves_order_counts_and_limit() {
        let mut db = ProjectStore::open_in_memory().expect("open db");
        let mut history = ProjectHistory::with_limit(7);
        history.add_project_at("/srv/a", ts(8));
        history.add_project_at("/srv/b", ts(9));
        history.add_project_at("/srv/a", ts(10));
        db.save_project_history(&history).expect("save history");

        let loaded = db
            .project_history()
            .expect("load history")
            .expect("history present");
        assert_eq!(loaded, history);
        assert_eq!(loaded.max_entries(), 7);
        assert_eq!(loaded.entries()[0].use_count, 2);

        history.clear_history(1);
        db.save_project_history(&history).expect("save truncated");
        let loaded = db
            .project_history()
            .expect("load history")
            .expect("history present");
        assert_eq!(loaded.recent_projects(), vec!["/srv/a"]);
    }
}
