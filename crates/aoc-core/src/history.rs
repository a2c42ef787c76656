use crate::project::clean_path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub path: String,
    pub last_used: DateTime<Utc>,
    #[serde(default = "default_use_count")]
    pub use_count: u32,
}

fn default_use_count() -> u32 {
    1
}

fn default_max_entries() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Recently used project paths, most recent first. A path appears at most
/// once; using it again moves it to the front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHistory {
    #[serde(default)]
    entries: Vec<HistoryEntry>,
    #[serde(default = "default_max_entries")]
    max_entries: usize,
}

impl Default for ProjectHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectHistory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// A limit of zero is treated as one.
    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_entries(entries: Vec<HistoryEntry>, max_entries: usize) -> Self {
        let mut history = Self::with_limit(max_entries);
        for entry in entries {
            if !history.contains(&entry.path) {
                history.entries.push(entry);
            }
        }
        history.entries.truncate(history.max_entries);
        history
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries.max(1);
        self.entries.truncate(self.max_entries);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        let cleaned = clean_path(path);
        self.entries.iter().any(|entry| entry.path == cleaned)
    }

    /// Records a use of `path`, moving it to the front. Blank paths are ignored.
    pub fn add_project(&mut self, path: &str) {
        self.add_project_at(path, Utc::now());
    }

    pub fn add_project_at(&mut self, path: &str, used_at: DateTime<Utc>) {
        if path.trim().is_empty() {
            return;
        }
        let cleaned = clean_path(path);
        let use_count = match self.entries.iter().position(|entry| entry.path == cleaned) {
            Some(idx) => self.entries.remove(idx).use_count.saturating_add(1),
            None => 1,
        };
        self.entries.insert(
            0,
            HistoryEntry {
                path: cleaned,
                last_used: used_at,
                use_count,
            },
        );
        self.entries.truncate(self.max_entries);
    }

    pub fn recent_projects(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.path.clone()).collect()
    }

    pub fn top_projects(&self, count: usize) -> Vec<String> {
        self.entries
            .iter()
            .take(count)
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// Case-insensitive substring match over the path, recency order kept.
    pub fn filter_projects(&self, query: &str) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.recent_projects();
        }
        self.entries
            .iter()
            .filter(|entry| entry.path.to_lowercase().contains(&query))
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// Drops entries whose directory is gone; returns how many were dropped.
    pub fn remove_non_existent_paths(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| Path::new(&entry.path).exists());
        before - self.entries.len()
    }

    /// Keeps only the `keep_last` most recent entries.
    pub fn clear_history(&mut self, keep_last: usize) {
        self.entries.truncate(keep_last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
            + Duration::seconds(offset_secs)
    }

    #[test]
    fn re_adding_moves_path_to_front_once() {
        let mut history = ProjectHistory::new();
        history.add_project_at("/src/a", ts(0));
        history.add_project_at("/src/b", ts(1));
        history.add_project_at("/src/a/", ts(2));

        assert_eq!(history.recent_projects(), vec!["/src/a", "/src/b"]);
        assert_eq!(history.entries()[0].use_count, 2);
        assert_eq!(history.entries()[0].last_used, ts(2));
    }

    #[test]
    fn clear_history_keeps_most_recent() {
        let mut history = ProjectHistory::new();
        for (idx, path) in ["/p1", "/p2", "/p3", "/p4", "/p5"].iter().enumerate() {
            history.add_project_at(path, ts(idx as i64));
        }
        history.clear_history(2);
        assert_eq!(history.recent_projects(), vec!["/p5", "/p4"]);

        history.clear_history(10);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn limit_drops_oldest_entries() {
        let mut history = ProjectHistory::with_limit(2);
        history.add_project("/p1");
        history.add_project("/p2");
        history.add_project("/p3");
        assert_eq!(history.recent_projects(), vec!["/p3", "/p2"]);
    }

    #[test]
    fn top_and_filter_preserve_recency_order() {
        let mut history = ProjectHistory::new();
        history.add_project("/work/Api");
        history.add_project("/work/web");
        history.add_project("/home/api-docs");

        assert_eq!(history.top_projects(2), vec!["/home/api-docs", "/work/web"]);
        assert_eq!(history.top_projects(0), Vec::<String>::new());
        assert_eq!(
            history.filter_projects("API"),
            vec!["/home/api-docs", "/work/Api"]
        );
        assert_eq!(history.filter_projects("  ").len(), 3);
    }

    #[test]
    fn prune_removes_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let kept = dir.path().join("kept");
        std::fs::create_dir(&kept).expect("create dir");

        let mut history = ProjectHistory::new();
        history.add_project(&dir.path().join("gone").to_string_lossy());
        history.add_project(&kept.to_string_lossy());

        assert_eq!(history.remove_non_existent_paths(), 1);
        assert_eq!(history.recent_projects(), vec![kept.to_string_lossy()]);
    }

    #[test]
    fn deserializes_with_defaults() {
        let history: ProjectHistory = serde_json::from_str(
            r#"{"entries":[{"path":"/p1","lastUsed":"2026-03-01T12:00:00Z"}]}"#,
        )
        .expect("decode");
        assert_eq!(history.max_entries(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history.entries()[0].use_count, 1);
    }
}
