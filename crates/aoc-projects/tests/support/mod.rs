#![allow(dead_code)]

use aoc_core::{PersistenceError, Project, ProjectHistory, ProjectStorage, StorageOperation};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Default)]
struct MemoryState {
    projects_json: Vec<u8>,
    active: String,
    history: Option<ProjectHistory>,
    failing: HashSet<StorageOperation>,
    failing_once: HashSet<StorageOperation>,
    writes: usize,
}

/// Shared-handle fake: the test keeps one clone, the manager owns another.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, operation: StorageOperation) {
        self.state.borrow_mut().failing.insert(operation);
    }

    /// Fails only the next call of `operation`.
    pub fn fail_once(&self, operation: StorageOperation) {
        self.state.borrow_mut().failing_once.insert(operation);
    }

    pub fn heal(&self, operation: StorageOperation) {
        self.state.borrow_mut().failing.remove(&operation);
    }

    pub fn stored_projects(&self) -> BTreeMap<String, Project> {
        let raw = self.state.borrow().projects_json.clone();
        if raw.is_empty() {
            return BTreeMap::new();
        }
        serde_json::from_slice(&raw).expect("stored projects decode")
    }

    pub fn stored_active(&self) -> String {
        self.state.borrow().active.clone()
    }

    pub fn stored_history(&self) -> Option<ProjectHistory> {
        self.state.borrow().history.clone()
    }

    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    pub fn seed_raw_projects(&self, raw: &str) {
        self.state.borrow_mut().projects_json = raw.as_bytes().to_vec();
    }

    pub fn seed_active(&self, project_id: &str) {
        self.state.borrow_mut().active = project_id.to_string();
    }

    fn check(&self, operation: StorageOperation) -> Result<(), PersistenceError> {
        let mut state = self.state.borrow_mut();
        if state.failing.contains(&operation) || state.failing_once.remove(&operation) {
            return Err(PersistenceError::new(operation, "injected failure"));
        }
        Ok(())
    }

    fn record_write(&self, operation: StorageOperation) -> Result<(), PersistenceError> {
        self.check(operation)?;
        self.state.borrow_mut().writes += 1;
        Ok(())
    }
}

impl ProjectStorage for MemoryStorage {
    fn save_projects(&mut self, projects_json: &[u8]) -> Result<(), PersistenceError> {
        self.record_write(StorageOperation::SaveProjects)?;
        self.state.borrow_mut().projects_json = projects_json.to_vec();
        Ok(())
    }

    fn projects(&self) -> Result<Vec<u8>, PersistenceError> {
        self.check(StorageOperation::LoadProjects)?;
        Ok(self.state.borrow().projects_json.clone())
    }

    fn delete_project(&mut self, project_id: &str) -> Result<(), PersistenceError> {
        self.record_write(StorageOperation::DeleteProject)?;
        let mut stored = self.stored_projects();
        if stored.remove(project_id).is_some() {
            let raw = serde_json::to_vec(&stored).expect("encode projects");
            self.state.borrow_mut().projects_json = raw;
        }
        Ok(())
    }

    fn set_active_project(&mut self, project_id: &str) -> Result<(), PersistenceError> {
        self.record_write(StorageOperation::SetActiveProject)?;
        self.state.borrow_mut().active = project_id.to_string();
        Ok(())
    }

    fn active_project(&self) -> Result<String, PersistenceError> {
        self.check(StorageOperation::LoadActiveProject)?;
        Ok(self.state.borrow().active.clone())
    }

    fn save_project_history(&mut self, history: &ProjectHistory) -> Result<(), PersistenceError> {
        self.record_write(StorageOperation::SaveHistory)?;
        self.state.borrow_mut().history = Some(history.clone());
        Ok(())
    }

    fn project_history(&self) -> Result<Option<ProjectHistory>, PersistenceError> {
        self.check(StorageOperation::LoadHistory)?;
        Ok(self.state.borrow().history.clone())
    }
}

pub fn project_dir(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).expect("create project dir");
    dir
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
