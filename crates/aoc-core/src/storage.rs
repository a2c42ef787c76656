use crate::history::ProjectHistory;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    SaveProjects,
    LoadProjects,
    DeleteProject,
    SetActiveProject,
    LoadActiveProject,
    SaveHistory,
    LoadHistory,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::SaveProjects => "save_projects",
            StorageOperation::LoadProjects => "load_projects",
            StorageOperation::DeleteProject => "delete_project",
            StorageOperation::SetActiveProject => "set_active_project",
            StorageOperation::LoadActiveProject => "load_active_project",
            StorageOperation::SaveHistory => "save_project_history",
            StorageOperation::LoadHistory => "load_project_history",
        }
    }
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct PersistenceError {
    pub operation: StorageOperation,
    pub message: String,
}

impl PersistenceError {
    pub fn new(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Durable home of the project registry.
///
/// The project set travels as one JSON object keyed by project id; an empty
/// byte slice from [`ProjectStorage::projects`] means nothing was stored yet.
/// The active marker is a plain id where the empty string means "none".
pub trait ProjectStorage {
    fn save_projects(&mut self, projects_json: &[u8]) -> Result<(), PersistenceError>;

    fn projects(&self) -> Result<Vec<u8>, PersistenceError>;

    fn delete_project(&mut self, project_id: &str) -> Result<(), PersistenceError>;

    fn set_active_project(&mut self, project_id: &str) -> Result<(), PersistenceError>;

    fn active_project(&self) -> Result<String, PersistenceError>;

    fn save_project_history(&mut self, history: &ProjectHistory) -> Result<(), PersistenceError>;

    fn project_history(&self) -> Result<Option<ProjectHistory>, PersistenceError>;
}
