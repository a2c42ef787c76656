use aoc_core::{PersistenceError, ProjectError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("project not found: {0}")]
    NotFound(String),
    #[error("instance {instance_id} not found in project {project_id}")]
    InstanceNotFound {
        project_id: String,
        instance_id: String,
    },
    #[error("invalid project path: {0}")]
    Validation(String),
    #[error("project error: {0}")]
    Project(#[from] ProjectError),
    #[error("failed to {action}")]
    Persistence {
        action: &'static str,
        /// True when the in-memory change was undone before returning.
        rolled_back: bool,
        source: PersistenceError,
    },
    #[error("stored project set is unreadable: {0}")]
    Decode(String),
}

impl ManagerError {
    pub(crate) fn persistence(
        action: &'static str,
        rolled_back: bool,
        source: PersistenceError,
    ) -> Self {
        ManagerError::Persistence {
            action,
            rolled_back,
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ManagerError::NotFound(_) | ManagerError::InstanceNotFound { .. }
        )
    }
}
