use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectError {
    #[error("project path cannot be empty")]
    EmptyPath,
    #[error("project path must be absolute: {0}")]
    RelativePath(String),
    #[error("project id cannot be empty")]
    EmptyId,
    #[error("invalid project {id}: {reason}")]
    InvalidProject { id: String, reason: String },
}

/// A tracked working directory and the agent instances bound to it.
///
/// Serialized as one record of the persisted project set, e.g.
/// `{"id":"…","path":"/src/app","name":"app","active":true,
/// "lastAccessed":"2026-03-01T10:00:00Z","instances":["a1"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub instances: Vec<String>,
}

impl Project {
    /// Creates an inactive project with a fresh id. The path is cleaned and
    /// must be absolute; existence on disk is the caller's concern.
    pub fn new(path: &str, name: &str) -> Result<Self, ProjectError> {
        if path.trim().is_empty() {
            return Err(ProjectError::EmptyPath);
        }
        let cleaned = clean_path(path);
        if !Path::new(&cleaned).is_absolute() {
            return Err(ProjectError::RelativePath(cleaned));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            path: cleaned,
            name: name.trim().to_string(),
            active: false,
            last_accessed: Utc::now(),
            instances: Vec::new(),
        })
    }

    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.id.trim().is_empty() {
            return Err(ProjectError::EmptyId);
        }
        if self.path.trim().is_empty() {
            return Err(ProjectError::EmptyPath);
        }
        if !Path::new(&self.path).is_absolute() {
            return Err(ProjectError::RelativePath(self.path.clone()));
        }
        for (idx, instance) in self.instances.iter().enumerate() {
            if instance.trim().is_empty() {
                return Err(ProjectError::InvalidProject {
                    id: self.id.clone(),
                    reason: "instance ids cannot be empty".to_string(),
                });
            }
            if self.instances[..idx].contains(instance) {
                return Err(ProjectError::InvalidProject {
                    id: self.id.clone(),
                    reason: format!("duplicate instance id {instance}"),
                });
            }
        }
        Ok(())
    }

    pub fn set_active(&mut self) {
        self.active = true;
        self.last_accessed = Utc::now();
    }

    pub fn set_inactive(&mut self) {
        self.active = false;
    }

    /// Returns false when the instance was already attached.
    pub fn add_instance(&mut self, instance_id: &str) -> bool {
        if self.has_instance(instance_id) {
            return false;
        }
        self.instances.push(instance_id.to_string());
        true
    }

    pub fn remove_instance(&mut self, instance_id: &str) -> bool {
        match self.instances.iter().position(|id| id == instance_id) {
            Some(idx) => {
                self.instances.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn has_instance(&self, instance_id: &str) -> bool {
        self.instances.iter().any(|id| id == instance_id)
    }

    /// The user-facing label: the explicit name, else the last path component.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        Path::new(&self.path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }
}

/// Lexically normalizes a path: drops `.` segments and redundant separators
/// and folds `..` into its parent. Never touches the filesystem. An empty
/// input cleans to `"."`.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return ".".to_string();
    }
    let cleaned: PathBuf = parts.iter().collect();
    cleaned.to_string_lossy().into_owned()
}
