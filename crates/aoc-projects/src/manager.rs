use crate::error::ManagerError;
use aoc_core::{
    clean_path, PersistenceError, Project, ProjectHistory, ProjectStorage, DEFAULT_HISTORY_LIMIT,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// In-memory registry state captured before a mutation so a failed write
/// can put everything back.
struct Checkpoint {
    projects: BTreeMap<String, Project>,
    active: Option<String>,
}

/// Owns the project set and the single active project.
///
/// Every mutation is applied in memory, persisted through the storage
/// backend, and undone again when persisting fails, so callers never observe
/// a change that is not durable.
pub struct ProjectManager<S: ProjectStorage> {
    projects: BTreeMap<String, Project>,
    active: Option<String>,
    history: Option<ProjectHistory>,
    history_limit: usize,
    storage: S,
}

impl<S: ProjectStorage> ProjectManager<S> {
    /// Loads the project set, the active marker and the history from `storage`.
    pub fn new(storage: S) -> Result<Self, ManagerError> {
        let history = storage
            .project_history()
            .map_err(|source| ManagerError::persistence("load project history", false, source))?;
        let mut manager = Self {
            projects: BTreeMap::new(),
            active: None,
            history,
            history_limit: DEFAULT_HISTORY_LIMIT,
            storage,
        };
        manager.load_projects()?;

        let active_id = manager
            .storage
            .active_project()
            .map_err(|source| ManagerError::persistence("load active project", false, source))?;
        manager.restore_active(&active_id);
        Ok(manager)
    }

    /// Caps the history; applies to the current history and to one created later.
    pub fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit.max(1);
        if let Some(history) = self.history.as_mut() {
            history.set_max_entries(self.history_limit);
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Registers `path`, or reactivates the project already registered there.
    pub fn add_project(&mut self, path: &str, name: &str) -> Result<Project, ManagerError> {
        if path.trim().is_empty() {
            return Err(ManagerError::Validation(
                "project path cannot be empty".to_string(),
            ));
        }
        let cleaned = resolve_path(path)?;

        if let Some(existing_id) = self.project_by_path(&cleaned).map(|p| p.id.clone()) {
            self.set_active_project(&existing_id)?;
            info!(event = "project_reactivated", project_id = %existing_id, path = %cleaned);
            return self.cloned_project(&existing_id);
        }

        let project = Project::new(&cleaned, name)?;
        if !Path::new(&project.path).exists() {
            return Err(ManagerError::Validation(format!(
                "project path does not exist: {}",
                project.path
            )));
        }

        let checkpoint = self.checkpoint();
        let project_id = project.id.clone();
        self.projects.insert(project_id.clone(), project);
        let first = self.projects.len() == 1;
        if first {
            self.mark_active(&project_id);
        }

        if let Err(source) = self.save_projects() {
            self.rollback(checkpoint);
            warn!(event = "add_rolled_back", path = %cleaned, error = %source);
            return Err(ManagerError::persistence("save project", true, source));
        }
        if first {
            if let Err(source) = self.storage.set_active_project(&project_id) {
                self.rollback(checkpoint);
                self.resync_projects("add_project");
                warn!(event = "add_rolled_back", path = %cleaned, error = %source);
                return Err(ManagerError::persistence(
                    "persist active project",
                    true,
                    source,
                ));
            }
        }

        info!(event = "project_added", project_id = %project_id, path = %cleaned);
        self.cloned_project(&project_id)
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.get(project_id)
    }

    pub fn project_by_path(&self, path: &str) -> Option<&Project> {
        let cleaned = clean_path(path);
        self.projects.values().find(|project| project.path == cleaned)
    }

    pub fn active_project(&self) -> Option<&Project> {
        self.active.as_deref().and_then(|id| self.projects.get(id))
    }

    /// Makes `project_id` the only active project.
    ///
    /// On a failed write the previous activation is restored in memory and,
    /// where the marker had already been written, in storage too.
    pub fn set_active_project(&mut self, project_id: &str) -> Result<(), ManagerError> {
        if !self.projects.contains_key(project_id) {
            return Err(ManagerError::NotFound(project_id.to_string()));
        }

        let checkpoint = self.checkpoint();
        let previous_marker = checkpoint.active.clone().unwrap_or_default();
        self.mark_active(project_id);

        if let Err(source) = self.storage.set_active_project(project_id) {
            self.rollback(checkpoint);
            warn!(event = "activate_rolled_back", project_id = %project_id, error = %source);
            return Err(ManagerError::persistence(
                "persist active project",
                true,
                source,
            ));
        }
        if let Err(source) = self.save_projects() {
            self.rollback(checkpoint);
            self.restore_marker(&previous_marker);
            warn!(event = "activate_rolled_back", project_id = %project_id, error = %source);
            return Err(ManagerError::persistence("save projects", true, source));
        }

        debug!(event = "project_activated", project_id = %project_id);
        Ok(())
    }

    /// All projects, most recently accessed first. Ties are ordered by id.
    pub fn list_projects(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.values().collect();
        projects.sort_by(|a, b| {
            b.last_accessed
                .cmp(&a.last_accessed)
                .then_with(|| a.id.cmp(&b.id))
        });
        projects
    }

    pub fn remove_project(&mut self, project_id: &str) -> Result<Project, ManagerError> {
        if !self.projects.contains_key(project_id) {
            return Err(ManagerError::NotFound(project_id.to_string()));
        }

        let checkpoint = self.checkpoint();
        let was_active = self.active.as_deref() == Some(project_id);
        if was_active {
            self.active = None;
            if let Err(source) = self.storage.set_active_project("") {
                self.rollback(checkpoint);
                return Err(ManagerError::persistence(
                    "clear active project",
                    true,
                    source,
                ));
            }
        }

        let mut removed = match self.projects.remove(project_id) {
            Some(project) => project,
            None => return Err(ManagerError::NotFound(project_id.to_string())),
        };

        if let Err(source) = self.storage.delete_project(project_id) {
            self.rollback(checkpoint);
            if was_active {
                self.restore_marker(project_id);
            }
            warn!(event = "remove_rolled_back", project_id = %project_id, error = %source);
            return Err(ManagerError::persistence(
                "delete project from storage",
                true,
                source,
            ));
        }
        if let Err(source) = self.save_projects() {
            self.rollback(checkpoint);
            // The row is already gone from storage; put it back.
            self.resync_projects("remove_project");
            if was_active {
                self.restore_marker(project_id);
            }
            warn!(event = "remove_rolled_back", project_id = %project_id, error = %source);
            return Err(ManagerError::persistence(
                "save projects after deletion",
                true,
                source,
            ));
        }

        removed.set_inactive();
        info!(event = "project_removed", project_id = %project_id, path = %removed.path);
        Ok(removed)
    }

    /// Checks a candidate path without touching any state. Paths of already
    /// registered projects pass, since adding them again reactivates them.
    pub fn validate_project_path(&self, path: &str) -> Result<(), ManagerError> {
        if path.trim().is_empty() {
            return Err(ManagerError::Validation(
                "project path cannot be empty".to_string(),
            ));
        }
        let cleaned = clean_path(path);
        if !Path::new(&cleaned).is_absolute() {
            return Err(ManagerError::Validation(format!(
                "project path must be absolute: {path}"
            )));
        }
        if !Path::new(&cleaned).exists() {
            return Err(ManagerError::Validation(format!(
                "project path does not exist: {cleaned}"
            )));
        }
        Ok(())
    }

    pub fn project_instances(&self, project_id: &str) -> Result<Vec<String>, ManagerError> {
        self.projects
            .get(project_id)
            .map(|project| project.instances.clone())
            .ok_or_else(|| ManagerError::NotFound(project_id.to_string()))
    }

    /// Attaching an instance that is already attached succeeds without a write.
    pub fn add_instance_to_project(
        &mut self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<(), ManagerError> {
        let checkpoint = self.checkpoint();
        let project = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ManagerError::NotFound(project_id.to_string()))?;
        if !project.add_instance(instance_id) {
            return Ok(());
        }

        if let Err(source) = self.save_projects() {
            self.rollback(checkpoint);
            warn!(event = "attach_rolled_back", project_id = %project_id, instance_id = %instance_id);
            return Err(ManagerError::persistence("attach instance", true, source));
        }
        debug!(event = "instance_attached", project_id = %project_id, instance_id = %instance_id);
        Ok(())
    }

    pub fn remove_instance_from_project(
        &mut self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<(), ManagerError> {
        let checkpoint = self.checkpoint();
        let project = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ManagerError::NotFound(project_id.to_string()))?;
        if !project.remove_instance(instance_id) {
            return Err(ManagerError::InstanceNotFound {
                project_id: project_id.to_string(),
                instance_id: instance_id.to_string(),
            });
        }

        if let Err(source) = self.save_projects() {
            self.rollback(checkpoint);
            warn!(event = "detach_rolled_back", project_id = %project_id, instance_id = %instance_id);
            return Err(ManagerError::persistence("detach instance", true, source));
        }
        debug!(event = "instance_detached", project_id = %project_id, instance_id = %instance_id);
        Ok(())
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn project_history(&self) -> Option<&ProjectHistory> {
        self.history.as_ref()
    }

    /// Records a use of `project_path` and persists the history.
    pub fn update_project_history(&mut self, project_path: &str) -> Result<(), ManagerError> {
        let limit = self.history_limit;
        let history = self
            .history
            .get_or_insert_with(|| ProjectHistory::with_limit(limit));
        let previous = history.clone();
        history.add_project(project_path);
        self.persist_history(previous, "update project history")
    }

    /// Keeps the `keep_last` most recent history entries.
    pub fn clear_project_history(&mut self, keep_last: usize) -> Result<(), ManagerError> {
        match self.history.as_mut() {
            Some(history) => {
                let previous = history.clone();
                history.clear_history(keep_last);
                self.persist_history(previous, "clear project history")
            }
            None => {
                self.history = Some(ProjectHistory::with_limit(self.history_limit));
                Ok(())
            }
        }
    }

    pub fn recent_project_paths(&self) -> Vec<String> {
        self.history
            .as_ref()
            .map(ProjectHistory::recent_projects)
            .unwrap_or_default()
    }

    pub fn top_project_paths(&self, count: usize) -> Vec<String> {
        self.history
            .as_ref()
            .map(|history| history.top_projects(count))
            .unwrap_or_default()
    }

    pub fn filter_project_paths(&self, query: &str) -> Vec<String> {
        self.history
            .as_ref()
            .map(|history| history.filter_projects(query))
            .unwrap_or_default()
    }

    /// Drops history entries whose directory is gone. Persists only when
    /// something was removed; returns the number of dropped entries.
    pub fn cleanup_non_existent_projects(&mut self) -> Result<usize, ManagerError> {
        let Some(history) = self.history.as_mut() else {
            return Ok(0);
        };
        let previous = history.clone();
        let removed = history.remove_non_existent_paths();
        if removed > 0 {
            self.persist_history(previous, "prune project history")?;
        }
        Ok(removed)
    }

    fn persist_history(
        &mut self,
        previous: ProjectHistory,
        action: &'static str,
    ) -> Result<(), ManagerError> {
        let Some(history) = self.history.as_ref() else {
            return Ok(());
        };
        if let Err(source) = self.storage.save_project_history(history) {
            self.history = Some(previous);
            warn!(event = "history_rolled_back", action = action, error = %source);
            return Err(ManagerError::persistence(action, true, source));
        }
        Ok(())
    }

    fn load_projects(&mut self) -> Result<(), ManagerError> {
        let raw = self
            .storage
            .projects()
            .map_err(|source| ManagerError::persistence("load projects", false, source))?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let mut projects: BTreeMap<String, Project> =
            serde_json::from_slice(&raw).map_err(|err| ManagerError::Decode(err.to_string()))?;
        for (id, project) in projects.iter_mut() {
            project.validate()?;
            if &project.id != id {
                return Err(ManagerError::Decode(format!(
                    "project stored under {id} carries id {}",
                    project.id
                )));
            }
            // The active marker is authoritative; flags are re-derived from it.
            project.active = false;
        }
        self.projects = projects;
        Ok(())
    }

    fn restore_active(&mut self, project_id: &str) {
        if project_id.is_empty() {
            return;
        }
        match self.projects.get_mut(project_id) {
            Some(project) => {
                project.active = true;
                self.active = Some(project_id.to_string());
            }
            None => warn!(event = "dangling_active_marker", project_id = %project_id),
        }
    }

    fn save_projects(&mut self) -> Result<(), PersistenceError> {
        let payload = serde_json::to_vec(&self.projects).map_err(|err| {
            PersistenceError::new(aoc_core::StorageOperation::SaveProjects, err.to_string())
        })?;
        self.storage.save_projects(&payload)
    }

    fn mark_active(&mut self, project_id: &str) {
        if let Some(previous) = self.active.take() {
            if let Some(project) = self.projects.get_mut(&previous) {
                project.set_inactive();
            }
        }
        if let Some(project) = self.projects.get_mut(project_id) {
            project.set_active();
            self.active = Some(project_id.to_string());
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            projects: self.projects.clone(),
            active: self.active.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.projects = checkpoint.projects;
        self.active = checkpoint.active;
    }

    fn restore_marker(&mut self, project_id: &str) {
        if let Err(err) = self.storage.set_active_project(project_id) {
            warn!(event = "marker_restore_failed", project_id = %project_id, error = %err);
        }
    }

    fn resync_projects(&mut self, action: &'static str) {
        if let Err(err) = self.save_projects() {
            warn!(event = "resync_failed", action = action, error = %err);
        }
    }

    fn cloned_project(&self, project_id: &str) -> Result<Project, ManagerError> {
        self.projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| ManagerError::NotFound(project_id.to_string()))
    }
}

fn resolve_path(path: &str) -> Result<String, ManagerError> {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Ok(clean_path(&candidate.to_string_lossy()));
    }
    let cwd = std::env::current_dir().map_err(|err| {
        ManagerError::Validation(format!("cannot resolve relative path {path}: {err}"))
    })?;
    Ok(clean_path(&cwd.join(candidate).to_string_lossy()))
}
