pub mod history;
pub mod project;
pub mod storage;

pub use history::{HistoryEntry, ProjectHistory, DEFAULT_HISTORY_LIMIT};
pub use project::{clean_path, Project, ProjectError};
pub use storage::{PersistenceError, ProjectStorage, StorageOperation};
