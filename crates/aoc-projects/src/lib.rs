mod error;
mod manager;

pub use error::ManagerError;
pub use manager::ProjectManager;
