use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    /// Idle and waiting for input.
    Ready,
    Loading,
    Paused,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to capture preview for {instance_id}: {message}")]
pub struct ContentFetchError {
    pub instance_id: String,
    pub message: String,
}

impl ContentFetchError {
    pub fn new(instance_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            message: message.into(),
        }
    }
}

/// What the preview pane needs from a running agent instance.
///
/// `id` must be stable for the lifetime of the instance; the pane keys its
/// per-instance scroll state by it.
pub trait Instance {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn status(&self) -> InstanceStatus;
    fn branch(&self) -> &str;
    fn started(&self) -> bool;
    fn preview(&self) -> Result<String, ContentFetchError>;
}
