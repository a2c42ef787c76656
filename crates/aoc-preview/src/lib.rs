mod cache;
mod content;
mod instance;
mod pane;
mod viewport;

pub use cache::ViewportCache;
pub use content::{enhance_content, READY_HINT};
pub use instance::{ContentFetchError, Instance, InstanceStatus};
pub use pane::{
    FallbackKind, PreviewError, PreviewPane, PreviewState, FAST_SCROLL_LINES, SCROLL_LINES,
};
pub use viewport::Viewport;
