use crate::instance::{Instance, InstanceStatus};

pub const READY_HINT: &str = "> Ready for input. Type a prompt and press Enter.";

/// Normalizes captured pane output for display.
///
/// Line endings become `\n`, trailing blank lines are dropped, and an
/// instance waiting for input gets a hint line appended.
pub fn enhance_content(content: &str, instance: &dyn Instance) -> String {
    let normalized = content.replace("\r\n", "\n");
    let mut lines: Vec<&str> = normalized.split('\n').collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    let mut enhanced = lines.join("\n");
    if instance.status() == InstanceStatus::Ready {
        if !enhanced.is_empty() {
            enhanced.push_str("\n\n");
        }
        enhanced.push_str(READY_HINT);
    }
    enhanced
}
