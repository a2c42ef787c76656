use crate::cache::ViewportCache;
use crate::content::enhance_content;
use crate::instance::{ContentFetchError, Instance, InstanceStatus};
use crate::viewport::Viewport;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Paragraph, Widget},
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

pub const SCROLL_LINES: usize = 1;
pub const FAST_SCROLL_LINES: usize = 10;

const FALLBACK_BANNER: &str = "agent ops cockpit";
const NO_INSTANCE_MESSAGE: &str =
    "No agents running yet. Spin up a new instance with 'n' to get started!";
const PAUSED_MESSAGE: &str = "Session is paused. Press 'r' to resume.";
const UNNAMED_MESSAGE: &str = "Please enter a name for the instance.";

const CONTENT_FG: Color = Color::Rgb(221, 221, 221);
const MUTED_FG: Color = Color::Rgb(128, 128, 128);
const BRANCH_FG: Color = Color::Rgb(255, 215, 0);

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("content fetch failed: {0}")]
    ContentFetch(#[from] ContentFetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackKind {
    NoInstance,
    Paused { branch: String },
    Unnamed,
}

impl FallbackKind {
    fn checkout_line(branch: &str) -> String {
        format!("The instance can be checked out at '{branch}' (copied to your clipboard)")
    }

    /// Message lines shown under the banner.
    pub fn message_lines(&self) -> Vec<String> {
        match self {
            Self::NoInstance => vec![NO_INSTANCE_MESSAGE.to_string()],
            Self::Paused { branch } => vec![
                PAUSED_MESSAGE.to_string(),
                String::new(),
                Self::checkout_line(branch),
            ],
            Self::Unnamed => vec![UNNAMED_MESSAGE.to_string()],
        }
    }

    pub fn text(&self) -> String {
        let mut lines = vec![FALLBACK_BANNER.to_string(), String::new()];
        lines.extend(self.message_lines());
        lines.join("\n")
    }

    fn styled_lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(Span::styled(FALLBACK_BANNER, Style::default().fg(MUTED_FG))),
            Line::from(""),
        ];
        match self {
            Self::Paused { branch } => {
                lines.push(Line::from(PAUSED_MESSAGE));
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    Self::checkout_line(branch),
                    Style::default().fg(BRANCH_FG),
                )));
            }
            other => {
                lines.extend(other.message_lines().into_iter().map(Line::from));
            }
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    Fallback(FallbackKind),
    Content(String),
}

/// Scrollable preview of the selected instance's output.
///
/// Each instance keeps its own viewport so switching back and forth does not
/// lose the reader's place. A viewer sitting at the bottom follows new output;
/// one who has scrolled up stays put.
#[derive(Debug, Clone)]
pub struct PreviewPane {
    width: u16,
    height: u16,
    viewport: Viewport,
    state: PreviewState,
    cache: ViewportCache,
    active_instance: Option<String>,
    /// Last instance whose content was on screen. Survives fallback screens,
    /// so resuming the same instance is not a switch.
    last_shown: Option<String>,
}

impl Default for PreviewPane {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewPane {
    pub fn new() -> Self {
        let kind = FallbackKind::NoInstance;
        let mut viewport = Viewport::new(0, 0);
        viewport.set_content(&kind.text());
        Self {
            width: 0,
            height: 0,
            viewport,
            state: PreviewState::Fallback(kind),
            cache: ViewportCache::new(),
            active_instance: None,
            last_shown: None,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.viewport.set_size(width, height);
        self.cache.resize_all(width, height);
    }

    /// Refreshes the pane for `instance`. A failed capture leaves the pane
    /// exactly as it was.
    pub fn update_content(&mut self, instance: Option<&dyn Instance>) -> Result<(), PreviewError> {
        let Some(instance) = instance else {
            self.set_fallback(FallbackKind::NoInstance);
            return Ok(());
        };

        if instance.status() == InstanceStatus::Paused {
            self.set_fallback(FallbackKind::Paused {
                branch: instance.branch().to_string(),
            });
            return Ok(());
        }

        let content = instance.preview()?;
        if content.is_empty() && !instance.started() {
            self.set_fallback(FallbackKind::Unnamed);
            return Ok(());
        }

        let enhanced = enhance_content(&content, instance);
        let id = instance.id();
        let is_new_content = self.cache.content(id) != Some(enhanced.as_str());
        let is_instance_switch = self.last_shown.as_deref() != Some(id);

        let viewport = match self.cache.viewport(id) {
            None => {
                let mut viewport = Viewport::new(self.width, self.height);
                viewport.set_content(&enhanced);
                viewport.goto_bottom();
                viewport
            }
            Some(cached) => {
                let mut viewport = cached.clone();
                let was_at_bottom = viewport.at_bottom();
                viewport.set_content(&enhanced);
                // Unchanged content keeps the reader's place, even across a switch.
                if is_new_content && (is_instance_switch || was_at_bottom) {
                    viewport.goto_bottom();
                }
                viewport
            }
        };

        if is_instance_switch {
            debug!(
                event = "preview_switch",
                instance_id = %id,
                title = %instance.title(),
                new_content = is_new_content
            );
        }

        self.cache.insert(id, viewport.clone(), enhanced.clone());
        self.viewport = viewport;
        self.active_instance = Some(id.to_string());
        self.last_shown = Some(id.to_string());
        self.state = PreviewState::Content(enhanced);
        Ok(())
    }

    pub fn scroll_up(&mut self) {
        self.viewport.line_up(SCROLL_LINES);
        self.sync_active_viewport();
    }

    pub fn scroll_down(&mut self) {
        self.viewport.line_down(SCROLL_LINES);
        self.sync_active_viewport();
    }

    pub fn fast_scroll_up(&mut self) {
        self.viewport.line_up(FAST_SCROLL_LINES);
        self.sync_active_viewport();
    }

    pub fn fast_scroll_down(&mut self) {
        self.viewport.line_down(FAST_SCROLL_LINES);
        self.sync_active_viewport();
    }

    /// Forgets a dead instance. Returns whether anything was cached for it.
    pub fn remove_instance(&mut self, instance_id: &str) -> bool {
        let removed = self.cache.remove(instance_id);
        if self.last_shown.as_deref() == Some(instance_id) {
            self.last_shown = None;
        }
        if self.active_instance.as_deref() == Some(instance_id) {
            self.set_fallback(FallbackKind::NoInstance);
        }
        if removed {
            debug!(event = "preview_cache_evict", instance_id = %instance_id);
        }
        removed
    }

    /// Keeps cache entries only for `live` instance ids.
    pub fn retain_instances<'a, I>(&mut self, live: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let live: HashSet<&str> = live.into_iter().collect();
        let removed = self.cache.retain(&live);
        let active_gone = self
            .active_instance
            .as_deref()
            .is_some_and(|id| !live.contains(id));
        if self
            .last_shown
            .as_deref()
            .is_some_and(|id| !live.contains(id))
        {
            self.last_shown = None;
        }
        if active_gone {
            self.set_fallback(FallbackKind::NoInstance);
        }
        if removed > 0 {
            debug!(event = "preview_cache_prune", removed);
        }
        removed
    }

    pub fn view(&self) -> String {
        self.viewport.view()
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.state, PreviewState::Fallback(_))
    }

    pub fn active_instance(&self) -> Option<&str> {
        self.active_instance.as_deref()
    }

    pub fn cached_instances(&self) -> Vec<String> {
        self.cache.instance_ids()
    }

    pub fn scroll_offset(&self, instance_id: &str) -> Option<usize> {
        self.cache.viewport(instance_id).map(Viewport::y_offset)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    fn set_fallback(&mut self, kind: FallbackKind) {
        self.viewport.set_content(&kind.text());
        self.viewport.goto_top();
        self.active_instance = None;
        self.state = PreviewState::Fallback(kind);
    }

    fn sync_active_viewport(&mut self) {
        // The visible viewport holds fallback text; it must never reach the cache.
        if self.is_fallback() {
            return;
        }
        if let Some(id) = self.active_instance.as_deref() {
            self.cache.store_viewport(id, self.viewport.clone());
        }
    }
}

impl Widget for &PreviewPane {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match &self.state {
            PreviewState::Content(_) => {
                let lines: Vec<Line> = self
                    .viewport
                    .visible_lines()
                    .iter()
                    .map(|line| Line::from(line.as_str()))
                    .collect();
                Paragraph::new(Text::from(lines))
                    .style(Style::default().fg(CONTENT_FG))
                    .render(area, buf);
            }
            PreviewState::Fallback(kind) => {
                let lines = kind.styled_lines();
                let used = u16::try_from(lines.len()).unwrap_or(u16::MAX);
                let top = area.height.saturating_sub(used) / 2;
                let centered = Rect {
                    y: area.y + top,
                    height: area.height - top,
                    ..area
                };
                Paragraph::new(Text::from(lines))
                    .alignment(Alignment::Center)
                    .render(centered, buf);
            }
        }
    }
}
