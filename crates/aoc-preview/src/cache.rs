use crate::viewport::Viewport;
use std::collections::{HashMap, HashSet};

/// Per-instance scroll state and the content last shown for it.
#[derive(Debug, Clone, Default)]
pub struct ViewportCache {
    viewports: HashMap<String, Viewport>,
    contents: HashMap<String, String>,
}

impl ViewportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.viewports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewports.is_empty()
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.viewports.contains_key(instance_id)
    }

    pub fn viewport(&self, instance_id: &str) -> Option<&Viewport> {
        self.viewports.get(instance_id)
    }

    pub fn content(&self, instance_id: &str) -> Option<&str> {
        self.contents.get(instance_id).map(String::as_str)
    }

    pub fn insert(&mut self, instance_id: &str, viewport: Viewport, content: String) {
        self.viewports.insert(instance_id.to_string(), viewport);
        self.contents.insert(instance_id.to_string(), content);
    }

    /// Updates scroll state only; the remembered content is left alone.
    pub fn store_viewport(&mut self, instance_id: &str, viewport: Viewport) {
        if let Some(slot) = self.viewports.get_mut(instance_id) {
            *slot = viewport;
        }
    }

    pub fn remove(&mut self, instance_id: &str) -> bool {
        let had_viewport = self.viewports.remove(instance_id).is_some();
        let had_content = self.contents.remove(instance_id).is_some();
        had_viewport || had_content
    }

    /// Drops every entry not in `live`, returning how many were dropped.
    pub fn retain(&mut self, live: &HashSet<&str>) -> usize {
        let before = self.viewports.len();
        self.viewports.retain(|id, _| live.contains(id.as_str()));
        self.contents.retain(|id, _| live.contains(id.as_str()));
        before - self.viewports.len()
    }

    pub fn resize_all(&mut self, width: u16, height: u16) {
        for viewport in self.viewports.values_mut() {
            viewport.set_size(width, height);
        }
    }

    pub fn instance_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.viewports.keys().cloned().collect();
        ids.sort();
        ids
    }
}
