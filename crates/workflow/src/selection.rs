//! Ids checked by the operator for bulk actions.
//!
//! The selection is held apart from the page itself but may only contain
//! ids that are visible on the most recently loaded page.

use std::collections::BTreeSet;

use opsdeck_core::types::InstanceId;

#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selected: BTreeSet<InstanceId>,
    visible: BTreeSet<InstanceId>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of visible ids after a reload and drop selected ids
    /// that are no longer visible. Returns how many were dropped.
    pub fn set_visible<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<InstanceId>,
    {
        self.visible = ids.into_iter().map(Into::into).collect();
        let before = self.selected.len();
        let visible = &self.visible;
        self.selected.retain(|id| visible.contains(id));
        before - self.selected.len()
    }

    /// Flip `id`. Ids not on the current page cannot be selected; toggling
    /// one is a no-op. Returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            return false;
        }
        if !self.visible.contains(id) {
            return false;
        }
        self.selected.insert(id.to_string());
        true
    }

    /// Select every id on the current page (not the backend's full set).
    pub fn select_all(&mut self) -> usize {
        self.selected = self.visible.clone();
        self.selected.len()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.selected.remove(id)
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected ids in sorted order.
    pub fn selected(&self) -> Vec<InstanceId> {
        self.selected.iter().cloned().collect()
    }
}
