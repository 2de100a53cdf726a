//! The store and the selection, kept behind one lock.
//!
//! Applying a reload response and pruning the selection against it happen
//! in the same critical section, so no reader ever observes a selection
//! that references an id missing from the displayed page.

use opsdeck_core::error::CoreError;
use opsdeck_core::pagination::PageWindow;
use opsdeck_core::types::InstanceId;
use opsdeck_core::workflow_instance::{InstanceAction, WorkflowInstance};
use serde::Serialize;

use crate::selection::SelectionController;
use crate::store::{InstanceStore, ReloadTicket};

/// Result of handing a reload response to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The response replaced the page.
    Applied { out_of_range: bool },
    /// A newer reload was issued after this one; nothing changed.
    Stale,
}

#[derive(Debug, Clone)]
pub struct InstanceView {
    store: InstanceStore,
    selection: SelectionController,
}

impl InstanceView {
    pub fn new(window: PageWindow) -> Self {
        Self {
            store: InstanceStore::new(window),
            selection: SelectionController::new(),
        }
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionController {
        &mut self.selection
    }

    pub fn issue_reload(&mut self) -> ReloadTicket {
        self.store.issue_reload()
    }

    /// Apply a reload response and prune the selection to the new page.
    pub fn apply(
        &mut self,
        ticket: &ReloadTicket,
        records: Vec<WorkflowInstance>,
        total: u64,
    ) -> ApplyOutcome {
        if !self.store.apply(ticket, records, total) {
            return ApplyOutcome::Stale;
        }

        let dropped = self
            .selection
            .set_visible(self.store.ids().map(str::to_string));
        if dropped > 0 {
            tracing::debug!(dropped, "Pruned selection to reloaded page");
        }

        ApplyOutcome::Applied {
            out_of_range: self.store.window().is_out_of_range(),
        }
    }

    /// Move to another page. The selection is cleared: it only ever refers
    /// to the page it was made on.
    pub fn set_page(&mut self, page: u32) {
        self.store.set_page(page);
        self.selection.clear();
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Result<(), CoreError> {
        self.store.set_page_size(page_size)?;
        self.selection.clear();
        Ok(())
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let records = self
            .store
            .records()
            .iter()
            .map(|instance| InstanceRow {
                selected: self.selection.is_selected(&instance.id),
                actions: instance.available_actions(),
                instance: instance.clone(),
            })
            .collect();

        ViewSnapshot {
            records,
            window: self.store.window(),
            selected: self.selection.selected(),
        }
    }
}

/// One displayed instance with its checkbox state and offered actions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceRow {
    pub instance: WorkflowInstance,
    pub selected: bool,
    pub actions: Vec<InstanceAction>,
}

/// Copy of everything a renderer needs, taken under the view lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub records: Vec<InstanceRow>,
    pub window: PageWindow,
    pub selected: Vec<InstanceId>,
}

#[cfg(test)]
mod tests {
    use opsdeck_core::workflow_instance::{InstanceStatus, RunMode};

    use super::*;

    fn record(id: &str) -> WorkflowInstance {
        WorkflowInstance {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            status: InstanceStatus::Idle,
            run_mode: RunMode::Persistent,
            trigger_type: None,
            is_active: false,
            nodes: Vec::new(),
            last_run_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn loaded(ids: &[&str]) -> InstanceView {
        let mut view = InstanceView::new(PageWindow::new(10).unwrap());
        let t = view.issue_reload();
        view.apply(&t, ids.iter().map(|id| record(id)).collect(), ids.len() as u64);
        view
    }

    #[test]
    fn apply_prunes_selection() {
        let mut view = loaded(&["a", "b", "c"]);
        view.selection_mut().select_all();

        let t = view.issue_reload();
        let outcome = view.apply(&t, vec![record("b"), record("x")], 2);

        assert_eq!(outcome, ApplyOutcome::Applied { out_of_range: false });
        assert_eq!(view.selection().selected(), vec!["b"]);
    }

    #[test]
    fn stale_apply_keeps_page_and_selection() {
        let mut view = loaded(&["a", "b"]);
        view.selection_mut().select_all();

        let old = view.issue_reload();
        let _new = view.issue_reload();
        assert_eq!(view.apply(&old, vec![], 0), ApplyOutcome::Stale);

        assert_eq!(view.store().records().len(), 2);
        assert_eq!(view.selection().len(), 2);
    }

    #[test]
    fn page_change_clears_selection() {
        let mut view = loaded(&["a", "b"]);
        view.selection_mut().select_all();
        view.set_page(2);
        assert!(view.selection().is_empty());
    }

    #[test]
    fn snapshot_marks_selected_rows_and_actions() {
        let mut view = loaded(&["a", "b"]);
        view.selection_mut().toggle("b");

        let snap = view.snapshot();
        assert_eq!(snap.selected, vec!["b"]);
        assert!(!snap.records[0].selected);
        assert!(snap.records[1].selected);
        assert!(snap.records[0].actions.contains(&InstanceAction::Activate));
        assert_eq!(snap.window.total, 2);
    }
}
