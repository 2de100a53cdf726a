//! Local cache of the displayed page of workflow instances.
//!
//! The store only changes through a full [`InstanceStore::replace`]; no
//! individual field is ever patched locally, so the page always shows a
//! combination of values the backend actually returned.
//!
//! Reloads are sequenced: [`InstanceStore::issue_reload`] hands out a
//! [`ReloadTicket`] with a monotonically increasing sequence number, and
//! [`InstanceStore::apply`] drops any response whose ticket is no longer
//! the most recently issued one, even if the newer request has not
//! resolved yet.

use opsdeck_core::pagination::PageWindow;
use opsdeck_core::workflow_instance::WorkflowInstance;

/// Identifies one issued reload and the page it asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    seq: u64,
    page: u32,
    page_size: u32,
}

impl ReloadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// The currently displayed page of instances.
#[derive(Debug, Clone)]
pub struct InstanceStore {
    records: Vec<WorkflowInstance>,
    window: PageWindow,
    /// Sequence number of the newest issued reload.
    issued: u64,
    /// Sequence number of the reload whose response is displayed.
    applied: u64,
}

impl InstanceStore {
    pub fn new(window: PageWindow) -> Self {
        Self {
            records: Vec::new(),
            window,
            issued: 0,
            applied: 0,
        }
    }

    pub fn records(&self) -> &[WorkflowInstance] {
        &self.records
    }

    pub fn window(&self) -> PageWindow {
        self.window
    }

    pub fn total(&self) -> u64 {
        self.window.total
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowInstance> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Ids on the displayed page, in backend order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id.as_str())
    }

    /// Sequence number of the displayed response (0 before the first load).
    pub fn applied_seq(&self) -> u64 {
        self.applied
    }

    /// Swap the displayed page and total in one step.
    pub fn replace(&mut self, records: Vec<WorkflowInstance>, total: u64) {
        self.records = records;
        self.window.total = total;
    }

    /// Start a reload of the current page.
    ///
    /// A page left out of range by a shrinking total is clamped here, so
    /// it is never requested again.
    pub fn issue_reload(&mut self) -> ReloadTicket {
        let clamped = self.window.clamped_page();
        if clamped != self.window.page {
            tracing::debug!(
                from = self.window.page,
                to = clamped,
                total = self.window.total,
                "Clamping out-of-range page",
            );
            self.window.page = clamped;
        }

        self.issued += 1;
        ReloadTicket {
            seq: self.issued,
            page: self.window.page,
            page_size: self.window.page_size,
        }
    }

    /// `true` if no reload has been issued after `ticket`.
    pub fn is_current(&self, ticket: &ReloadTicket) -> bool {
        ticket.seq == self.issued
    }

    /// Apply a reload response. Returns `false` (and changes nothing) when
    /// the response is stale.
    pub fn apply(&mut self, ticket: &ReloadTicket, records: Vec<WorkflowInstance>, total: u64) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.applied = ticket.seq;
        self.replace(records, total);
        true
    }

    /// Move to another page. Reloads already in flight become stale.
    pub fn set_page(&mut self, page: u32) {
        self.window.set_page(page);
        self.issued += 1;
    }

    /// Change the page size (back to page 1). Reloads already in flight
    /// become stale.
    pub fn set_page_size(&mut self, page_size: u32) -> Result<(), opsdeck_core::error::CoreError> {
        self.window.set_page_size(page_size)?;
        self.issued += 1;
        Ok(())
    }
}
