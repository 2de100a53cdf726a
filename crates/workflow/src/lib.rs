//! Workflow instance lifecycle manager.
//!
//! Keeps one page of a project's workflow instances in sync with the
//! console backend and issues lifecycle commands against it:
//!
//! - [`store::InstanceStore`] -- the displayed page, pagination window, and
//!   reload sequence numbers (last response wins).
//! - [`selection::SelectionController`] -- ids checked for bulk actions,
//!   pruned to the loaded page after every reload.
//! - [`poller`] -- fixed-interval refresh loop.
//! - [`controller::TransitionController`] -- create / start / stop / sync /
//!   activate / deactivate / delete / batch delete, each followed by a full
//!   reload.
//! - [`manager::InstanceManager`] -- mounts all of the above for a project
//!   and tears them down again.
//!
//! Failures are reported as [`events::InstanceEvent`]s on a broadcast
//! channel as well as returned to the caller.

pub mod controller;
pub mod events;
pub mod manager;
pub mod poller;
pub mod reload;
pub mod selection;
pub mod store;
pub mod view;

pub use controller::{ActionError, BatchDeleteReport, TransitionController};
pub use events::InstanceEvent;
pub use manager::{InstanceManager, ManagerConfig};
pub use reload::{ReloadOutcome, Reloader};
pub use view::{InstanceRow, InstanceView, ViewSnapshot};
