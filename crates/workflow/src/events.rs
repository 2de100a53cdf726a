//! Notifications emitted by the instance manager.
//!
//! Every outcome the operator should see (accepted commands, failures,
//! batch results, reloads) is broadcast as an [`InstanceEvent`]. How they
//! are surfaced (log line, toast, status bar) is up to the subscriber.
//! Stale reload responses are expected and produce no event.

use opsdeck_core::types::InstanceId;
use serde::Serialize;
use tokio::sync::broadcast;

/// Broadcast channel capacity for instance events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A notification from the instance manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceEvent {
    /// A reload response replaced the displayed page.
    ReloadApplied { page: u32, total: u64 },

    /// A reload failed; the previously displayed page is kept.
    ReloadFailed { error: String },

    /// The backend created a new instance.
    InstanceCreated { instance_id: InstanceId, name: String },

    /// The backend accepted a lifecycle command. The resulting state shows
    /// up on a later reload.
    ActionAccepted {
        action: &'static str,
        instance_id: InstanceId,
    },

    /// A command failed, client-side or at the backend.
    ActionFailed {
        action: &'static str,
        instance_id: Option<InstanceId>,
        error: String,
    },

    /// Every delete of a batch has been attempted.
    BatchDeleteFinished {
        deleted: Vec<InstanceId>,
        failed: Vec<InstanceId>,
    },
}

/// Create the sender half of a fresh event channel.
pub fn channel() -> broadcast::Sender<InstanceEvent> {
    let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}

/// Publish `event`, ignoring the error that only means nobody listens.
pub(crate) fn publish(tx: &broadcast::Sender<InstanceEvent>, event: InstanceEvent) {
    let _ = tx.send(event);
}
