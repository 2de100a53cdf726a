//! Periodic refresh of the displayed page.
//!
//! [`run`] is intended to be spawned via `tokio::spawn` and reloads the
//! current page on a fixed cadence until its [`CancellationToken`] is
//! triggered. Deadlines sit on a fixed grid of `period` from the start.
//! Ticks never overlap: each reload completes (or is cancelled) before the
//! next deadline is chosen, and deadlines that passed meanwhile are skipped
//! rather than queued.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::reload::{ReloadOutcome, Reloader};

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Run the poll loop.
///
/// The first tick fires one `period` after start; the mount performs the
/// initial load itself. A failed tick keeps the previous page and the
/// next tick runs on schedule.
pub async fn run(reloader: Reloader, period: Duration, cancel: CancellationToken) {
    tracing::info!(
        project_id = %reloader.project_id(),
        interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        "Instance poller started",
    );

    let start = Instant::now();
    let mut deadline = start + period;
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            }
            _ = sleep_until(deadline) => {
                tick += 1;
                match reloader.reload().await {
                    Ok(ReloadOutcome::Applied { page, total }) => {
                        tracing::debug!(tick, page, total, "Poll applied");
                    }
                    Ok(ReloadOutcome::Stale) => {
                        tracing::debug!(tick, "Poll superseded by a newer reload");
                    }
                    Ok(ReloadOutcome::Cancelled) => break,
                    Err(e) => {
                        // Already reported by the reloader; the page stays.
                        tracing::debug!(tick, error = %e, "Poll failed");
                    }
                }
                deadline = next_deadline(start, period, Instant::now());
            }
        }
    }

    tracing::info!(project_id = %reloader.project_id(), "Instance poller stopped");
}

/// First grid point `start + k * period` strictly after `now`.
fn next_deadline(start: Instant, period: Duration, now: Instant) -> Instant {
    let elapsed = now.saturating_duration_since(start).as_nanos();
    let into_period = elapsed % period.as_nanos().max(1);
    let into_period = Duration::from_nanos(u64::try_from(into_period).unwrap_or(0));
    now + (period - into_period)
}
