//! Best-effort out-of-band context measurement.
//!
//! A probe forks the live session, measures the read-only fork and reports
//! back through the engine's inbound channel. The live session is never
//! sent a turn and a failed probe only produces a warning.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use arbiter_adapters::{Result, SessionAdapter, SessionHandle};
use arbiter_context::PollMark;

use crate::effect::Target;
use crate::engine::Inbound;

/// Spawns a probe task for `handle`, measured against `mark`.
pub(crate) fn spawn_probe(
    adapter: Arc<dyn SessionAdapter>,
    handle: SessionHandle,
    source: Target,
    mark: PollMark,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    tokio::spawn(async move {
        let result = measure_fork(adapter.as_ref(), &handle).await;
        debug!(%source, ok = result.is_ok(), "context probe finished");
        let _ = tx.send(Inbound::ContextPolled {
            source,
            mark,
            result,
        });
    });
}

async fn measure_fork(adapter: &dyn SessionAdapter, handle: &SessionHandle) -> Result<u64> {
    let fork = adapter.fork(handle).await?;
    let measured = adapter.measure_context(&fork).await;

    // Forks are throwaway; a failed close does not affect the measurement.
    if let Err(e) = adapter.close(&fork).await {
        debug!(session = %fork.session_id, error = %e, "failed to close probe fork");
    }
    measured
}
