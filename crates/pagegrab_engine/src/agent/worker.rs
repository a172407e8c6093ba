//! Session worker threads.

use super::protocol::{AgentContext, AgentEvent, AgentProvider, CancelToken, StatusSink};
use crossbeam_channel::Sender;
use std::io;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

/// Run one provider call on its own thread.
///
/// The terminal event (`Completed`/`Failed`) is always sent, even when the
/// run was cancelled; the manager drops it by generation if the session has
/// moved on.
///
/// # Errors
/// Returns an error if the OS refuses to spawn the thread.
pub fn spawn_session_worker(
    provider: Arc<dyn AgentProvider>,
    context: AgentContext,
    generation: u64,
    evt_tx: Sender<AgentEvent>,
    cancel: CancelToken,
) -> io::Result<()> {
    let session_id = context.session_id.clone();
    let thread_name = format!("pagegrab-agent-{}", short_id(&session_id));
    thread::Builder::new().name(thread_name).spawn(move || {
        let sink = StatusSink {
            evt_tx: evt_tx.clone(),
            session_id: session_id.clone(),
            generation,
        };
        let event = match provider.send(context, &sink, &cancel) {
            Ok(()) => {
                info!(target: "pagegrab_engine::agent", session_id = %session_id, cancelled = cancel.is_cancelled(), "agent run finished");
                AgentEvent::Completed {
                    session_id,
                    generation,
                }
            }
            Err(err) => {
                warn!(target: "pagegrab_engine::agent", session_id = %session_id, error = %err, "agent run failed");
                AgentEvent::Failed {
                    session_id,
                    generation,
                    message: err.to_string(),
                }
            }
        };
        let _ = evt_tx.send(event);
    })?;
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
