//! Versioned component-name and source lookups for the hovered element.
//!
//! Resolution can be slow (source maps, framework introspection), so it runs
//! on a worker thread. Every request carries a version; a reply is applied
//! only if no newer request has been issued since, so a slow lookup for an
//! element the pointer already left can never label the current one.

use crossbeam_channel::{unbounded, Receiver, Sender};
use pagegrab_core::{ElementId, ElementInfo};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file_path: String,
    pub line: u32,
    pub column: Option<u32>,
}

/// Host-side source and naming resolver.
pub trait SourceLocator: Send + Sync {
    fn locate(&self, element: &ElementInfo) -> Option<SourceLocation>;

    fn component_name(&self, element: &ElementInfo) -> Option<String> {
        element.component_name.clone()
    }
}

#[derive(Debug, Clone)]
struct LookupRequest {
    version: u64,
    element: ElementInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupReply {
    pub version: u64,
    pub element: ElementId,
    pub component_name: Option<String>,
    pub source: Option<SourceLocation>,
}

/// Channel pair for the lookup worker.
pub struct LookupHandle {
    req_tx: Sender<LookupRequest>,
    reply_rx: Receiver<LookupReply>,
}

/// Spawn the lookup worker. Queued requests are coalesced: only the newest
/// one in the backlog is resolved.
pub fn spawn_lookup_worker(locator: Arc<dyn SourceLocator>) -> std::io::Result<LookupHandle> {
    let (req_tx, req_rx) = unbounded::<LookupRequest>();
    let (reply_tx, reply_rx) = unbounded();
    thread::Builder::new()
        .name("pagegrab-lookup".to_string())
        .spawn(move || {
            while let Ok(mut request) = req_rx.recv() {
                while let Ok(newer) = req_rx.try_recv() {
                    request = newer;
                }
                let reply = LookupReply {
                    version: request.version,
                    element: request.element.id,
                    component_name: locator.component_name(&request.element),
                    source: locator.locate(&request.element),
                };
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
        })?;
    Ok(LookupHandle { req_tx, reply_rx })
}

/// Resolved data for the current target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResolvedTarget {
    pub element: Option<ElementId>,
    pub component_name: Option<String>,
    pub source: Option<SourceLocation>,
}

pub struct TargetLookup {
    handle: Option<LookupHandle>,
    version: u64,
    resolved: Option<ResolvedTarget>,
}

impl TargetLookup {
    /// A lookup without a locator resolves nothing.
    pub fn new(locator: Option<Arc<dyn SourceLocator>>) -> Self {
        let handle = locator.and_then(|locator| match spawn_lookup_worker(locator) {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(target: "pagegrab_engine::lookup", error = %err, "failed to start lookup worker");
                None
            }
        });
        Self {
            handle,
            version: 0,
            resolved: None,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn resolved(&self) -> Option<&ResolvedTarget> {
        self.resolved.as_ref()
    }

    /// Start resolving `element`, superseding any in-flight lookup.
    pub fn request(&mut self, element: ElementInfo) {
        self.version = self.version.wrapping_add(1);
        self.resolved = None;
        if let Some(handle) = &self.handle {
            let _ = handle.req_tx.send(LookupRequest {
                version: self.version,
                element,
            });
        }
    }

    /// Forget the current target; in-flight replies become stale.
    pub fn clear(&mut self) {
        self.version = self.version.wrapping_add(1);
        self.resolved = None;
    }

    /// Apply replies that arrived since the last poll.
    ///
    /// # Returns
    /// `true` if the resolved target changed.
    pub fn poll(&mut self) -> bool {
        let Some(handle) = &self.handle else {
            return false;
        };
        let replies: Vec<LookupReply> = handle.reply_rx.try_iter().collect();
        self.apply_replies(replies)
    }

    /// Block up to `timeout` for a reply (used by tests and replays).
    pub fn wait(&mut self, timeout: std::time::Duration) -> bool {
        let Some(handle) = &self.handle else {
            return false;
        };
        match handle.reply_rx.recv_timeout(timeout) {
            Ok(reply) => self.apply_replies(vec![reply]),
            Err(_) => false,
        }
    }

    fn apply_replies(&mut self, replies: Vec<LookupReply>) -> bool {
        let mut changed = false;
        for reply in replies {
            if reply.version != self.version {
                debug!(target: "pagegrab_engine::lookup", version = reply.version, current = self.version, "stale lookup dropped");
                continue;
            }
            self.resolved = Some(ResolvedTarget {
                element: Some(reply.element),
                component_name: reply.component_name,
                source: reply.source,
            });
            changed = true;
        }
        changed
    }
}
