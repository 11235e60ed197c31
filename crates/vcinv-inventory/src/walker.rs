//! Container tree traversal
//!
//! Descends from the inventory root through folders, datacenters, clusters and
//! resource pools with an explicit worklist. Containers and VMs are both
//! deduplicated, because the server lists the same VM under its folder and
//! under its resource pool.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};
use vcinv_client::{ObjectRef, RawVm, SessionError, VcenterSession};

use crate::error::ScanWarning;

/// Traversal settings
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Timeout per server round trip; a session call gets this times its round trips
    pub timeout: Duration,
    /// Top-level subtrees walked concurrently
    pub workers: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            workers: 1,
        }
    }
}

/// Timeout for one session call on `object`, scaled by its round trips
fn call_timeout(session: &dyn VcenterSession, timeout: Duration, object: &ObjectRef) -> Duration {
    timeout * session.round_trips(object).max(1)
}

/// Run a session call under a timeout
async fn timed<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, SessionError>>,
) -> Result<T, SessionError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| SessionError::Timeout(timeout))?
}

/// Lazy, sequential cursor over every VM below a starting point
pub struct TreeWalker<'a> {
    session: &'a dyn VcenterSession,
    timeout: Duration,
    /// Containers still to be listed
    stack: Vec<ObjectRef>,
    /// VMs discovered but not fetched yet
    pending: VecDeque<ObjectRef>,
    visited: HashSet<ObjectRef>,
    seen_vms: HashSet<String>,
    warnings: Vec<ScanWarning>,
    needs_root: bool,
}

impl<'a> TreeWalker<'a> {
    /// Walk the whole inventory, starting at the session's root folder
    pub fn new(session: &'a dyn VcenterSession, timeout: Duration) -> Self {
        Self {
            session,
            timeout,
            stack: Vec::new(),
            pending: VecDeque::new(),
            visited: HashSet::new(),
            seen_vms: HashSet::new(),
            warnings: Vec::new(),
            needs_root: true,
        }
    }

    /// Walk only the subtree below (or at) `start`
    pub fn subtree(session: &'a dyn VcenterSession, timeout: Duration, start: ObjectRef) -> Self {
        let mut walker = Self::new(session, timeout);
        walker.needs_root = false;
        walker.enqueue(start);
        walker
    }

    /// Take the warnings recorded so far
    pub fn take_warnings(&mut self) -> Vec<ScanWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn enqueue(&mut self, object: ObjectRef) {
        if object.kind.is_container() {
            if self.visited.insert(object.clone()) {
                self.stack.push(object);
            }
        } else if self.seen_vms.insert(object.id.clone()) {
            self.pending.push_back(object);
        }
    }

    fn skip(&mut self, object: &ObjectRef, error: &SessionError) {
        warn!(object = %object, error = %error, "skipping unreachable object");
        self.warnings.push(ScanWarning::traversal(object, error));
    }

    /// Fetch the next VM, or `None` once the tree is exhausted
    ///
    /// Containers and VMs the session fails on are skipped with a warning.
    pub async fn next_vm(&mut self) -> Option<RawVm> {
        let session = self.session;
        loop {
            if let Some(vm) = self.pending.pop_front() {
                let limit = call_timeout(session, self.timeout, &vm);
                match timed(limit, session.fetch_vm(&vm)).await {
                    Ok(raw) => return Some(raw),
                    Err(e) => {
                        self.skip(&vm, &e);
                        continue;
                    }
                }
            }

            if let Some(container) = self.stack.pop() {
                let limit = call_timeout(session, self.timeout, &container);
                match timed(limit, session.children(&container)).await {
                    Ok(children) => {
                        debug!(container = %container, count = children.len(), "descending");
                        // VMs queue in listing order; containers go onto the
                        // stack reversed so the first one is descended first
                        let (containers, vms): (Vec<_>, Vec<_>) = children
                            .into_iter()
                            .map(|child| child.object)
                            .partition(|object| object.kind.is_container());
                        for vm in vms {
                            self.enqueue(vm);
                        }
                        for container in containers.into_iter().rev() {
                            self.enqueue(container);
                        }
                    }
                    Err(e) => self.skip(&container, &e),
                }
                continue;
            }

            if self.needs_root {
                self.needs_root = false;
                match timed(self.timeout, session.root()).await {
                    Ok(root) => self.enqueue(root),
                    Err(e) => {
                        warn!(error = %e, "cannot resolve inventory root");
                        self.warnings.push(ScanWarning::traversal("inventory root", &e));
                    }
                }
                continue;
            }

            return None;
        }
    }

    /// Drain the walker
    pub async fn collect_all(mut self) -> WalkOutcome {
        let mut vms = Vec::new();
        while let Some(vm) = self.next_vm().await {
            vms.push(vm);
        }
        WalkOutcome {
            vms,
            warnings: self.warnings,
        }
    }
}

/// VMs and warnings from a completed walk
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Unique VMs in discovery order
    pub vms: Vec<RawVm>,
    /// Skipped objects and other diagnostics
    pub warnings: Vec<ScanWarning>,
}

/// Walk each top-level container concurrently
///
/// At most `options.workers` subtrees are in flight. Results are merged here,
/// in root-listing order, so the merge is the only writer.
#[instrument(skip_all, fields(workers = options.workers))]
pub async fn walk_parallel(session: &dyn VcenterSession, options: &WalkOptions) -> WalkOutcome {
    let mut outcome = WalkOutcome::default();

    let root = match timed(options.timeout, session.root()).await {
        Ok(root) => root,
        Err(e) => {
            warn!(error = %e, "cannot resolve inventory root");
            outcome
                .warnings
                .push(ScanWarning::traversal("inventory root", &e));
            return outcome;
        }
    };
    let limit = call_timeout(session, options.timeout, &root);
    let top = match timed(limit, session.children(&root)).await {
        Ok(children) => children,
        Err(e) => {
            warn!(object = %root, error = %e, "skipping unreachable object");
            outcome.warnings.push(ScanWarning::traversal(&root, &e));
            return outcome;
        }
    };
    debug!(count = top.len(), "walking top-level containers");

    let mut subtrees = stream::iter(top)
        .map(|child| TreeWalker::subtree(session, options.timeout, child.object).collect_all())
        .buffered(options.workers.max(1));

    let mut seen = HashSet::new();
    while let Some(part) = subtrees.next().await {
        outcome.warnings.extend(part.warnings);
        outcome
            .vms
            .extend(part.vms.into_iter().filter(|vm| seen.insert(vm.id.clone())));
    }

    outcome
}
