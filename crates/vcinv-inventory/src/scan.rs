//! Walk → extract → group pipeline

use std::time::Duration;

use tracing::{info, instrument, warn};
use vcinv_client::{RawVm, VcenterSession};

use crate::error::ScanWarning;
use crate::group::{DEFAULT_ROOT_GROUP, Inventory, InventoryBuilder};
use crate::record::extract;
use crate::walker::{TreeWalker, WalkOptions, walk_parallel};

/// Scan settings
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Root group name
    pub root_group: String,
    /// Timeout per server round trip (see [`WalkOptions::timeout`])
    pub timeout: Duration,
    /// Top-level subtrees walked concurrently; 1 walks sequentially
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            root_group: DEFAULT_ROOT_GROUP.to_string(),
            timeout: Duration::from_secs(30),
            workers: 1,
        }
    }
}

/// Inventory plus everything that degraded it
#[derive(Debug)]
pub struct ScanReport {
    /// Grouped inventory
    pub inventory: Inventory,
    /// Non-fatal problems
    pub warnings: Vec<ScanWarning>,
}

impl ScanReport {
    /// Check if some part of the tree could not be visited
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.warnings.iter().any(ScanWarning::is_traversal)
    }
}

struct Collector {
    builder: InventoryBuilder,
    warnings: Vec<ScanWarning>,
    vms: usize,
}

impl Collector {
    fn add(&mut self, raw: &RawVm) {
        let (record, warnings) = extract(raw);
        for warning in &warnings {
            warn!(%warning, "degraded vm record");
        }
        self.warnings.extend(warnings);
        self.builder.add(record);
        self.vms += 1;
    }
}

/// Build an inventory from everything reachable through `session`
///
/// Never fails: unreachable containers and incomplete VMs end up in
/// [`ScanReport::warnings`] instead.
#[instrument(skip_all, fields(root_group = %options.root_group, workers = options.workers))]
pub async fn scan(session: &dyn VcenterSession, options: &ScanOptions) -> ScanReport {
    let mut collector = Collector {
        builder: InventoryBuilder::new(options.root_group.clone()),
        warnings: Vec::new(),
        vms: 0,
    };

    if options.workers > 1 {
        let walk = WalkOptions {
            timeout: options.timeout,
            workers: options.workers,
        };
        let outcome = walk_parallel(session, &walk).await;
        collector.warnings.extend(outcome.warnings);
        for raw in &outcome.vms {
            collector.add(raw);
        }
    } else {
        let mut walker = TreeWalker::new(session, options.timeout);
        while let Some(raw) = walker.next_vm().await {
            collector.add(&raw);
        }
        collector.warnings.extend(walker.take_warnings());
    }

    let inventory = collector.builder.build();
    info!(
        vms = collector.vms,
        groups = inventory.guest_groups().count(),
        hosts = inventory.host_count(),
        warnings = collector.warnings.len(),
        "scan completed"
    );

    ScanReport {
        inventory,
        warnings: collector.warnings,
    }
}
