//! vcinv-inventory: vCenter object tree to Ansible inventory
//!
//! Walks the container tree exposed by a [`vcinv_client::VcenterSession`],
//! extracts a [`VmRecord`] per virtual machine and groups the records by the
//! guest id reported by VMware Tools.
//!
//! ```no_run
//! use vcinv_inventory::{ScanOptions, scan};
//!
//! # async fn example(session: &dyn vcinv_client::VcenterSession) -> serde_json::Result<()> {
//! let report = scan(session, &ScanOptions::default()).await;
//! println!("{}", serde_json::to_string_pretty(&report.inventory.to_list(false))?);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod group;
pub mod output;
pub mod record;
pub mod scan;
pub mod walker;

pub use error::ScanWarning;
pub use group::{DEFAULT_ROOT_GROUP, Inventory, InventoryBuilder, InventoryGroup};
pub use output::{GroupEntry, HostVars, ListOutput};
pub use record::{PowerState, UNKNOWN_GUEST, VmRecord, extract};
pub use scan::{ScanOptions, ScanReport, scan};
pub use walker::{TreeWalker, WalkOptions, WalkOutcome, walk_parallel};
