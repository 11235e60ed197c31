//! Guest-type grouping

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::record::{UNKNOWN_GUEST, VmRecord};

/// Name of the root group unless configured otherwise
pub const DEFAULT_ROOT_GROUP: &str = "vcenter";

/// One inventory group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryGroup {
    /// Group name
    pub name: String,
    /// Host addresses
    pub hosts: BTreeSet<String>,
    /// Child group names (root group only)
    pub children: BTreeSet<String>,
}

impl InventoryGroup {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Result of a single scan: the root group plus one group per guest type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    root: String,
    groups: BTreeMap<String, InventoryGroup>,
    /// Address to the last VM that resolved to it
    hosts: BTreeMap<String, VmRecord>,
}

impl Inventory {
    /// Create an inventory holding only an empty root group
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let mut groups = BTreeMap::new();
        groups.insert(root.clone(), InventoryGroup::new(root.clone()));
        Self {
            root,
            groups,
            hosts: BTreeMap::new(),
        }
    }

    /// Name of the root group
    #[must_use]
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// The root group
    #[must_use]
    pub fn root(&self) -> &InventoryGroup {
        &self.groups[&self.root]
    }

    /// Look up a group by name
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&InventoryGroup> {
        self.groups.get(name)
    }

    /// All groups, root included, ordered by name
    pub fn groups(&self) -> impl Iterator<Item = &InventoryGroup> {
        self.groups.values()
    }

    /// Guest-type groups, ordered by name
    pub fn guest_groups(&self) -> impl Iterator<Item = &InventoryGroup> {
        self.groups.values().filter(|g| g.name != self.root)
    }

    /// Number of distinct host addresses
    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// VM that owns a host address
    #[must_use]
    pub fn record_for(&self, address: &str) -> Option<&VmRecord> {
        self.hosts.get(address)
    }

    pub(crate) fn host_records(&self) -> impl Iterator<Item = (&String, &VmRecord)> {
        self.hosts.iter()
    }
}

/// Folds VM records into an [`Inventory`]
#[derive(Debug)]
pub struct InventoryBuilder {
    inventory: Inventory,
}

impl InventoryBuilder {
    /// Start an inventory with the given root group name
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            inventory: Inventory::new(root),
        }
    }

    /// Add one record
    ///
    /// The guest-type group is created on first sight even if the record
    /// has no usable address. Addresses are a set: a second VM with the same
    /// address replaces the first one for host-variable lookups only.
    pub fn add(&mut self, record: VmRecord) {
        let inventory = &mut self.inventory;

        let mut group_name = record.guest_type.clone();
        if group_name == inventory.root {
            warn!(
                vm = %record.name,
                guest_type = %group_name,
                "guest id collides with root group name, grouping as {UNKNOWN_GUEST}"
            );
            group_name = UNKNOWN_GUEST.to_string();
        }

        if !inventory.groups.contains_key(&group_name) {
            debug!(group = %group_name, "new guest group");
            inventory
                .groups
                .insert(group_name.clone(), InventoryGroup::new(group_name.clone()));
            if let Some(root) = inventory.groups.get_mut(&inventory.root) {
                root.children.insert(group_name.clone());
            }
        }

        let Some(address) = record.primary_address().map(str::to_string) else {
            debug!(vm = %record.name, "no usable address, not listed as host");
            return;
        };

        if let Some(group) = inventory.groups.get_mut(&group_name) {
            group.hosts.insert(address.clone());
        }
        if let Some(previous) = inventory.hosts.insert(address.clone(), record) {
            debug!(address = %address, replaced = %previous.name, "duplicate host address");
        }
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> Inventory {
        self.inventory
    }
}

impl Extend<VmRecord> for InventoryBuilder {
    fn extend<T: IntoIterator<Item = VmRecord>>(&mut self, iter: T) {
        for record in iter {
            self.add(record);
        }
    }
}
