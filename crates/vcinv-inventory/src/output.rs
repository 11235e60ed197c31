//! Ansible dynamic inventory output shapes
//!
//! `--list` maps every group name to either `{"children": [...]}` (root) or
//! `{"hosts": [...]}` (guest groups). `--host` maps variable names to values.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::group::{Inventory, InventoryGroup};
use crate::record::VmRecord;

/// Host variables for a single address
pub type HostVars = BTreeMap<String, String>;

/// Group entry in list output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupEntry {
    /// Host addresses (guest groups only, always present there)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<String>>,
    /// Child groups (root group only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
}

/// `_meta` section carrying all host variables at once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    /// Address to host variables
    pub hostvars: BTreeMap<String, HostVars>,
}

/// Complete `--list` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListOutput {
    /// Group name to entry
    #[serde(flatten)]
    pub groups: BTreeMap<String, GroupEntry>,
    /// Host variables, when enabled
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Inventory {
    /// Build the `--list` document
    ///
    /// With `host_vars` set, a `_meta.hostvars` section saves the consumer one
    /// `--host` call per host.
    #[must_use]
    pub fn to_list(&self, host_vars: bool) -> ListOutput {
        let groups = self
            .groups()
            .map(|group| (group.name.clone(), self.entry(group)))
            .collect();

        let meta = host_vars.then(|| Meta {
            hostvars: self
                .host_records()
                .map(|(address, record)| (address.clone(), vars(record)))
                .collect(),
        });

        ListOutput { groups, meta }
    }

    /// Build the `--host` document
    ///
    /// Unknown addresses, and every address while host variables are
    /// disabled, yield an empty mapping.
    #[must_use]
    pub fn host_vars(&self, address: &str, enabled: bool) -> HostVars {
        if !enabled {
            return HostVars::new();
        }
        self.record_for(address).map(vars).unwrap_or_default()
    }

    fn entry(&self, group: &InventoryGroup) -> GroupEntry {
        if group.name == self.root_name() {
            GroupEntry {
                hosts: None,
                children: Some(group.children.iter().cloned().collect()),
            }
        } else {
            GroupEntry {
                hosts: Some(group.hosts.iter().cloned().collect()),
                children: None,
            }
        }
    }
}

/// Host variables exposed for one VM
fn vars(record: &VmRecord) -> HostVars {
    let mut vars = HostVars::new();
    vars.insert("vm_name".to_string(), record.name.clone());
    vars.insert("vm_guest_guestId".to_string(), record.guest_type.clone());
    vars.insert("vm_power_state".to_string(), record.power_state.to_string());

    let optional = [
        ("vm_guest_fullname", &record.guest_full_name),
        ("vm_guest_hostName", &record.host_name),
        ("vm_guest_toolsStatus", &record.tools_status),
        ("vm_guest_toolsRunningStatus", &record.tools_running_status),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            vars.insert(key.to_string(), value.clone());
        }
    }
    vars
}
