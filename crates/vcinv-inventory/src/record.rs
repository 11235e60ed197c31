//! Typed VM record and the extraction boundary

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vcinv_client::RawVm;

use crate::error::ScanWarning;

/// Group tag for VMs that do not report a guest id
pub const UNKNOWN_GUEST: &str = "unknown";

/// VM runtime power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    /// Running
    PoweredOn,
    /// Stopped
    PoweredOff,
    /// Suspended to disk
    Suspended,
    /// Missing or not recognised
    #[default]
    Unknown,
}

impl PowerState {
    /// Parse a vim `VirtualMachinePowerState` value
    #[must_use]
    pub fn from_vim(value: &str) -> Self {
        match value {
            "poweredOn" => PowerState::PoweredOn,
            "poweredOff" => PowerState::PoweredOff,
            "suspended" => PowerState::Suspended,
            _ => PowerState::Unknown,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::PoweredOn => write!(f, "poweredOn"),
            PowerState::PoweredOff => write!(f, "poweredOff"),
            PowerState::Suspended => write!(f, "suspended"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Normalized view of one virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    /// Managed object id
    pub id: String,
    /// VM display name
    pub name: String,
    /// Guest id reported by VMware Tools, verbatim, or [`UNKNOWN_GUEST`]
    pub guest_type: String,
    /// Guest addresses in reporting order
    pub ip_addresses: Vec<String>,
    /// Runtime power state
    pub power_state: PowerState,
    /// Guest OS full name
    pub guest_full_name: Option<String>,
    /// Guest hostname
    pub host_name: Option<String>,
    /// VMware Tools status
    pub tools_status: Option<String>,
    /// VMware Tools running status
    pub tools_running_status: Option<String>,
}

impl VmRecord {
    /// Create a record with only the grouping fields set
    pub fn new(
        name: impl Into<String>,
        guest_type: impl Into<String>,
        ip_addresses: Vec<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            guest_type: guest_type.into(),
            ip_addresses,
            power_state: PowerState::Unknown,
            guest_full_name: None,
            host_name: None,
            tools_status: None,
            tools_running_status: None,
        }
    }

    /// First address that an inventory consumer can actually reach
    #[must_use]
    pub fn primary_address(&self) -> Option<&str> {
        self.ip_addresses
            .iter()
            .map(String::as_str)
            .find(|addr| is_usable_address(addr))
    }
}

/// Check that a string is a routable IPv4/IPv6 address
///
/// Loopback, link-local and unspecified addresses are rejected.
#[must_use]
pub fn is_usable_address(addr: &str) -> bool {
    let Ok(ip) = addr.trim().parse::<IpAddr>() else {
        return false;
    };
    if ip.is_loopback() || ip.is_unspecified() {
        return false;
    }
    match ip {
        IpAddr::V4(v4) => !v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) != 0xfe80,
    }
}

/// Build a [`VmRecord`] from the raw property bag
///
/// This is the only place that deals with properties being absent. Missing
/// guest data degrades the record and is reported as a warning.
#[must_use]
pub fn extract(raw: &RawVm) -> (VmRecord, Vec<ScanWarning>) {
    let mut warnings = Vec::new();
    let owned = |path: &str| raw.get_str(path).map(str::to_string);

    let name = owned("name").unwrap_or_else(|| raw.id.clone());

    let guest_type = owned("guest.guestId").unwrap_or_else(|| {
        warnings.push(ScanWarning::extraction(&name, "guest id not reported"));
        UNKNOWN_GUEST.to_string()
    });

    let mut ip_addresses: Vec<String> = Vec::new();
    let mut push = |addr: &str| {
        let addr = addr.trim();
        if !addr.is_empty() && !ip_addresses.iter().any(|a| a == addr) {
            ip_addresses.push(addr.to_string());
        }
    };
    if let Some(addr) = raw.get_str("guest.ipAddress") {
        push(addr);
    }
    if let Some(nics) = raw.get("guest.net").and_then(Value::as_array) {
        for addr in nics
            .iter()
            .filter_map(|nic| nic.get("ipAddress").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_str)
        {
            push(addr);
        }
    }
    if ip_addresses.is_empty() {
        warnings.push(ScanWarning::extraction(&name, "no guest network data"));
    }

    let power_state = raw
        .get_str("runtime.powerState")
        .map_or(PowerState::Unknown, PowerState::from_vim);

    let record = VmRecord {
        id: raw.id.clone(),
        guest_type,
        ip_addresses,
        power_state,
        guest_full_name: owned("guest.guestFullName"),
        host_name: owned("guest.hostName"),
        tools_status: owned("guest.toolsStatus"),
        tools_running_status: owned("guest.toolsRunningStatus"),
        name,
    };

    (record, warnings)
}
