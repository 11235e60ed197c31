//! Raw object model returned by a session

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property paths fetched for every virtual machine
pub const VM_PROPERTIES: &[&str] = &[
    "name",
    "guest.guestId",
    "guest.guestFullName",
    "guest.hostName",
    "guest.ipAddress",
    "guest.net",
    "guest.toolsStatus",
    "guest.toolsRunningStatus",
    "runtime.powerState",
];

/// Managed object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Folder of any type, including the root folder
    Folder,
    /// Datacenter
    Datacenter,
    /// Cluster compute resource
    Cluster,
    /// Resource pool (also used for vApps)
    ResourcePool,
    /// Virtual machine
    VirtualMachine,
}

impl ObjectKind {
    /// Check if objects of this kind can contain other objects
    #[must_use]
    pub fn is_container(self) -> bool {
        !matches!(self, ObjectKind::VirtualMachine)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Folder => write!(f, "Folder"),
            ObjectKind::Datacenter => write!(f, "Datacenter"),
            ObjectKind::Cluster => write!(f, "ClusterComputeResource"),
            ObjectKind::ResourcePool => write!(f, "ResourcePool"),
            ObjectKind::VirtualMachine => write!(f, "VirtualMachine"),
        }
    }
}

/// Reference to a server-side managed object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Object type
    pub kind: ObjectKind,
    /// Managed object id (`group-d1`, `vm-42`, ...)
    pub id: String,
}

impl ObjectRef {
    /// Create a new object reference
    pub fn new(kind: ObjectKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a folder reference
    pub fn folder(id: impl Into<String>) -> Self {
        Self::new(ObjectKind::Folder, id)
    }

    /// Shorthand for a virtual machine reference
    pub fn vm(id: impl Into<String>) -> Self {
        Self::new(ObjectKind::VirtualMachine, id)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Child entry returned when listing a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedObject {
    /// Reference to the object
    pub object: ObjectRef,
    /// Display name
    pub name: String,
}

impl ManagedObject {
    /// Create a new managed object entry
    pub fn new(object: ObjectRef, name: impl Into<String>) -> Self {
        Self {
            object,
            name: name.into(),
        }
    }
}

/// Virtual machine as fetched from the server
///
/// Properties are keyed by their vSphere property path (see [`VM_PROPERTIES`]).
/// Any of them may be missing; the inventory extractor decides what that means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVm {
    /// Managed object id
    pub id: String,
    /// Property bag
    pub properties: Map<String, Value>,
}

impl RawVm {
    /// Create a VM with no properties set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: Map::new(),
        }
    }

    /// Set a property, replacing any previous value
    #[must_use]
    pub fn with(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set(path, value);
        self
    }

    /// Set a property, replacing any previous value
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        self.properties.insert(path.to_string(), value.into());
    }

    /// Look up a property; JSON `null` counts as unset
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.properties.get(path).filter(|v| !v.is_null())
    }

    /// Look up a non-empty string property
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}
