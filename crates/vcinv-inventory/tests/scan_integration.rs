use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use vcinv_client::{ManagedObject, ObjectKind, ObjectRef, RawVm, SessionError, VcenterSession};
use vcinv_inventory::*;

// Mock implementation
#[derive(Default)]
struct MockSession {
    tree: HashMap<String, Vec<ManagedObject>>,
    vms: HashMap<String, RawVm>,
    broken: HashSet<String>,
}

impl MockSession {
    fn container(&mut self, parent: &str, kind: ObjectKind, id: &str) {
        self.tree
            .entry(parent.to_string())
            .or_default()
            .push(ManagedObject::new(ObjectRef::new(kind, id), id));
    }

    fn vm(&mut self, parent: &str, raw: RawVm) {
        let name = raw.get_str("name").unwrap_or(raw.id.as_str()).to_string();
        self.tree
            .entry(parent.to_string())
            .or_default()
            .push(ManagedObject::new(ObjectRef::vm(raw.id.clone()), name));
        self.vms.insert(raw.id.clone(), raw);
    }
}

#[async_trait]
impl VcenterSession for MockSession {
    async fn root(&self) -> vcinv_client::Result<ObjectRef> {
        Ok(ObjectRef::folder("group-d1"))
    }

    async fn children(&self, container: &ObjectRef) -> vcinv_client::Result<Vec<ManagedObject>> {
        if self.broken.contains(&container.id) {
            return Err(SessionError::Api {
                status: 403,
                message: "permission denied".to_string(),
            });
        }
        Ok(self.tree.get(&container.id).cloned().unwrap_or_default())
    }

    async fn fetch_vm(&self, vm: &ObjectRef) -> vcinv_client::Result<RawVm> {
        self.vms.get(&vm.id).cloned().ok_or(SessionError::Api {
            status: 404,
            message: format!("{} not found", vm.id),
        })
    }

    async fn logout(&self) -> vcinv_client::Result<()> {
        Ok(())
    }
}

fn raw(id: &str, guest: Option<&str>, ip: Option<&str>) -> RawVm {
    let mut vm = RawVm::new(id)
        .with("name", format!("{id}-name"))
        .with("runtime.powerState", "poweredOn");
    if let Some(guest) = guest {
        vm.set("guest.guestId", guest);
    }
    if let Some(ip) = ip {
        vm.set("guest.ipAddress", ip);
        vm.set("guest.net", json!([{ "ipAddress": [ip] }]));
    }
    vm
}

/// Three VMs spread over a datacenter, a cluster and a nested folder
fn lab() -> MockSession {
    let mut s = MockSession::default();
    s.container("group-d1", ObjectKind::Datacenter, "dc-1");
    s.container("dc-1", ObjectKind::Folder, "vm-folder");
    s.container("dc-1", ObjectKind::Cluster, "cluster-1");
    s.container("vm-folder", ObjectKind::Folder, "linux");
    s.container("cluster-1", ObjectKind::ResourcePool, "resgroup-1");
    s.vm("linux", raw("vm-14", Some("centos64Guest"), Some("192.168.1.14")));
    s.vm("linux", raw("vm-15", Some("centos64Guest"), Some("192.168.1.15")));
    s.vm("vm-folder", raw("vm-13", Some("sles11_64Guest"), Some("192.168.1.13")));
    // Same VM seen again through its resource pool
    let again = s.vms["vm-14"].clone();
    s.vm("resgroup-1", again);
    s
}

fn sequential() -> ScanOptions {
    ScanOptions {
        timeout: Duration::from_secs(5),
        ..ScanOptions::default()
    }
}

fn names(set: &BTreeSet<String>) -> Vec<&str> {
    set.iter().map(String::as_str).collect()
}

#[tokio::test]
async fn test_end_to_end_list() {
    let session = lab();
    let report = scan(&session, &sequential()).await;

    assert!(report.warnings.is_empty());
    assert_eq!(
        serde_json::to_value(report.inventory.to_list(false)).unwrap(),
        json!({
            "vcenter": {"children": ["centos64Guest", "sles11_64Guest"]},
            "sles11_64Guest": {"hosts": ["192.168.1.13"]},
            "centos64Guest": {"hosts": ["192.168.1.14", "192.168.1.15"]}
        })
    );
}

#[tokio::test]
async fn test_host_mode_without_host_vars_is_empty() {
    let session = lab();
    let report = scan(&session, &sequential()).await;

    assert!(report.inventory.host_vars("192.168.1.14", false).is_empty());
    assert!(report.inventory.host_vars("10.1.1.1", false).is_empty());
}

#[tokio::test]
async fn test_host_mode_with_host_vars() {
    let session = lab();
    let report = scan(&session, &sequential()).await;

    let vars = report.inventory.host_vars("192.168.1.14", true);
    assert_eq!(vars["vm_name"], "vm-14-name");
    assert_eq!(vars["vm_power_state"], "poweredOn");
}

#[tokio::test]
async fn test_root_children_match_guest_types() {
    let mut session = lab();
    session.vm("group-d1", raw("vm-20", Some("windows9_64Guest"), None));
    session.vm("vm-folder", raw("vm-21", None, Some("10.0.0.21")));

    let report = scan(&session, &sequential()).await;
    let inventory = &report.inventory;

    assert_eq!(
        names(&inventory.root().children),
        vec!["centos64Guest", "sles11_64Guest", "unknown", "windows9_64Guest"]
    );
    assert!(inventory.group("windows9_64Guest").unwrap().hosts.is_empty());
    assert_eq!(
        names(&inventory.group("unknown").unwrap().hosts),
        vec!["10.0.0.21"]
    );
    assert!(
        report
            .warnings
            .iter()
            .all(|w| matches!(w, ScanWarning::Extraction { .. }))
    );
}

#[tokio::test]
async fn test_duplicate_addresses_collapse() {
    let mut session = lab();
    session.vm("linux", raw("vm-99", Some("centos64Guest"), Some("192.168.1.14")));

    let report = scan(&session, &sequential()).await;

    assert_eq!(
        names(&report.inventory.group("centos64Guest").unwrap().hosts),
        vec!["192.168.1.14", "192.168.1.15"]
    );
    assert_eq!(
        report.inventory.record_for("192.168.1.14").unwrap().id,
        "vm-99"
    );
}

#[tokio::test]
async fn test_partial_failure_keeps_other_subtrees() {
    let mut session = lab();
    session.broken.insert("linux".to_string());

    let report = scan(&session, &sequential()).await;

    assert!(report.is_partial());
    let centos = report.inventory.group("centos64Guest").unwrap();
    // vm-14 is still reachable through the resource pool
    assert_eq!(names(&centos.hosts), vec!["192.168.1.14"]);
    assert!(report.inventory.group("sles11_64Guest").is_some());
}

#[tokio::test]
async fn test_vanished_vm_is_skipped() {
    let mut session = lab();
    session.vms.remove("vm-13");

    let report = scan(&session, &sequential()).await;

    assert!(report.inventory.group("sles11_64Guest").is_none());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].is_traversal());
}

#[tokio::test]
async fn test_scan_is_idempotent() {
    let session = lab();
    let first = scan(&session, &sequential()).await;
    let second = scan(&session, &sequential()).await;

    assert_eq!(
        serde_json::to_string_pretty(&first.inventory.to_list(true)).unwrap(),
        serde_json::to_string_pretty(&second.inventory.to_list(true)).unwrap()
    );
}

#[tokio::test]
async fn test_parallel_scan_matches_sequential() {
    let mut session = lab();
    session.container("group-d1", ObjectKind::Datacenter, "dc-2");
    session.vm("dc-2", raw("vm-30", Some("ubuntu64Guest"), Some("10.2.0.30")));

    let seq = scan(&session, &sequential()).await;
    let par = scan(
        &session,
        &ScanOptions {
            workers: 4,
            ..sequential()
        },
    )
    .await;

    assert_eq!(seq.inventory.to_list(false), par.inventory.to_list(false));
}

#[tokio::test]
async fn test_custom_root_group() {
    let session = lab();
    let report = scan(
        &session,
        &ScanOptions {
            root_group: "vsphere".to_string(),
            ..sequential()
        },
    )
    .await;

    let list = serde_json::to_value(report.inventory.to_list(false)).unwrap();
    assert!(list.get("vcenter").is_none());
    assert_eq!(
        list["vsphere"]["children"],
        json!(["centos64Guest", "sles11_64Guest"])
    );
}
