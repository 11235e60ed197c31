//! Session lifecycle and output

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};
use vcinv_client::{RestSession, SessionError, VcenterSession};
use vcinv_inventory::{ScanReport, scan};

use crate::config::Config;

/// What to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Full inventory (`--list`)
    List,
    /// Variables of one host (`--host <address>`)
    Host(String),
}

/// Fatal errors; nothing is written to stdout when one occurs
#[derive(Error, Debug)]
pub enum AppError {
    /// Session could not be established
    #[error("failed to connect to management server: {0}")]
    Connection(#[source] SessionError),

    /// Output could not be encoded
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    /// Output could not be written
    #[error("failed to write output: {0}")]
    Write(#[from] std::io::Error),
}

/// Opens sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// Authenticate against the server named in `config`
    async fn connect(&self, config: &Config) -> Result<Arc<dyn VcenterSession>, SessionError>;
}

/// Connector for the vCenter REST API
#[derive(Debug, Clone, Default)]
pub struct RestConnector;

#[async_trait]
impl Connector for RestConnector {
    async fn connect(&self, config: &Config) -> Result<Arc<dyn VcenterSession>, SessionError> {
        let session = RestSession::connect(&config.session_options()).await?;
        Ok(Arc::new(session))
    }
}

/// Connect, scan, and always log out once connected
///
/// # Errors
/// Returns [`AppError::Connection`] if the session cannot be established.
#[instrument(skip_all, fields(server = %config.server))]
pub async fn scan_scoped(
    config: &Config,
    connector: &dyn Connector,
) -> Result<ScanReport, AppError> {
    let session = connector
        .connect(config)
        .await
        .map_err(AppError::Connection)?;

    let report = scan(session.as_ref(), &config.scan_options()).await;

    if let Err(e) = session.logout().await {
        warn!(error = %e, "logout failed");
    }

    if report.is_partial() {
        warn!(
            warnings = report.warnings.len(),
            "inventory is incomplete, some containers could not be read"
        );
    }
    Ok(report)
}

/// Produce the JSON document for `mode` and write it to `out`
///
/// The document is rendered completely before anything is written, so a
/// failure never leaves half a document on stdout.
///
/// # Errors
/// Returns an error if connecting fails or the output cannot be written.
pub async fn run(
    mode: &Mode,
    config: &Config,
    connector: &dyn Connector,
    out: &mut dyn Write,
) -> Result<(), AppError> {
    let document = match mode {
        Mode::Host(address) if !config.host_vars => {
            info!(host = %address, "host variables disabled");
            serde_json::to_string_pretty(&serde_json::Map::new())?
        }
        Mode::Host(address) => {
            let report = scan_scoped(config, connector).await?;
            serde_json::to_string_pretty(&report.inventory.host_vars(address, true))?
        }
        Mode::List => {
            let report = scan_scoped(config, connector).await?;
            serde_json::to_string_pretty(&report.inventory.to_list(config.host_vars))?
        }
    };

    writeln!(out, "{document}")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use serde_json::{Value, json};
    use vcinv_client::{ManagedObject, ObjectKind, ObjectRef, RawVm};

    use super::*;
    use crate::config::Format;

    struct LabSession {
        logged_out: Arc<AtomicBool>,
        /// Fail every listing below the root folder
        broken: bool,
    }

    fn vm(id: &str, guest: &str, ip: &str) -> RawVm {
        RawVm::new(id)
            .with("name", id)
            .with("guest.guestId", guest)
            .with("guest.ipAddress", ip)
            .with("runtime.powerState", "poweredOn")
    }

    #[async_trait]
    impl VcenterSession for LabSession {
        async fn root(&self) -> vcinv_client::Result<ObjectRef> {
            Ok(ObjectRef::folder("group-d1"))
        }

        async fn children(&self, container: &ObjectRef) -> vcinv_client::Result<Vec<ManagedObject>> {
            if self.broken && container.id != "group-d1" {
                return Err(SessionError::Api {
                    status: 500,
                    message: "internal server error".to_string(),
                });
            }
            Ok(match container.id.as_str() {
                "group-d1" => vec![ManagedObject::new(
                    ObjectRef::new(ObjectKind::Datacenter, "dc-1"),
                    "Lab",
                )],
                "dc-1" => ["vm-13", "vm-14", "vm-15"]
                    .into_iter()
                    .map(|id| ManagedObject::new(ObjectRef::vm(id), id))
                    .collect(),
                _ => Vec::new(),
            })
        }

        async fn fetch_vm(&self, object: &ObjectRef) -> vcinv_client::Result<RawVm> {
            Ok(match object.id.as_str() {
                "vm-13" => vm("vm-13", "sles11_64Guest", "192.168.1.13"),
                "vm-14" => vm("vm-14", "centos64Guest", "192.168.1.14"),
                _ => vm("vm-15", "centos64Guest", "192.168.1.15"),
            })
        }

        async fn logout(&self) -> vcinv_client::Result<()> {
            self.logged_out.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockConnector {
        refuse: bool,
        broken_walk: bool,
        connects: AtomicUsize,
        logged_out: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(
            &self,
            _config: &Config,
        ) -> Result<Arc<dyn VcenterSession>, SessionError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(SessionError::Authentication("bad password".to_string()));
            }
            Ok(Arc::new(LabSession {
                logged_out: Arc::clone(&self.logged_out),
                broken: self.broken_walk,
            }))
        }
    }

    fn config(host_vars: bool) -> Config {
        let content = format!(
            "server = \"vc\"\nusername = \"u\"\npassword = \"p\"\nhost_vars = {host_vars}"
        );
        Config::parse(&content, Format::Toml, Path::new("test.toml")).unwrap()
    }

    async fn run_to_string(
        mode: Mode,
        config: &Config,
        connector: &MockConnector,
    ) -> (Result<(), AppError>, String) {
        let mut out = Vec::new();
        let result = run(&mode, config, connector, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_list_output() {
        let connector = MockConnector::default();
        let (result, out) = run_to_string(Mode::List, &config(false), &connector).await;

        result.unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value,
            json!({
                "vcenter": {"children": ["centos64Guest", "sles11_64Guest"]},
                "sles11_64Guest": {"hosts": ["192.168.1.13"]},
                "centos64Guest": {"hosts": ["192.168.1.14", "192.168.1.15"]}
            })
        );
        assert!(connector.logged_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_walk_still_logs_out() {
        let connector = MockConnector {
            broken_walk: true,
            ..MockConnector::default()
        };
        let (result, out) = run_to_string(Mode::List, &config(false), &connector).await;

        result.unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!({"vcenter": {"children": []}}));
        assert!(connector.logged_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_connection_failure_writes_nothing() {
        let connector = MockConnector {
            refuse: true,
            ..MockConnector::default()
        };
        let (result, out) = run_to_string(Mode::List, &config(false), &connector).await;

        assert!(matches!(result, Err(AppError::Connection(_))));
        assert!(out.is_empty());
        assert!(!connector.logged_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_host_without_host_vars_is_empty_object() {
        let connector = MockConnector::default();
        let (result, out) = run_to_string(
            Mode::Host("192.168.1.14".to_string()),
            &config(false),
            &connector,
        )
        .await;

        result.unwrap();
        assert_eq!(serde_json::from_str::<Value>(&out).unwrap(), json!({}));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_host_with_host_vars() {
        let connector = MockConnector::default();
        let config = config(true);

        let (result, out) =
            run_to_string(Mode::Host("192.168.1.13".to_string()), &config, &connector).await;
        result.unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["vm_name"], "vm-13");
        assert_eq!(value["vm_guest_guestId"], "sles11_64Guest");
        assert!(connector.logged_out.load(Ordering::SeqCst));

        let (result, out) =
            run_to_string(Mode::Host("10.9.9.9".to_string()), &config, &connector).await;
        result.unwrap();
        assert_eq!(serde_json::from_str::<Value>(&out).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_list_with_host_vars_has_meta() {
        let connector = MockConnector::default();
        let (result, out) = run_to_string(Mode::List, &config(true), &connector).await;

        result.unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value["_meta"]["hostvars"]["192.168.1.15"]["vm_name"],
            "vm-15"
        );
    }
}
