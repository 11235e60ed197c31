//! vSphere Automation REST session

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Result, SessionError};
use crate::guest::vim_guest_id;
use crate::traits::VcenterSession;
use crate::types::{ManagedObject, ObjectKind, ObjectRef, RawVm};

/// Header carrying the session token
const SESSION_HEADER: &str = "vmware-api-session-id";

/// Requests issued by [`RestSession::fetch_vm`]: info, identity, interfaces, tools
const VM_REQUESTS: u32 = 4;

/// Managed object id of the inventory root folder
pub const ROOT_FOLDER: &str = "group-d1";

/// Connection settings for [`RestSession`]
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// vCenter hostname or address
    pub server: String,
    /// HTTPS port
    pub port: u16,
    /// SSO user
    pub username: String,
    /// SSO password
    pub password: String,
    /// Verify the server certificate
    pub verify_tls: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl SessionOptions {
    /// Create options with default port, TLS verification and timeout
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: 443,
            username: username.into(),
            password: password.into(),
            verify_tls: true,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set HTTPS port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable or disable certificate verification
    #[must_use]
    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    /// Set per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL of the API endpoint
    ///
    /// # Errors
    /// Returns an error if server and port do not form a valid URL.
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!("https://{}:{}/", self.server, self.port))?)
    }
}

/// Session against the vCenter REST API (`/api`, vSphere 7.0+)
#[derive(Debug)]
pub struct RestSession {
    client: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl RestSession {
    /// Authenticate and open a new session
    ///
    /// # Errors
    /// Returns [`SessionError::Authentication`] if the credentials are rejected,
    /// or another error if the server cannot be reached.
    #[instrument(skip(options), fields(server = %options.server, port = options.port))]
    pub async fn connect(options: &SessionOptions) -> Result<Self> {
        if !options.verify_tls {
            warn!("TLS certificate verification disabled");
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(!options.verify_tls)
            .timeout(options.timeout)
            .build()?;
        let base_url = options.base_url()?;

        let response = client
            .post(base_url.join("api/session")?)
            .basic_auth(&options.username, Some(&options.password))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SessionError::Authentication(format!(
                "server rejected credentials for {}",
                options.username
            )));
        }
        let token: String = check_status(response).await?.json().await?;

        info!("session established");

        Ok(Self {
            client,
            base_url,
            token: RwLock::new(Some(token)),
        })
    }

    /// Build a full URL from a path and query filters
    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Build an authenticated request
    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let token = self.token.read().await;
        let token = token.as_deref().ok_or(SessionError::NotConnected)?;
        Ok(self
            .client
            .request(method, url)
            .header(SESSION_HEADER, token))
    }

    /// Perform a GET request and return the JSON body
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(path, query)?;
        debug!(url = %url, "GET");
        let response = self.request(Method::GET, url).await?.send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Like [`Self::get`], but maps "temporarily unavailable" to `None`
    async fn get_optional(&self, path: &str) -> Result<Option<Value>> {
        let value = unavailable_as_none(self.get(path, &[]).await)?;
        if value.is_none() {
            debug!(path, "guest data unavailable");
        }
        Ok(value)
    }

    /// List one resource type and convert the summaries
    async fn list(
        &self,
        path: &str,
        query: &[(&str, &str)],
        kind: ObjectKind,
    ) -> Result<Vec<ManagedObject>> {
        let body = self.get(path, query).await?;
        summaries(&body, kind)
    }
}

#[async_trait]
impl VcenterSession for RestSession {
    async fn root(&self) -> Result<ObjectRef> {
        if self.token.read().await.is_none() {
            return Err(SessionError::NotConnected);
        }
        Ok(ObjectRef::folder(ROOT_FOLDER))
    }

    #[instrument(skip_all, fields(container = %container))]
    async fn children(&self, container: &ObjectRef) -> Result<Vec<ManagedObject>> {
        let mut children = Vec::new();
        for query in child_queries(container) {
            children.extend(self.list(query.path, &query.filter, query.kind).await?);
        }

        debug!(count = children.len(), "listed container");
        Ok(children)
    }

    #[instrument(skip_all, fields(vm = %vm.id))]
    async fn fetch_vm(&self, vm: &ObjectRef) -> Result<RawVm> {
        let base = format!("api/vcenter/vm/{}", vm.id);

        let info = self.get(&base, &[]).await?;
        let identity = self.get_optional(&format!("{base}/guest/identity")).await?;
        let interfaces = self
            .get_optional(&format!("{base}/guest/networking/interfaces"))
            .await?;
        let tools = self.get_optional(&format!("{base}/tools")).await?;

        Ok(raw_vm(
            &vm.id,
            &info,
            identity.as_ref(),
            interfaces.as_ref(),
            tools.as_ref(),
        ))
    }

    fn round_trips(&self, object: &ObjectRef) -> u32 {
        match object.kind {
            ObjectKind::VirtualMachine => VM_REQUESTS,
            _ => u32::try_from(child_queries(object).len()).unwrap_or(u32::MAX),
        }
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<()> {
        let url = self.url("api/session", &[])?;
        let request = self.request(Method::DELETE, url).await?;
        let response = request.send().await?;
        self.token.write().await.take();
        check_status(response).await?;
        info!("session released");
        Ok(())
    }
}

/// Turn a non-success response into [`SessionError::Api`]
async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(SessionError::Api { status, message })
}

/// Map "temporarily unavailable" to `None`, keep every other error
fn unavailable_as_none(result: Result<Value>) -> Result<Option<Value>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_unavailable() => Ok(None),
        Err(e) => Err(e),
    }
}

/// One list call contributing to a container's children
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChildQuery<'a> {
    path: &'static str,
    filter: Vec<(&'static str, &'a str)>,
    kind: ObjectKind,
}

impl<'a> ChildQuery<'a> {
    fn new(path: &'static str, filter: Vec<(&'static str, &'a str)>, kind: ObjectKind) -> Self {
        Self { path, filter, kind }
    }
}

/// List calls that together enumerate the children of `container`
///
/// A datacenter yields its VM folders and clusters, a cluster its resource
/// pools and VMs. The views overlap; the walker deduplicates them.
fn child_queries(container: &ObjectRef) -> Vec<ChildQuery<'_>> {
    let id = container.id.as_str();
    match container.kind {
        ObjectKind::Folder => vec![
            ChildQuery::new("api/vcenter/folder", vec![("parent_folders", id)], ObjectKind::Folder),
            ChildQuery::new("api/vcenter/datacenter", vec![("folders", id)], ObjectKind::Datacenter),
            ChildQuery::new("api/vcenter/cluster", vec![("folders", id)], ObjectKind::Cluster),
            ChildQuery::new("api/vcenter/vm", vec![("folders", id)], ObjectKind::VirtualMachine),
        ],
        ObjectKind::Datacenter => vec![
            ChildQuery::new(
                "api/vcenter/folder",
                vec![("datacenters", id), ("type", "VIRTUAL_MACHINE")],
                ObjectKind::Folder,
            ),
            ChildQuery::new("api/vcenter/cluster", vec![("datacenters", id)], ObjectKind::Cluster),
        ],
        ObjectKind::Cluster => vec![
            ChildQuery::new(
                "api/vcenter/resource-pool",
                vec![("clusters", id)],
                ObjectKind::ResourcePool,
            ),
            ChildQuery::new("api/vcenter/vm", vec![("clusters", id)], ObjectKind::VirtualMachine),
        ],
        ObjectKind::ResourcePool => vec![
            ChildQuery::new(
                "api/vcenter/resource-pool",
                vec![("parent_resource_pools", id)],
                ObjectKind::ResourcePool,
            ),
            ChildQuery::new(
                "api/vcenter/vm",
                vec![("resource_pools", id)],
                ObjectKind::VirtualMachine,
            ),
        ],
        ObjectKind::VirtualMachine => Vec::new(),
    }
}

/// Id field carried by list summaries of each object kind
fn id_field(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Folder => "folder",
        ObjectKind::Datacenter => "datacenter",
        ObjectKind::Cluster => "cluster",
        ObjectKind::ResourcePool => "resource_pool",
        ObjectKind::VirtualMachine => "vm",
    }
}

/// Convert a list response (`[{"vm": "vm-42", "name": ...}, ...]`) to managed objects
fn summaries(body: &Value, kind: ObjectKind) -> Result<Vec<ManagedObject>> {
    let field = id_field(kind);
    let items = body
        .as_array()
        .ok_or_else(|| SessionError::InvalidResponse(format!("expected {kind} list")))?;

    items
        .iter()
        .map(|item| {
            let id = item.get(field).and_then(Value::as_str).ok_or_else(|| {
                SessionError::InvalidResponse(format!("{kind} summary without `{field}`"))
            })?;
            let name = item.get("name").and_then(Value::as_str).unwrap_or(id);
            Ok(ManagedObject::new(ObjectRef::new(kind, id), name))
        })
        .collect()
}

/// Map the REST power state enum onto the vim property values
fn power_state(value: &str) -> &str {
    match value {
        "POWERED_ON" => "poweredOn",
        "POWERED_OFF" => "poweredOff",
        "SUSPENDED" => "suspended",
        other => other,
    }
}

/// Map the REST tools run state onto `(toolsStatus, toolsRunningStatus)`
fn tools_status(run_state: &str) -> Option<(&'static str, &'static str)> {
    match run_state {
        "RUNNING" => Some(("toolsOk", "guestToolsRunning")),
        "NOT_RUNNING" => Some(("toolsNotRunning", "guestToolsNotRunning")),
        "NOT_INSTALLED" => Some(("toolsNotInstalled", "guestToolsNotRunning")),
        _ => None,
    }
}

/// Assemble the property bag from the individual REST resources
fn raw_vm(
    id: &str,
    info: &Value,
    identity: Option<&Value>,
    interfaces: Option<&Value>,
    tools: Option<&Value>,
) -> RawVm {
    let mut vm = RawVm::new(id);

    if let Some(name) = info.get("name").and_then(Value::as_str) {
        vm.set("name", name);
    }
    if let Some(state) = info.get("power_state").and_then(Value::as_str) {
        vm.set("runtime.powerState", power_state(state));
    }

    if let Some(identity) = identity {
        if let Some(guest_id) = identity.get("name").and_then(Value::as_str) {
            vm.set("guest.guestId", vim_guest_id(guest_id));
        }
        if let Some(full_name) = identity
            .pointer("/full_name/default_message")
            .and_then(Value::as_str)
        {
            vm.set("guest.guestFullName", full_name);
        }
        if let Some(host_name) = identity.get("host_name").and_then(Value::as_str) {
            vm.set("guest.hostName", host_name);
        }
        if let Some(ip) = identity.get("ip_address").and_then(Value::as_str) {
            vm.set("guest.ipAddress", ip);
        }
    }

    if let Some(interfaces) = interfaces.and_then(Value::as_array) {
        let nics: Vec<Value> = interfaces
            .iter()
            .map(|nic| {
                let addresses: Vec<&str> = nic
                    .pointer("/ip/ip_addresses")
                    .and_then(Value::as_array)
                    .map(|addrs| {
                        addrs
                            .iter()
                            .filter_map(|a| a.get("ip_address").and_then(Value::as_str))
                            .collect()
                    })
                    .unwrap_or_default();
                json!({
                    "macAddress": nic.get("mac_address").cloned().unwrap_or(Value::Null),
                    "ipAddress": addresses,
                })
            })
            .collect();
        vm.set("guest.net", nics);
    }

    if let Some((status, running)) = tools
        .and_then(|t| t.get("run_state"))
        .and_then(Value::as_str)
        .and_then(tools_status)
    {
        vm.set("guest.toolsStatus", status);
        vm.set("guest.toolsRunningStatus", running);
    }

    vm
}
