//! Session trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ManagedObject, ObjectRef, RawVm};

/// Authenticated connection to a management server
///
/// The walker only ever asks three things of a session: where the tree starts,
/// what a container holds, and the fixed property set of one VM.
#[async_trait]
pub trait VcenterSession: Send + Sync {
    /// Reference to the inventory root folder
    async fn root(&self) -> Result<ObjectRef>;

    /// Direct children of a container
    async fn children(&self, container: &ObjectRef) -> Result<Vec<ManagedObject>>;

    /// Fetch [`crate::VM_PROPERTIES`] for one virtual machine
    async fn fetch_vm(&self, vm: &ObjectRef) -> Result<RawVm>;

    /// Release the server-side session
    async fn logout(&self) -> Result<()>;

    /// Number of server round trips [`Self::children`] or [`Self::fetch_vm`]
    /// makes for `object`
    ///
    /// Callers that bound a whole call with a timeout scale it by this count.
    fn round_trips(&self, _object: &ObjectRef) -> u32 {
        1
    }
}
