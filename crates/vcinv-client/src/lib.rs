//! vcinv-client: vCenter session abstraction
//!
//! Provides the [`VcenterSession`] trait the inventory walker talks to, the raw
//! object model it returns, and a REST implementation backed by the vSphere
//! Automation API.
//!
//! # Example
//!
//! ```no_run
//! use vcinv_client::{RestSession, SessionOptions, VcenterSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = SessionOptions::new("vcenter.lab.local", "inventory@vsphere.local", "secret");
//! let session = RestSession::connect(&options).await?;
//!
//! let root = session.root().await?;
//! for child in session.children(&root).await? {
//!     println!("{} ({})", child.name, child.object.kind);
//! }
//!
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod guest;
pub mod rest;
pub mod traits;
pub mod types;

pub use error::{Result, SessionError};
pub use guest::vim_guest_id;
pub use rest::{RestSession, SessionOptions};
pub use traits::VcenterSession;
pub use types::{ManagedObject, ObjectKind, ObjectRef, RawVm, VM_PROPERTIES};
