//! Non-fatal scan diagnostics

use std::fmt;

use thiserror::Error;

/// Something that degraded the scan result without aborting it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanWarning {
    /// A container (or VM) could not be read; its subtree is missing
    #[error("skipped {object}: {reason}")]
    Traversal {
        /// Object the session failed on
        object: String,
        /// Error reported by the session
        reason: String,
    },

    /// A VM was read but lacks guest or network data
    #[error("vm {vm}: {reason}")]
    Extraction {
        /// VM name
        vm: String,
        /// What was missing
        reason: String,
    },
}

impl ScanWarning {
    /// Create a traversal warning
    pub fn traversal(object: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Traversal {
            object: object.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an extraction warning
    pub fn extraction(vm: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            vm: vm.into(),
            reason: reason.into(),
        }
    }

    /// Check if the warning means part of the tree was not visited
    #[must_use]
    pub fn is_traversal(&self) -> bool {
        matches!(self, ScanWarning::Traversal { .. })
    }
}
