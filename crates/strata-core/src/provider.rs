//! The data-provider seam.
//!
//! A provider owns one opened resource and serves node content for paths
//! under its root. The tree engine only ever talks to this trait; whether a
//! call stays in-process or crosses the fetch-pool thread is not its
//! concern. Each root tree node owns exactly one provider handle, and only
//! the removal of that root may close it.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::content::NodeContent;
use crate::path::NodePath;

/// Capability set implemented by every provider variant.
pub trait DataProvider: Send + Sync {
    /// The root path this provider serves. Fixed for the provider's lifetime.
    fn root_path(&self) -> &NodePath;

    /// Acquire the underlying resource (parse the document, mount the file).
    /// Fails on unrecognized or unreadable input; the caller decides whether
    /// a root is added at all.
    fn open(&self) -> Result<()>;

    /// Read the content behind `path`. Must reject paths outside this
    /// provider's root prefix.
    fn read(&self, path: &NodePath) -> Result<NodeContent>;

    /// Export the opened resource in the given format (e.g. `"json"`).
    fn export(&self, format: &str) -> Result<Vec<u8>>;

    /// Release the underlying resource. Best-effort: callers log failures
    /// instead of propagating them out of a remove operation.
    fn close(&self) -> Result<()>;
}

/// Shared handle to a provider; clones refer to the same opened resource.
pub type ProviderHandle = Arc<dyn DataProvider>;

/// Guard for `read` implementations: reject paths from another tree.
pub fn ensure_owned(root: &NodePath, path: &NodePath) -> Result<()> {
    if !path.has_prefix(root) {
        bail!("path {path} does not belong to the tree rooted at {root}");
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────
