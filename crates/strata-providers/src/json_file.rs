//! JSON document file provider.
//!
//! `open` parses the whole file into a `DataNode` tree; reads then descend
//! that tree in memory. `close` drops the parsed document. Worker-backed
//! variants for heavier formats implement the same trait; the tree never
//! sees the difference.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};

use strata_core::content::NodeContent;
use strata_core::path::NodePath;
use strata_core::provider::{ensure_owned, DataProvider, ProviderHandle};

use crate::memory::DataNode;

pub struct JsonFileProvider {
    root: NodePath,
    file: PathBuf,
    // The trait takes &self everywhere; the parsed document is the one
    // mutable bit of state, guarded for the pool thread.
    doc: Mutex<Option<DataNode>>,
}

impl JsonFileProvider {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            root: NodePath::fresh_root(),
            file: file.into(),
            doc: Mutex::new(None),
        }
    }

    pub fn handle(file: impl Into<PathBuf>) -> ProviderHandle {
        std::sync::Arc::new(Self::new(file))
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl DataProvider for JsonFileProvider {
    fn root_path(&self) -> &NodePath {
        &self.root
    }

    fn open(&self) -> Result<()> {
        let text = std::fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let doc: DataNode = serde_json::from_str(&text)
            .with_context(|| format!("unrecognized document format: {}", self.file.display()))?;
        *self.doc.lock().expect("document lock poisoned") = Some(doc);
        Ok(())
    }

    fn read(&self, path: &NodePath) -> Result<NodeContent> {
        ensure_owned(&self.root, path)?;
        let guard = self.doc.lock().expect("document lock poisoned");
        let doc = guard
            .as_ref()
            .with_context(|| format!("{} is not open", self.file.display()))?;
        Ok(doc.descend(path.segments())?.content())
    }

    fn export(&self, format: &str) -> Result<Vec<u8>> {
        if format != "json" {
            bail!("unsupported export format: {format}");
        }
        let guard = self.doc.lock().expect("document lock poisoned");
        let doc = guard
            .as_ref()
            .with_context(|| format!("{} is not open", self.file.display()))?;
        Ok(serde_json::to_vec_pretty(doc)?)
    }

    fn close(&self) -> Result<()> {
        let released = self.doc.lock().expect("document lock poisoned").take();
        if released.is_some() {
            log::debug!("released document {}", self.file.display());
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
