//! In-memory document provider.
//!
//! Holds a whole document tree in memory and serves node content by
//! descending indexed segments. This is the provider used by tests, demo
//! seeds, and the JSON-file provider once a document is parsed.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use strata_core::content::{NodeContent, Parameter, Sample, TableData};
use strata_core::path::{NodePath, Segment};
use strata_core::provider::{ensure_owned, DataProvider, ProviderHandle};

// ── Document model ───────────────────────────────────────────────────

/// One node of an in-memory document. The serde shape doubles as the JSON
/// document format accepted by `JsonFileProvider`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataNode {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub table: TableData,
    #[serde(default)]
    pub children: Vec<DataNode>,
}

impl DataNode {
    /// A node with just a name. Handy for building test documents.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_children(mut self, children: Vec<DataNode>) -> Self {
        self.children = children;
        self
    }

    /// Walk the document by indexed segments, verifying each segment's name
    /// still matches the child at that index.
    pub fn descend(&self, segments: &[Segment]) -> Result<&DataNode> {
        let mut node = self;
        for segment in segments {
            let child = node.children.get(segment.index).with_context(|| {
                format!("no child at index {} under {:?}", segment.index, node.name)
            })?;
            if child.name != segment.name {
                bail!(
                    "child {} under {:?} is named {:?}, not {:?}",
                    segment.index,
                    node.name,
                    child.name,
                    segment.name
                );
            }
            node = child;
        }
        Ok(node)
    }

    /// Project this node into the content shape the tree consumes: children
    /// become segment display names, not full paths.
    pub fn content(&self) -> NodeContent {
        NodeContent {
            display_name: self.name.clone(),
            parameters: self.parameters.clone(),
            samples: self.samples.clone(),
            metadata: self.metadata.clone(),
            table: self.table.clone(),
            children: self.children.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

// ── Provider ─────────────────────────────────────────────────────────

/// Provider over an in-memory `DataNode` document.
pub struct MemoryProvider {
    root: NodePath,
    doc: DataNode,
}

impl MemoryProvider {
    /// Wrap a document under a freshly generated root locator.
    pub fn new(doc: DataNode) -> Self {
        Self {
            root: NodePath::fresh_root(),
            doc,
        }
    }

    pub fn handle(doc: DataNode) -> ProviderHandle {
        std::sync::Arc::new(Self::new(doc))
    }
}

impl DataProvider for MemoryProvider {
    fn root_path(&self) -> &NodePath {
        &self.root
    }

    fn open(&self) -> Result<()> {
        Ok(())
    }

    fn read(&self, path: &NodePath) -> Result<NodeContent> {
        ensure_owned(&self.root, path)?;
        Ok(self.doc.descend(path.segments())?.content())
    }

    fn export(&self, format: &str) -> Result<Vec<u8>> {
        if format != "json" {
            bail!("unsupported export format: {format}");
        }
        Ok(serde_json::to_vec_pretty(&self.doc)?)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::content::ParamValue;

    fn demo_doc() -> DataNode {
        let mut scan = DataNode::named("scan-1");
        scan.parameters.push(Parameter {
            key: "exposure".to_string(),
            value: ParamValue::Number(0.25),
        });
        DataNode::named("experiment").with_children(vec![
            scan,
            DataNode::named("scan-2")
                .with_children(vec![DataNode::named("detector"), DataNode::named("motor")]),
        ])
    }

    #[test]
    fn test_read_root_lists_children() {
        let provider = MemoryProvider::new(demo_doc());
        let content = provider.read(provider.root_path()).unwrap();
        assert_eq!(content.display_name, "experiment");
        assert_eq!(content.children, vec!["scan-1", "scan-2"]);
    }

    #[test]
    fn test_read_nested_child() {
        let provider = MemoryProvider::new(demo_doc());
        let path = provider.root_path().child(1, "scan-2").child(0, "detector");
        let content = provider.read(&path).unwrap();
        assert_eq!(content.display_name, "detector");
        assert!(content.children.is_empty());
    }

    #[test]
    fn test_read_rejects_foreign_root() {
        let provider = MemoryProvider::new(demo_doc());
        let foreign = NodePath::root("someone-else").child(0, "scan-1");
        assert!(provider.read(&foreign).is_err());
    }

    #[test]
    fn test_read_rejects_name_mismatch() {
        let provider = MemoryProvider::new(demo_doc());
        let wrong_name = provider.root_path().child(0, "scan-2");
        let err = provider.read(&wrong_name).unwrap_err().to_string();
        assert!(err.contains("named"), "unexpected error: {err}");

        let out_of_range = provider.root_path().child(9, "scan-1");
        assert!(provider.read(&out_of_range).is_err());
    }

    #[test]
    fn test_export_json() {
        let provider = MemoryProvider::new(demo_doc());
        let bytes = provider.export("json").unwrap();
        let back: DataNode = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.name, "experiment");
        assert_eq!(back.children.len(), 2);

        assert!(provider.export("parquet").is_err());
    }
}
