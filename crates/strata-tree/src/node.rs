//! One node of a materialized tree.
//!
//! A node is created when its parent expands (or when the container adds a
//! root) and immediately issues its content fetch, exactly once per
//! instance. Children exist only while the node is expanded; collapsing
//! discards the materialized subtree, and a later expand materializes fresh
//! instances. The per-instance id guards against a stale fetch resolving
//! after the node was discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;

use strata_core::content::NodeContent;
use strata_core::fetch::FetchCmd;
use strata_core::path::NodePath;
use strata_core::provider::ProviderHandle;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Content load state. `Loaded` and `Error` are terminal with respect to the
/// initial fetch; both allow expand/select as long as the content lists
/// children.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Loaded,
    Error(String),
}

/// How a fetch result was absorbed, so the container knows which event to
/// broadcast.
#[derive(Debug)]
pub enum ContentApplied {
    /// The initial fetch completed.
    FirstLoad,
    /// Content changed after the initial load (re-fetch).
    Updated,
    /// The fetch failed; placeholder content was synthesized.
    Failed(String),
}

pub struct TreeNode {
    /// Instance id, unique per materialization. Fetch results are correlated
    /// against it so results for discarded instances are dropped.
    pub id: u64,
    pub path: NodePath,
    pub state: LoadState,
    /// `None` only while loading; errors synthesize placeholder content so
    /// consumers always have a uniform shape.
    pub content: Option<NodeContent>,
    pub expanded: bool,
    pub selected: bool,
    /// Materialized children; non-empty only while expanded.
    pub children: Vec<TreeNode>,
    pub provider: ProviderHandle,
}

impl TreeNode {
    /// Materialize a node and issue its content fetch.
    pub fn attach(path: NodePath, provider: ProviderHandle, fetch: &Sender<FetchCmd>) -> Self {
        let node = Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            path,
            state: LoadState::Loading,
            content: None,
            expanded: false,
            selected: false,
            children: Vec::new(),
            provider,
        };
        node.request_content(fetch);
        node
    }

    fn request_content(&self, fetch: &Sender<FetchCmd>) {
        // A send failure means the pool is gone (shutdown); nothing to do.
        let _ = fetch.send(FetchCmd::Read {
            node: self.id,
            path: self.path.clone(),
            provider: self.provider.clone(),
        });
    }

    /// Re-fetch this node's content, keeping the same instance.
    pub fn refresh(&self, fetch: &Sender<FetchCmd>) {
        self.request_content(fetch);
    }

    /// Child segment names from the fetched content, if any.
    pub fn child_names(&self) -> &[String] {
        self.content.as_ref().map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    /// Expansion is defined only for nodes whose content lists children.
    pub fn can_expand(&self) -> bool {
        !self.child_names().is_empty()
    }

    /// The name rendered in the tree: fetched display name once available,
    /// the path's own segment name until then.
    pub fn display_name(&self) -> &str {
        match self.content.as_ref() {
            Some(content) if !content.display_name.is_empty() => &content.display_name,
            _ => self.path.display_name(),
        }
    }

    /// The payload carried by a selection broadcast: the content, or an
    /// empty placeholder while still loading.
    pub fn selection_payload(&self) -> NodeContent {
        self.content
            .clone()
            .unwrap_or_else(|| NodeContent::named(self.path.display_name()))
    }

    /// Materialize one child per content child name, in order. No-op when
    /// already expanded or childless. Returns whether anything changed.
    pub fn expand(&mut self, fetch: &Sender<FetchCmd>) -> bool {
        if self.expanded || !self.can_expand() {
            return false;
        }
        self.expanded = true;
        self.children = self
            .child_names()
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                TreeNode::attach(self.path.child(index, name), self.provider.clone(), fetch)
            })
            .collect();
        true
    }

    /// Discard the materialized subtree. Returns the paths of any nodes in
    /// it that were selected, so the caller can broadcast their deselection
    /// (the detach protocol). No-op when already collapsed.
    pub fn collapse(&mut self) -> Vec<NodePath> {
        if !self.expanded {
            return Vec::new();
        }
        self.expanded = false;
        let mut deselected = Vec::new();
        for child in &mut self.children {
            child.take_selected_paths(&mut deselected);
        }
        self.children.clear();
        deselected
    }

    /// Clear the selected flag throughout this subtree, collecting the paths
    /// that were selected.
    pub fn take_selected_paths(&mut self, out: &mut Vec<NodePath>) {
        if self.selected {
            self.selected = false;
            out.push(self.path.clone());
        }
        for child in &mut self.children {
            child.take_selected_paths(out);
        }
    }

    /// Absorb a fetch result. Failures synthesize placeholder content with a
    /// single `"Error"` parameter so panels degrade gracefully.
    pub fn apply_content(&mut self, result: Result<NodeContent, String>) -> ContentApplied {
        match result {
            Ok(content) => {
                let first = matches!(self.state, LoadState::Loading);
                self.state = LoadState::Loaded;
                self.content = Some(content);
                if first {
                    ContentApplied::FirstLoad
                } else {
                    ContentApplied::Updated
                }
            }
            Err(cause) => {
                let message = format!("Error reading node: {}. {}", self.path, cause);
                self.state = LoadState::Error(message.clone());
                self.content = Some(NodeContent::error_placeholder(
                    self.path.display_name(),
                    &message,
                ));
                ContentApplied::Failed(message)
            }
        }
    }
}

// ── Subtree lookups ──────────────────────────────────────────────────

/// Find the node with the given path among `nodes` and their materialized
/// descendants.
pub fn find_node<'a>(nodes: &'a [TreeNode], path: &NodePath) -> Option<&'a TreeNode> {
    for node in nodes {
        if !path.has_prefix(&node.path) {
            continue;
        }
        if node.path == *path {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, path) {
            return Some(found);
        }
    }
    None
}

pub fn find_node_mut<'a>(nodes: &'a mut [TreeNode], path: &NodePath) -> Option<&'a mut TreeNode> {
    for node in nodes {
        if !path.has_prefix(&node.path) {
            continue;
        }
        if node.path == *path {
            return Some(node);
        }
        if let Some(found) = find_node_mut(&mut node.children, path) {
            return Some(found);
        }
    }
    None
}

/// Find a node by instance id. Used to apply fetch results; returns `None`
/// for results whose instance has been discarded.
pub fn find_node_by_id(nodes: &mut [TreeNode], id: u64) -> Option<&mut TreeNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node_by_id(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use strata_providers::{DataNode, MemoryProvider};

    fn provider_with_children(names: &[&str]) -> ProviderHandle {
        let doc = DataNode::named("root").with_children(
            names.iter().map(|n| DataNode::named(*n)).collect(),
        );
        MemoryProvider::handle(doc)
    }

    fn loaded_root(names: &[&str]) -> (TreeNode, mpsc::Receiver<FetchCmd>) {
        let (tx, rx) = mpsc::channel();
        let provider = provider_with_children(names);
        let path = provider.root_path().clone();
        let mut node = TreeNode::attach(path, provider, &tx);
        let mut content = NodeContent::named("root");
        content.children = names.iter().map(|n| n.to_string()).collect();
        node.apply_content(Ok(content));
        (node, rx)
    }

    #[test]
    fn test_attach_issues_exactly_one_fetch() {
        let (tx, rx) = mpsc::channel();
        let provider = provider_with_children(&[]);
        let path = provider.root_path().clone();
        let node = TreeNode::attach(path.clone(), provider, &tx);

        match rx.try_recv().unwrap() {
            FetchCmd::Read {
                node: id,
                path: requested,
                ..
            } => {
                assert_eq!(id, node.id);
                assert_eq!(requested, path);
            }
            _ => panic!("expected a read command"),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(node.state, LoadState::Loading);
        assert!(node.content.is_none());
    }

    #[test]
    fn test_expand_materializes_indexed_children() {
        let (mut node, rx) = loaded_root(&["alpha", "beta"]);
        // Drain the root's own fetch command.
        while rx.try_recv().is_ok() {}

        let (tx, _keep) = mpsc::channel();
        assert!(node.expand(&tx));
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].path, node.path.child(0, "alpha"));
        assert_eq!(node.children[1].path, node.path.child(1, "beta"));
        // Expanding again is a no-op.
        assert!(!node.expand(&tx));
    }

    #[test]
    fn test_expand_childless_is_noop() {
        let (mut node, _rx) = loaded_root(&[]);
        let (tx, _tx_rx) = mpsc::channel();
        assert!(!node.expand(&tx));
        assert!(!node.expanded);
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_collapse_discards_and_reports_selected() {
        let (mut node, rx) = loaded_root(&["alpha", "beta"]);
        let (tx, _keep) = mpsc::channel();
        node.expand(&tx);
        node.children[1].selected = true;
        drop(rx);

        let deselected = node.collapse();
        assert_eq!(deselected, vec![node.path.child(1, "beta")]);
        assert!(node.children.is_empty());
        assert!(!node.expanded);
        // Collapsing again reports nothing.
        assert!(node.collapse().is_empty());
    }

    #[test]
    fn test_fresh_instances_after_reexpand() {
        let (mut node, _rx) = loaded_root(&["alpha"]);
        let (tx, _keep) = mpsc::channel();
        node.expand(&tx);
        let first_id = node.children[0].id;
        node.collapse();
        node.expand(&tx);
        assert_ne!(node.children[0].id, first_id);
        assert_eq!(node.children[0].state, LoadState::Loading);
    }

    #[test]
    fn test_apply_failure_synthesizes_placeholder() {
        let (tx, _rx) = mpsc::channel();
        let provider = provider_with_children(&[]);
        let path = provider.root_path().clone();
        let mut node = TreeNode::attach(path.clone(), provider, &tx);

        let applied = node.apply_content(Err("boom".to_string()));
        let expected = format!("Error reading node: {path}. boom");
        match applied {
            ContentApplied::Failed(message) => assert_eq!(message, expected),
            _ => panic!("expected a failure"),
        }
        assert_eq!(node.state, LoadState::Error(expected.clone()));
        let content = node.content.as_ref().unwrap();
        assert_eq!(content.parameters.len(), 1);
        assert_eq!(content.parameters[0].key, "Error");
        assert_eq!(content.parameters[0].value.to_string(), expected);
        // The node stays navigable but not expandable.
        assert!(!node.can_expand());
    }

    #[test]
    fn test_first_load_then_update() {
        let (mut node, _rx) = loaded_root(&[]);
        // loaded_root applied the first result already.
        match node.apply_content(Ok(NodeContent::named("root"))) {
            ContentApplied::Updated => {}
            _ => panic!("expected an update"),
        }
    }
}
