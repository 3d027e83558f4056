//! The tree container: owns the root list, reconciles it against the
//! desired set of opened documents, applies fetch results, and implements
//! keyboard navigation over the materialized (visible) nodes.
//!
//! Selection is kept globally unique by a broadcast protocol, not a shared
//! variable: selecting a node sets its flag and dispatches `node-selected`
//! on the shared channel; every container observes the event and deselects
//! its own nodes whose path differs, broadcasting `node-deselected` for
//! each. The container's own "currently selected path" bookkeeping is fed
//! purely by those observations, so any number of containers on the same
//! channel stay consistent without referencing each other.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::Sender;

use strata_core::channel::{
    EventChannel, EventDetail, ListenerHandle, EVENT_ERROR, EVENT_WARNING, NODE_DATA_UPDATED,
    NODE_DESELECTED, NODE_SELECTED,
};
use strata_core::fetch::{FetchCmd, FetchOutcome};
use strata_core::path::NodePath;
use strata_core::provider::ProviderHandle;

use crate::node::{
    find_node, find_node_by_id, find_node_mut, ContentApplied, LoadState, TreeNode,
};

// ── Flat projection ──────────────────────────────────────────────────

/// One visible line of the tree, in depth-first order.
#[derive(Debug, Clone)]
pub struct TreeRow {
    pub path: NodePath,
    pub depth: usize,
    pub name: String,
    pub expanded: bool,
    pub has_children: bool,
    pub selected: bool,
    pub loading: bool,
    pub error: Option<String>,
    /// For each depth level 0..depth, whether a vertical guide line should
    /// be drawn (the ancestor at that depth has more siblings below).
    pub guide_depths: Vec<bool>,
}

// ── TreeContainer ────────────────────────────────────────────────────

struct Inner {
    /// The documents that should be shown, in open order.
    desired: Vec<ProviderHandle>,
    /// Materialized root nodes, reconciled against `desired`.
    roots: Vec<TreeNode>,
    /// Bookkeeping only: updated by observing selection events, never
    /// written directly by the operations below.
    selected: Option<NodePath>,
    fetch: Sender<FetchCmd>,
}

pub struct TreeContainer {
    inner: Rc<RefCell<Inner>>,
    channel: Rc<EventChannel>,
    handles: Vec<ListenerHandle>,
}

impl TreeContainer {
    pub fn new(channel: Rc<EventChannel>, fetch: Sender<FetchCmd>) -> Self {
        let inner = Rc::new(RefCell::new(Inner {
            desired: Vec::new(),
            roots: Vec::new(),
            selected: None,
            fetch,
        }));

        let mut handles = Vec::new();

        // Peer deselection + bookkeeping. Deselection events are dispatched
        // after the borrow is released; the channel queues them if we are
        // already inside a dispatch.
        let weak_inner = Rc::downgrade(&inner);
        let weak_channel = Rc::downgrade(&channel);
        handles.push(channel.add_listener(NODE_SELECTED, move |envelope| {
            let Some(inner) = weak_inner.upgrade() else { return };
            let EventDetail::Node { path, .. } = &*envelope.detail else {
                return;
            };
            let deselected = {
                let mut inner = inner.borrow_mut();
                let mut out = Vec::new();
                for root in &mut inner.roots {
                    deselect_peers(root, path, &mut out);
                }
                inner.selected = Some(path.clone());
                out
            };
            if let Some(channel) = weak_channel.upgrade() {
                for peer in deselected {
                    channel.dispatch(NODE_DESELECTED, EventDetail::Path { path: peer });
                }
            }
        }));

        let weak_inner = Rc::downgrade(&inner);
        handles.push(channel.add_listener(NODE_DESELECTED, move |envelope| {
            let Some(inner) = weak_inner.upgrade() else { return };
            let EventDetail::Path { path } = &*envelope.detail else {
                return;
            };
            let mut inner = inner.borrow_mut();
            if inner.selected.as_ref() == Some(path) {
                inner.selected = None;
            }
        }));

        Self {
            inner,
            channel,
            handles,
        }
    }

    // ── Root management ──────────────────────────────────────────────

    /// Add a root for an opened document and materialize it.
    pub fn add_root(&self, provider: ProviderHandle) {
        self.inner.borrow_mut().desired.push(provider);
        self.reconcile();
    }

    /// Reconcile the materialized roots against the desired list, assuming
    /// new entries are only ever appended: walk both lists in lock-step,
    /// removing materialized heads that do not match the desired cursor,
    /// then append whatever the desired list still holds. Unchanged roots
    /// keep their expand/selection state and in-flight loads untouched.
    ///
    /// Returns `(removed, appended)`; a second call with the same desired
    /// list is a no-op.
    pub fn reconcile(&self) -> (usize, usize) {
        let mut removed = 0;
        let mut appended = 0;
        let deselected = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let mut out = Vec::new();
            let mut cursor = 0;
            let mut i = 0;
            while i < inner.roots.len() {
                let matches = cursor < inner.desired.len()
                    && inner.roots[i].path == *inner.desired[cursor].root_path();
                if matches {
                    cursor += 1;
                    i += 1;
                } else {
                    let mut node = inner.roots.remove(i);
                    node.take_selected_paths(&mut out);
                    removed += 1;
                }
            }
            while cursor < inner.desired.len() {
                let provider = inner.desired[cursor].clone();
                let path = provider.root_path().clone();
                inner.roots.push(TreeNode::attach(path, provider, &inner.fetch));
                appended += 1;
                cursor += 1;
            }
            out
        };
        for path in deselected {
            self.channel
                .dispatch(NODE_DESELECTED, EventDetail::Path { path });
        }
        (removed, appended)
    }

    /// Remove the root owning the current selection (its path is a prefix
    /// of the selected path). Returns the removed root's path, or `None`
    /// (leaving the list untouched) when nothing is selected or the
    /// selection lives in another container. The provider is closed
    /// fire-and-forget through the pool.
    pub fn remove_selected(&self) -> Option<NodePath> {
        let (index, provider) = {
            let inner = self.inner.borrow();
            let selected = inner.selected.as_ref()?;
            let index = inner
                .desired
                .iter()
                .position(|p| selected.has_prefix(p.root_path()))?;
            (index, inner.desired[index].clone())
        };
        self.inner.borrow_mut().desired.remove(index);
        self.reconcile();

        let path = provider.root_path().clone();
        let _ = self.inner.borrow().fetch.send(FetchCmd::Close {
            path: path.clone(),
            provider,
        });
        Some(path)
    }

    /// Remove every root, closing each provider fire-and-forget. Returns
    /// the removed root paths in their original order.
    pub fn remove_all(&self) -> Vec<NodePath> {
        let removed: Vec<ProviderHandle> = self.inner.borrow_mut().desired.drain(..).collect();
        self.reconcile();

        let mut paths = Vec::with_capacity(removed.len());
        for provider in removed {
            let path = provider.root_path().clone();
            let _ = self.inner.borrow().fetch.send(FetchCmd::Close {
                path: path.clone(),
                provider,
            });
            paths.push(path);
        }
        paths
    }

    // ── Selection queries ────────────────────────────────────────────

    /// The currently selected path, as tracked from the channel.
    pub fn selected_path(&self) -> Option<NodePath> {
        self.inner.borrow().selected.clone()
    }

    /// The provider owned by the root whose tree contains the current
    /// selection, if that root lives in this container.
    pub fn selected_provider(&self) -> Option<ProviderHandle> {
        let inner = self.inner.borrow();
        let selected = inner.selected.as_ref()?;
        inner
            .desired
            .iter()
            .find(|p| selected.has_prefix(p.root_path()))
            .cloned()
    }

    // ── Selection + navigation ───────────────────────────────────────

    /// Select the node at `path`: set its flag, then broadcast
    /// `node-selected` with its content (an empty placeholder while the
    /// node is still loading). Peers deselect themselves in response.
    /// Returns false when no such node is materialized.
    pub fn select(&self, path: &NodePath) -> bool {
        let payload = {
            let mut inner = self.inner.borrow_mut();
            let Some(node) = find_node_mut(&mut inner.roots, path) else {
                return false;
            };
            node.selected = true;
            node.selection_payload()
        };
        self.channel.dispatch(
            NODE_SELECTED,
            EventDetail::Node {
                path: path.clone(),
                content: payload,
            },
        );
        true
    }

    /// Move the selection to the next node in depth-first pre-order over
    /// the materialized tree. No-op on the last visible node.
    pub fn select_next(&self) {
        let target = {
            let inner = self.inner.borrow();
            match current_index_path(&inner) {
                Some(current) => next_visible(&inner.roots, &current)
                    .and_then(|ip| node_at(&inner.roots, &ip))
                    .map(|node| node.path.clone()),
                None => inner.roots.first().map(|node| node.path.clone()),
            }
        };
        if let Some(path) = target {
            self.select(&path);
        }
    }

    /// Move the selection to the previous node in depth-first pre-order:
    /// the previous sibling's deepest visible descendant, or the parent.
    /// No-op on the first root.
    pub fn select_prev(&self) {
        let target = {
            let inner = self.inner.borrow();
            match current_index_path(&inner) {
                Some(current) => prev_visible(&inner.roots, &current)
                    .and_then(|ip| node_at(&inner.roots, &ip))
                    .map(|node| node.path.clone()),
                None => inner.roots.first().map(|node| node.path.clone()),
            }
        };
        if let Some(path) = target {
            self.select(&path);
        }
    }

    /// Enter: toggle the selected node's expand state, then re-select it.
    /// With no selection yet, selects the first root.
    pub fn activate(&self) {
        let Some(path) = self.selected_path() else {
            let first = self.inner.borrow().roots.first().map(|n| n.path.clone());
            if let Some(path) = first {
                self.select(&path);
            }
            return;
        };
        let expanded = self.node_expanded(&path);
        self.set_expand(&path, !expanded.unwrap_or(false));
        self.select(&path);
    }

    /// Expand the selected node (no-op when childless) and re-select it.
    pub fn expand_selected(&self) {
        if let Some(path) = self.selected_path() {
            self.set_expand(&path, true);
            self.select(&path);
        }
    }

    /// Collapse the selected node and re-select it.
    pub fn collapse_selected(&self) {
        if let Some(path) = self.selected_path() {
            self.set_expand(&path, false);
            self.select(&path);
        }
    }

    /// Re-fetch the selected node's content; the completion broadcasts
    /// `node-data-updated`.
    pub fn refresh_selected(&self) {
        let inner = self.inner.borrow();
        if let Some(path) = inner.selected.as_ref() {
            if let Some(node) = find_node(&inner.roots, path) {
                node.refresh(&inner.fetch);
            }
        }
    }

    fn set_expand(&self, path: &NodePath, expand: bool) {
        let deselected = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let Some(node) = find_node_mut(&mut inner.roots, path) else {
                return;
            };
            if expand {
                node.expand(&inner.fetch);
                Vec::new()
            } else {
                node.collapse()
            }
        };
        for path in deselected {
            self.channel
                .dispatch(NODE_DESELECTED, EventDetail::Path { path });
        }
    }

    // ── Fetch results ────────────────────────────────────────────────

    /// Absorb a pool outcome. Content results whose node instance no longer
    /// exists (collapsed away before the fetch resolved) are discarded.
    pub fn apply(&self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Content { node, path, result } => {
                let applied = {
                    let mut inner = self.inner.borrow_mut();
                    let Some(target) = find_node_by_id(&mut inner.roots, node) else {
                        log::debug!("discarding fetch result for discarded node {path}");
                        return;
                    };
                    let applied = target.apply_content(result);
                    (applied, target.selected, target.path.clone(), target.content.clone())
                };
                let (applied, selected, path, content) = applied;
                match applied {
                    ContentApplied::FirstLoad => {
                        // Replace the placeholder the panels got if the node
                        // was selected while it was still loading.
                        if selected {
                            if let Some(content) = content {
                                self.channel
                                    .dispatch(NODE_SELECTED, EventDetail::Node { path, content });
                            }
                        }
                    }
                    ContentApplied::Updated => {
                        if let Some(content) = content {
                            self.channel
                                .dispatch(NODE_DATA_UPDATED, EventDetail::Node { path, content });
                        }
                    }
                    ContentApplied::Failed(message) => {
                        self.channel.dispatch_message(EVENT_ERROR, message);
                    }
                }
            }
            FetchOutcome::Closed { path, result } => {
                // Tear-down: a close failure is never surfaced as an error.
                if let Err(message) = result {
                    self.channel.dispatch_message(
                        EVENT_WARNING,
                        format!("failed to close {path}: {message}"),
                    );
                }
            }
            FetchOutcome::Opened { .. } | FetchOutcome::Exported { .. } => {
                // Routed by the application, not the container.
            }
        }
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().roots.is_empty()
    }

    pub fn root_paths(&self) -> Vec<NodePath> {
        self.inner.borrow().roots.iter().map(|n| n.path.clone()).collect()
    }

    pub fn node_state(&self, path: &NodePath) -> Option<LoadState> {
        let inner = self.inner.borrow();
        find_node(&inner.roots, path).map(|n| n.state.clone())
    }

    pub fn node_content(&self, path: &NodePath) -> Option<strata_core::content::NodeContent> {
        let inner = self.inner.borrow();
        find_node(&inner.roots, path).and_then(|n| n.content.clone())
    }

    fn node_expanded(&self, path: &NodePath) -> Option<bool> {
        let inner = self.inner.borrow();
        find_node(&inner.roots, path).map(|n| n.expanded)
    }

    /// Flatten the materialized tree into visible rows for rendering.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let inner = self.inner.borrow();
        let mut rows = Vec::new();
        flatten(&inner.roots, 0, &[], &mut rows);
        rows
    }
}

impl Drop for TreeContainer {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            self.channel.remove_listener(handle);
        }
    }
}

// ── Selection protocol helpers ───────────────────────────────────────

/// Deselect every node in the subtree whose path differs from `keep`,
/// collecting the paths that changed.
fn deselect_peers(node: &mut TreeNode, keep: &NodePath, out: &mut Vec<NodePath>) {
    if node.selected && node.path != *keep {
        node.selected = false;
        out.push(node.path.clone());
    }
    for child in &mut node.children {
        deselect_peers(child, keep, out);
    }
}

// ── Depth-first navigation over materialized nodes ───────────────────

fn current_index_path(inner: &Inner) -> Option<Vec<usize>> {
    let selected = inner.selected.as_ref()?;
    index_path_of(&inner.roots, selected)
}

fn index_path_of(roots: &[TreeNode], path: &NodePath) -> Option<Vec<usize>> {
    fn walk(nodes: &[TreeNode], path: &NodePath, acc: &mut Vec<usize>) -> bool {
        for (i, node) in nodes.iter().enumerate() {
            if !path.has_prefix(&node.path) {
                continue;
            }
            acc.push(i);
            if node.path == *path {
                return true;
            }
            if walk(&node.children, path, acc) {
                return true;
            }
            acc.pop();
        }
        false
    }
    let mut acc = Vec::new();
    walk(roots, path, &mut acc).then_some(acc)
}

fn node_at<'a>(roots: &'a [TreeNode], index_path: &[usize]) -> Option<&'a TreeNode> {
    let (first, rest) = index_path.split_first()?;
    let mut node = roots.get(*first)?;
    for &i in rest {
        node = node.children.get(i)?;
    }
    Some(node)
}

/// The next visible node in depth-first pre-order: the first child when
/// expanded, otherwise the next sibling, otherwise the first ancestor with
/// a next sibling. Never materializes anything.
fn next_visible(roots: &[TreeNode], current: &[usize]) -> Option<Vec<usize>> {
    let node = node_at(roots, current)?;
    if node.expanded && !node.children.is_empty() {
        let mut path = current.to_vec();
        path.push(0);
        return Some(path);
    }
    let mut path = current.to_vec();
    while let Some(last) = path.pop() {
        let sibling_count = if path.is_empty() {
            roots.len()
        } else {
            node_at(roots, &path)?.children.len()
        };
        if last + 1 < sibling_count {
            path.push(last + 1);
            return Some(path);
        }
    }
    None
}

/// The previous visible node: the previous sibling's deepest visible
/// descendant, or the parent.
fn prev_visible(roots: &[TreeNode], current: &[usize]) -> Option<Vec<usize>> {
    let (&last, parent) = current.split_last()?;
    if last == 0 {
        return if parent.is_empty() {
            None
        } else {
            Some(parent.to_vec())
        };
    }
    let mut path = parent.to_vec();
    path.push(last - 1);
    loop {
        let node = node_at(roots, &path)?;
        if node.expanded && !node.children.is_empty() {
            path.push(node.children.len() - 1);
        } else {
            break;
        }
    }
    Some(path)
}

// ── Flattening ───────────────────────────────────────────────────────

fn flatten(nodes: &[TreeNode], depth: usize, parent_guides: &[bool], out: &mut Vec<TreeRow>) {
    let count = nodes.len();
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i == count - 1;
        out.push(TreeRow {
            path: node.path.clone(),
            depth,
            name: node.display_name().to_string(),
            expanded: node.expanded,
            has_children: node.can_expand(),
            selected: node.selected,
            loading: node.state == LoadState::Loading,
            error: match &node.state {
                LoadState::Error(message) => Some(message.clone()),
                _ => None,
            },
            guide_depths: parent_guides.to_vec(),
        });

        if node.expanded && !node.children.is_empty() {
            let mut child_guides = parent_guides.to_vec();
            child_guides.push(!is_last);
            flatten(&node.children, depth + 1, &child_guides, out);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use strata_core::channel::Envelope;
    use strata_core::content::NodeContent;
    use strata_core::fetch::FetchPool;
    use strata_core::provider::{ensure_owned, DataProvider};
    use strata_providers::{DataNode, MemoryProvider};

    /// Record of every event seen on the channel, in dispatch order.
    type EventLog = Rc<RefCell<Vec<(String, Rc<EventDetail>)>>>;

    fn spy(channel: &Rc<EventChannel>) -> EventLog {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        for event in [
            NODE_SELECTED,
            NODE_DESELECTED,
            NODE_DATA_UPDATED,
            EVENT_ERROR,
            EVENT_WARNING,
        ] {
            let sink = log.clone();
            channel.add_listener(event, move |envelope: &Envelope| {
                sink.borrow_mut()
                    .push((envelope.name.clone(), envelope.detail.clone()));
            });
        }
        log
    }

    fn names(log: &EventLog) -> Vec<String> {
        log.borrow().iter().map(|(name, _)| name.clone()).collect()
    }

    struct Fixture {
        pool: FetchPool,
        channel: Rc<EventChannel>,
        container: TreeContainer,
    }

    impl Fixture {
        fn new(tag: &str) -> Self {
            let pool = FetchPool::spawn();
            let channel = EventChannel::named(&format!("container-test-{tag}"));
            let container = TreeContainer::new(channel.clone(), pool.sender());
            Self {
                pool,
                channel,
                container,
            }
        }

        /// Drain pool outcomes into the container until `done` holds.
        fn pump_until(&self, mut done: impl FnMut(&TreeContainer) -> bool) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !done(&self.container) {
                assert!(Instant::now() < deadline, "timed out waiting for fetches");
                match self.pool.try_recv() {
                    Some(outcome) => self.container.apply(outcome),
                    None => std::thread::sleep(Duration::from_millis(2)),
                }
            }
        }

        fn loaded(&self, path: &NodePath) -> bool {
            !matches!(
                self.container.node_state(path),
                Some(LoadState::Loading) | None
            )
        }

        /// Open a document and wait for the root to load.
        fn open(&self, doc: DataNode) -> NodePath {
            let provider = MemoryProvider::handle(doc);
            let root = provider.root_path().clone();
            self.container.add_root(provider);
            self.pump_until(|_| self.loaded(&root));
            root
        }

        /// Expand a node and wait for every materialized child to load.
        fn expand_and_load(&self, path: &NodePath) {
            assert!(self.container.select(path));
            self.container.expand_selected();
            let children: Vec<NodePath> = {
                let content = self.container.node_content(path).unwrap();
                content
                    .children
                    .iter()
                    .enumerate()
                    .map(|(i, name)| path.child(i, name))
                    .collect()
            };
            self.pump_until(|_| children.iter().all(|c| self.loaded(c)));
        }
    }

    fn doc_with_children(name: &str, children: &[&str]) -> DataNode {
        DataNode::named(name)
            .with_children(children.iter().map(|c| DataNode::named(*c)).collect())
    }

    /// Provider whose reads always fail.
    struct BrokenProvider {
        root: NodePath,
    }

    impl BrokenProvider {
        fn handle() -> ProviderHandle {
            Arc::new(Self {
                root: NodePath::fresh_root(),
            })
        }
    }

    impl DataProvider for BrokenProvider {
        fn root_path(&self) -> &NodePath {
            &self.root
        }
        fn open(&self) -> Result<()> {
            Ok(())
        }
        fn read(&self, path: &NodePath) -> Result<NodeContent> {
            ensure_owned(&self.root, path)?;
            bail!("boom");
        }
        fn export(&self, _format: &str) -> Result<Vec<u8>> {
            bail!("nothing to export");
        }
        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_selection_stays_globally_unique() {
        let fx = Fixture::new("unique-selection");
        let root = fx.open(doc_with_children("f1", &["a", "b", "c"]));
        fx.expand_and_load(&root);

        let a = root.child(0, "a");
        let b = root.child(1, "b");
        assert!(fx.container.select(&a));

        let log = spy(&fx.channel);
        assert!(fx.container.select(&b));

        // Exactly two broadcasts: B's selection, then A's deselection as a
        // side-effect of peers observing it.
        let events = log.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, NODE_SELECTED);
        assert!(matches!(&*events[0].1, EventDetail::Node { path, .. } if *path == b));
        assert_eq!(events[1].0, NODE_DESELECTED);
        assert!(matches!(&*events[1].1, EventDetail::Path { path } if *path == a));
        drop(events);

        let selected: Vec<_> = fx
            .container
            .visible_rows()
            .into_iter()
            .filter(|row| row.selected)
            .collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].path, b);
        assert_eq!(fx.container.selected_path(), Some(b));
    }

    #[test]
    fn test_selecting_with_no_prior_selection_emits_one_event() {
        let fx = Fixture::new("first-selection");
        let root = fx.open(doc_with_children("f1", &[]));

        let log = spy(&fx.channel);
        assert!(fx.container.select(&root));
        assert_eq!(names(&log), vec![NODE_SELECTED]);
    }

    #[test]
    fn test_reconcile_is_idempotent_and_preserves_state() {
        let fx = Fixture::new("reconcile");
        let first = fx.open(doc_with_children("f1", &["a"]));
        fx.expand_and_load(&first);

        // Appending a second root leaves the first one's subtree untouched.
        let second = fx.open(doc_with_children("f2", &[]));
        let rows = fx.container.visible_rows();
        assert_eq!(rows.len(), 3); // f1, f1/a, f2
        assert!(rows[0].expanded);

        // Rendering again with the same desired list does nothing.
        assert_eq!(fx.container.reconcile(), (0, 0));
        assert_eq!(fx.container.root_paths(), vec![first, second]);
    }

    #[test]
    fn test_arrow_navigation_across_roots() {
        let fx = Fixture::new("navigation");
        let f1 = fx.open(doc_with_children("f1", &["a", "b", "c"]));
        let f2 = fx.open(doc_with_children("f2", &[]));
        fx.expand_and_load(&f1);

        // Select F1's 2nd child, then ArrowDown: 3rd child selected, 2nd
        // deselected.
        assert!(fx.container.select(&f1.child(1, "b")));
        let log = spy(&fx.channel);
        fx.container.select_next();
        assert_eq!(fx.container.selected_path(), Some(f1.child(2, "c")));
        assert_eq!(names(&log), vec![NODE_SELECTED, NODE_DESELECTED]);

        // Two more ArrowDowns land on F2 (crossing the collapse boundary)
        // and then stay there: F2 is the last visible node.
        fx.container.select_next();
        assert_eq!(fx.container.selected_path(), Some(f2.clone()));
        fx.container.select_next();
        assert_eq!(fx.container.selected_path(), Some(f2.clone()));

        // ArrowUp walks back to the deepest visible descendant of F1.
        fx.container.select_prev();
        assert_eq!(fx.container.selected_path(), Some(f1.child(2, "c")));

        // ArrowUp from the first root is a no-op.
        assert!(fx.container.select(&f1));
        fx.container.select_prev();
        assert_eq!(fx.container.selected_path(), Some(f1));
    }

    #[test]
    fn test_arrow_up_descends_into_expanded_sibling() {
        let fx = Fixture::new("up-descend");
        let f1 = fx.open(doc_with_children("f1", &["a", "b"]));
        let f2 = fx.open(doc_with_children("f2", &[]));
        fx.expand_and_load(&f1);

        assert!(fx.container.select(&f2));
        fx.container.select_prev();
        assert_eq!(fx.container.selected_path(), Some(f1.child(1, "b")));
    }

    #[test]
    fn test_expand_childless_is_noop() {
        let fx = Fixture::new("childless");
        let root = fx.open(doc_with_children("empty", &[]));
        assert!(fx.container.select(&root));

        fx.container.expand_selected();
        let rows = fx.container.visible_rows();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].expanded);

        // Enter toggles nothing either; the node is simply re-selected.
        fx.container.activate();
        assert_eq!(fx.container.visible_rows().len(), 1);
        assert_eq!(fx.container.selected_path(), Some(root));
    }

    #[test]
    fn test_enter_toggles_expansion() {
        let fx = Fixture::new("enter-toggle");
        let root = fx.open(doc_with_children("f1", &["a"]));
        assert!(fx.container.select(&root));

        fx.container.activate();
        assert_eq!(fx.container.visible_rows().len(), 2);
        fx.container.activate();
        assert_eq!(fx.container.visible_rows().len(), 1);
        assert_eq!(fx.container.selected_path(), Some(root));
    }

    #[test]
    fn test_failing_read_degrades_to_placeholder() {
        let fx = Fixture::new("broken-read");
        let provider = BrokenProvider::handle();
        let root = provider.root_path().clone();

        let log = spy(&fx.channel);
        fx.container.add_root(provider);
        fx.pump_until(|_| fx.loaded(&root));

        let expected = format!("Error reading node: {root}. boom");
        assert_eq!(fx.container.node_state(&root), Some(LoadState::Error(expected.clone())));

        let content = fx.container.node_content(&root).unwrap();
        assert_eq!(content.parameters.len(), 1);
        assert_eq!(content.parameters[0].key, "Error");
        assert_eq!(content.parameters[0].value.to_string(), expected);

        let events = log.borrow();
        assert!(events.iter().any(|(name, detail)| {
            name == EVENT_ERROR
                && matches!(&**detail, EventDetail::Message { message } if message.contains("boom"))
        }));
        drop(events);

        // The error node is still navigable.
        assert!(fx.container.select(&root));
        assert_eq!(fx.container.selected_path(), Some(root));
    }

    #[test]
    fn test_remove_selected_without_selection_is_noop() {
        let fx = Fixture::new("remove-none");
        fx.open(doc_with_children("f1", &[]));

        assert_eq!(fx.container.remove_selected(), None);
        assert_eq!(fx.container.visible_rows().len(), 1);
    }

    #[test]
    fn test_remove_selected_removes_owning_root() {
        let fx = Fixture::new("remove-owning");
        let f1 = fx.open(doc_with_children("f1", &["a"]));
        let f2 = fx.open(doc_with_children("f2", &[]));
        fx.expand_and_load(&f1);

        // Selecting a nested node still removes the owning root.
        assert!(fx.container.select(&f1.child(0, "a")));
        assert_eq!(fx.container.remove_selected(), Some(f1));

        assert_eq!(fx.container.root_paths(), vec![f2]);
        // The discarded node's deselection cleared the bookkeeping.
        assert_eq!(fx.container.selected_path(), None);
        assert_eq!(fx.container.remove_selected(), None);
    }

    #[test]
    fn test_remove_all_returns_paths_in_order() {
        let fx = Fixture::new("remove-all");
        let f1 = fx.open(doc_with_children("f1", &[]));
        let f2 = fx.open(doc_with_children("f2", &[]));

        assert_eq!(fx.container.remove_all(), vec![f1, f2]);
        assert!(fx.container.is_empty());
    }

    #[test]
    fn test_stale_fetch_results_are_discarded() {
        let fx = Fixture::new("stale-fetch");
        let root = fx.open(doc_with_children("f1", &["a", "b"]));

        // Expand, then collapse before the child fetches are applied.
        assert!(fx.container.select(&root));
        fx.container.expand_selected();
        fx.container.collapse_selected();

        // Drain the two child outcomes; both target discarded instances.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut drained = 0;
        while drained < 2 {
            assert!(Instant::now() < deadline, "timed out draining outcomes");
            match fx.pool.try_recv() {
                Some(outcome) => {
                    fx.container.apply(outcome);
                    drained += 1;
                }
                None => std::thread::sleep(Duration::from_millis(2)),
            }
        }

        let rows = fx.container.visible_rows();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].expanded);
    }

    #[test]
    fn test_refresh_dispatches_data_updated() {
        let fx = Fixture::new("refresh");
        let root = fx.open(doc_with_children("f1", &["a"]));
        assert!(fx.container.select(&root));

        let log = spy(&fx.channel);
        fx.container.refresh_selected();
        fx.pump_until(|_| !names(&log).is_empty());

        let events = log.borrow();
        assert_eq!(events[0].0, NODE_DATA_UPDATED);
        assert!(matches!(
            &*events[0].1,
            EventDetail::Node { path, content } if *path == root && content.children == vec!["a"]
        ));
    }

    #[test]
    fn test_select_while_loading_sends_placeholder_then_content() {
        let fx = Fixture::new("loading-placeholder");
        let provider = MemoryProvider::handle(doc_with_children("f1", &["a"]));
        let root = provider.root_path().clone();

        let log = spy(&fx.channel);
        fx.container.add_root(provider);
        assert!(fx.container.select(&root));

        // Selected while loading: an empty placeholder goes out.
        {
            let events = log.borrow();
            assert_eq!(events[0].0, NODE_SELECTED);
            assert!(matches!(
                &*events[0].1,
                EventDetail::Node { content, .. } if content.children.is_empty()
            ));
        }

        // The load completion re-broadcasts the selection with real content.
        fx.pump_until(|_| fx.loaded(&root));
        let events = log.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0, NODE_SELECTED);
        assert!(matches!(
            &*events[1].1,
            EventDetail::Node { content, .. } if content.children == vec!["a"]
        ));
    }

    #[test]
    fn test_two_containers_share_one_selection() {
        let fx = Fixture::new("two-containers");
        let other = TreeContainer::new(fx.channel.clone(), fx.pool.sender());

        let root_a = fx.open(doc_with_children("left", &[]));
        let provider = MemoryProvider::handle(doc_with_children("right", &[]));
        let root_b = provider.root_path().clone();
        other.add_root(provider);
        let deadline = Instant::now() + Duration::from_secs(5);
        while matches!(other.node_state(&root_b), Some(LoadState::Loading) | None) {
            assert!(Instant::now() < deadline, "timed out loading second root");
            match fx.pool.try_recv() {
                Some(outcome) => {
                    let for_other = matches!(
                        &outcome,
                        FetchOutcome::Content { path, .. } if path.has_prefix(&root_b)
                    );
                    if for_other {
                        other.apply(outcome);
                    } else {
                        fx.container.apply(outcome);
                    }
                }
                None => std::thread::sleep(Duration::from_millis(2)),
            }
        }

        assert!(fx.container.select(&root_a));
        assert!(other.select(&root_b));

        // The broadcast deselected the first container's node.
        assert!(!fx.container.visible_rows()[0].selected);
        assert!(other.visible_rows()[0].selected);

        // Both containers agree on the tracked path, but only the owning
        // one can resolve the provider.
        assert_eq!(fx.container.selected_path(), Some(root_b.clone()));
        assert_eq!(other.selected_path(), Some(root_b.clone()));
        assert!(fx.container.selected_provider().is_none());
        assert!(other.selected_provider().is_some());
    }
}
