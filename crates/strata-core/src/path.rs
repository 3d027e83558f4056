//! Hierarchical node paths.
//!
//! A path identifies one node in an opened document: an opaque root locator
//! plus an ordered list of indexed segments. The string form
//! `<locator>#/<index>-<name>/...` is the only externally visible format;
//! equality is defined on the normalized components, which is equivalent to
//! equality of the string form because the encoding is canonical.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped inside a segment name. `/` and `#` are structural,
/// `%` must be escaped for the decoding to round-trip.
const SEGMENT_NAME: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'#')
    .add(b'%')
    .add(b'?')
    .add(b'"');

// ── Segment ──────────────────────────────────────────────────────────

/// One step below a root: a positional index plus the display name it had
/// when the parent was read. The index disambiguates same-named siblings and
/// is stable for the lifetime of a materialized node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub index: usize,
    pub name: String,
}

impl Segment {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.index,
            utf8_percent_encode(&self.name, SEGMENT_NAME)
        )
    }
}

// ── NodePath ─────────────────────────────────────────────────────────

/// Identity of a tree node: root locator + ordered indexed segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    root: String,
    segments: Vec<Segment>,
}

impl NodePath {
    /// A root path with the given locator and no segments.
    pub fn root(locator: impl Into<String>) -> Self {
        Self {
            root: locator.into(),
            segments: Vec::new(),
        }
    }

    /// A root path with a freshly generated locator. Opening the same
    /// document twice yields two independent trees.
    pub fn fresh_root() -> Self {
        Self::root(fresh_root_locator())
    }

    pub fn root_locator(&self) -> &str {
        &self.root
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path of the child at `index` named `name`.
    pub fn child(&self, index: usize, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::new(index, name));
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    /// The parent path, or `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            root: self.root.clone(),
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `prefix` is this path or one of its ancestors. A root path is
    /// a prefix of every path in its tree.
    pub fn has_prefix(&self, prefix: &NodePath) -> bool {
        self.root == prefix.root
            && self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// The display name of the deepest segment, or the root locator for a
    /// root path. Used when no fetched content is available yet.
    pub fn display_name(&self) -> &str {
        self.segments
            .last()
            .map(|s| s.name.as_str())
            .unwrap_or(&self.root)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#", self.root)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (root, rest) = s
            .split_once('#')
            .with_context(|| format!("path is missing the '#' root delimiter: {s}"))?;
        if root.is_empty() {
            bail!("path has an empty root locator: {s}");
        }
        if root.contains('/') {
            bail!("root locator may not contain '/': {s}");
        }

        let mut segments = Vec::new();
        if !rest.is_empty() {
            let rest = rest
                .strip_prefix('/')
                .with_context(|| format!("path segments must start with '/': {s}"))?;
            for raw in rest.split('/') {
                let (index, name) = raw
                    .split_once('-')
                    .with_context(|| format!("segment is missing its index: {raw}"))?;
                let index: usize = index
                    .parse()
                    .with_context(|| format!("segment has a non-numeric index: {raw}"))?;
                let name = percent_decode_str(name)
                    .decode_utf8()
                    .with_context(|| format!("segment name is not valid UTF-8: {raw}"))?
                    .into_owned();
                segments.push(Segment { index, name });
            }
        }

        Ok(Self {
            root: root.to_string(),
            segments,
        })
    }
}

/// Generate a process-unique random root locator.
pub fn fresh_root_locator() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    format!("doc-{:08x}-{n}", rand::random::<u32>())
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_form() {
        let root = NodePath::root("doc-1");
        assert_eq!(root.to_string(), "doc-1#");

        let child = root.child(0, "alpha").child(2, "beta");
        assert_eq!(child.to_string(), "doc-1#/0-alpha/2-beta");
    }

    #[test]
    fn test_parent_prefixes_child() {
        let root = NodePath::root("doc-1");
        let child = root.child(3, "measurements");
        let grandchild = child.child(0, "samples");

        assert!(child.to_string().starts_with(&root.to_string()));
        assert!(grandchild.to_string().starts_with(&child.to_string()));
        assert_eq!(grandchild.parent(), Some(child.clone()));
        assert_eq!(child.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn test_encoding_round_trip() {
        let path = NodePath::root("doc-2").child(1, "50% duty / phase #2");
        let parsed: NodePath = path.to_string().parse().unwrap();
        assert_eq!(parsed, path);
        assert_eq!(parsed.display_name(), "50% duty / phase #2");
    }

    #[test]
    fn test_injective_string_form() {
        let root = NodePath::root("doc-3");
        // A name containing '/' must not collide with two separate segments.
        let slashed = root.child(0, "a/1-b");
        let nested = root.child(0, "a").child(1, "b");
        assert_ne!(slashed.to_string(), nested.to_string());
        // Same name under different indexes stays distinct.
        assert_ne!(root.child(0, "x").to_string(), root.child(1, "x").to_string());
    }

    #[test]
    fn test_has_prefix() {
        let root = NodePath::root("doc-4");
        let other_root = NodePath::root("doc-5");
        let deep = root.child(0, "a").child(1, "b");

        assert!(deep.has_prefix(&root));
        assert!(deep.has_prefix(&deep));
        assert!(!deep.has_prefix(&other_root));
        assert!(!root.has_prefix(&deep));
        // Sibling prefix with a shared name prefix is not an ancestor.
        assert!(!root.child(0, "abc").has_prefix(&root.child(0, "ab")));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("no-delimiter".parse::<NodePath>().is_err());
        assert!("#/0-a".parse::<NodePath>().is_err());
        assert!("doc#0-a".parse::<NodePath>().is_err());
        assert!("doc#/x-a".parse::<NodePath>().is_err());
        assert!("doc#/12".parse::<NodePath>().is_err());
    }

    #[test]
    fn test_fresh_locators_are_unique() {
        let a = fresh_root_locator();
        let b = fresh_root_locator();
        assert_ne!(a, b);
    }
}
