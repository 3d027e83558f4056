//! The content model returned by data providers.
//!
//! Every node resolves to the same uniform shape regardless of where it came
//! from, so the tree and the detail panels never need per-format handling.
//! Error placeholders reuse the shape with a single `"Error"` parameter.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Scalar parameters ────────────────────────────────────────────────

/// A typed scalar value attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Text(String),
    Flag(bool),
    Number(f64),
    BigInt(i128),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::BigInt(n) => write!(f, "{n}"),
        }
    }
}

/// A key + typed value pair, ordered as the provider returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: ParamValue,
}

impl Parameter {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ParamValue::Text(value.into()),
        }
    }
}

// ── Samples and tables ───────────────────────────────────────────────

/// One numeric {x, y} sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
}

/// A column descriptor for tabular node data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub key: String,
    pub label: String,
}

/// Tabular node data: ordered columns plus row records keyed by column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl TableData {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }
}

// ── NodeContent ──────────────────────────────────────────────────────

/// Everything a provider returns for one path. Child entries are segment
/// display names, not full paths; the tree computes child paths itself by
/// appending indexed segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeContent {
    pub display_name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub table: TableData,
    #[serde(default)]
    pub children: Vec<String>,
}

impl NodeContent {
    /// An empty content record with just a display name. Used as the
    /// placeholder payload for a node selected while still loading.
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    /// The degraded-but-displayable shape synthesized when a fetch fails:
    /// downstream consumers see a single `"Error"` parameter carrying the
    /// human-readable message.
    pub fn error_placeholder(display_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            parameters: vec![Parameter::text("Error", message)],
            ..Self::default()
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
