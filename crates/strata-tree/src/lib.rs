//! Lazily-materialized tree engine: node lifecycle, root reconciliation,
//! depth-first keyboard navigation, and channel-broadcast selection.

pub mod container;
pub mod node;
pub mod ui;

pub use container::{TreeContainer, TreeRow};
pub use node::{ContentApplied, LoadState, TreeNode};
