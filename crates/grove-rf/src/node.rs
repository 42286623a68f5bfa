use std::fmt;

use crate::feature::Feature;
use crate::sample::Label;

/// Index into a `Vec<Node>` arena, identifying a specific node in a decision tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Impurity of a labeled sample set, in bits.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    /// Create a new impurity value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` where children are referenced by
/// [`NodeIndex`]. An internal node always names exactly two children.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior node testing one feature.
    Internal {
        /// The feature tested at this node.
        feature: Feature,
        /// Child for samples that have the feature.
        has: NodeIndex,
        /// Child for samples that lack the feature.
        lacks: NodeIndex,
        /// Number of training samples that reached this node.
        n_samples: usize,
    },
    /// A terminal node.
    Leaf {
        /// The predicted label.
        label: Label,
        /// Number of training samples in this leaf. Zero for a leaf
        /// created from an empty partition.
        n_samples: usize,
    },
}

impl Node {
    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Internal { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Return the leaf label, or `None` for an internal node.
    #[must_use]
    pub fn label(&self) -> Option<&Label> {
        match self {
            Node::Leaf { label, .. } => Some(label),
            Node::Internal { .. } => None,
        }
    }

    /// Return the tested feature, or `None` for a leaf.
    #[must_use]
    pub fn feature(&self) -> Option<&Feature> {
        match self {
            Node::Internal { feature, .. } => Some(feature),
            Node::Leaf { .. } => None,
        }
    }

    /// Return the `has` and `lacks` children of an internal node.
    #[must_use]
    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        match self {
            Node::Internal { has, lacks, .. } => Some((*has, *lacks)),
            Node::Leaf { .. } => None,
        }
    }

    /// The name printed for this node: the label or the feature display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Node::Internal { feature, .. } => feature.display_name(),
            Node::Leaf { label, .. } => label.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Impurity, Node, NodeIndex};
    use crate::feature::{Comparator, Feature};
    use crate::sample::Label;

    #[test]
    fn node_index_roundtrip() {
        let ni = NodeIndex::new(42);
        assert_eq!(ni.index(), 42);
        assert_eq!(format!("{ni}"), "42");
    }

    #[test]
    fn impurity_display() {
        let imp = Impurity::new(0.333333);
        assert_eq!(format!("{imp}"), "0.333333");
        assert!(Impurity::new(0.1) < Impurity::new(0.5));
    }

    fn make_leaf() -> Node {
        Node::Leaf {
            label: Label::new("Up"),
            n_samples: 10,
        }
    }

    fn make_internal() -> Node {
        Node::Internal {
            feature: Feature::new("hour", Comparator::LessThan, 3.0),
            has: NodeIndex::new(1),
            lacks: NodeIndex::new(2),
            n_samples: 20,
        }
    }

    #[test]
    fn leaf_accessors() {
        let leaf = make_leaf();
        assert!(leaf.is_leaf());
        assert_eq!(leaf.n_samples(), 10);
        assert_eq!(leaf.label().map(Label::as_str), Some("Up"));
        assert!(leaf.feature().is_none());
        assert!(leaf.children().is_none());
        assert_eq!(leaf.name(), "Up");
    }

    #[test]
    fn internal_accessors() {
        let node = make_internal();
        assert!(!node.is_leaf());
        assert_eq!(node.n_samples(), 20);
        assert!(node.label().is_none());
        assert_eq!(
            node.children(),
            Some((NodeIndex::new(1), NodeIndex::new(2)))
        );
        assert_eq!(node.name(), "hour < 3.0");
    }
}
