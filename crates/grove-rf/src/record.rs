//! Nested, self-describing tree records for JSON transport.
//!
//! A record names each node's feature by column and test text, so a tree
//! can be rebuilt without sharing any in-memory state with the producer.

use tracing::instrument;

use crate::error::TreeError;
use crate::feature::Feature;
use crate::forest::RandomForest;
use crate::node::{Node, NodeIndex};
use crate::sample::Label;
use crate::split::ImpurityMethod;
use crate::tree::DecisionTree;

/// Serializable form of a whole tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TreeRecord {
    /// Label share at or above which growth stopped.
    pub homogeneity_threshold: f64,
    /// Depth limit the tree was grown with, root at depth 1.
    pub max_depth: Option<usize>,
    /// The root node.
    pub root: NodeRecord,
}

/// Serializable form of one node.
///
/// Internal children are ordered `[has, lacks]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeRecord {
    /// A terminal node.
    Leaf {
        /// Printable label value.
        label: String,
        /// Training samples that reached the leaf.
        #[serde(default)]
        n_samples: usize,
    },
    /// An interior node.
    Internal {
        /// Column the feature tests.
        column: String,
        /// Comparator and threshold, e.g. `"< 3.0"`.
        test: String,
        /// Training samples that reached the node.
        #[serde(default)]
        n_samples: usize,
        /// `[has, lacks]`.
        children: Box<[NodeRecord; 2]>,
    },
}

impl DecisionTree {
    /// Convert the tree into its nested record form.
    #[must_use]
    pub fn to_record(&self) -> TreeRecord {
        TreeRecord {
            homogeneity_threshold: self.homogeneity_threshold,
            max_depth: self.max_depth,
            root: self.node_record(NodeIndex::new(0)),
        }
    }

    fn node_record(&self, idx: NodeIndex) -> NodeRecord {
        match &self.nodes[idx.index()] {
            Node::Leaf { label, n_samples } => NodeRecord::Leaf {
                label: label.to_string(),
                n_samples: *n_samples,
            },
            Node::Internal {
                feature,
                has,
                lacks,
                n_samples,
            } => NodeRecord::Internal {
                column: feature.column().to_string(),
                test: feature.test(),
                n_samples: *n_samples,
                children: Box::new([self.node_record(*has), self.node_record(*lacks)]),
            },
        }
    }

    /// Rebuild a tree from its record form.
    ///
    /// The rebuilt tree classifies every input the same way as the recorded one.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::MalformedTest`] when a node's test does not parse.
    pub fn from_record(record: &TreeRecord) -> Result<Self, TreeError> {
        let mut nodes = Vec::new();
        push_record(&record.root, &mut nodes)?;
        Ok(Self {
            nodes,
            impurity: ImpurityMethod::Entropy,
            homogeneity_threshold: record.homogeneity_threshold,
            max_depth: record.max_depth,
        })
    }

    /// Encode the tree as a JSON record.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EncodeRecord`] if JSON encoding fails.
    pub fn to_json(&self) -> Result<String, TreeError> {
        serde_json::to_string(&self.to_record()).map_err(|e| TreeError::EncodeRecord { source: e })
    }

    /// Decode a tree from a JSON record.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::DecodeRecord`] | the text is not a valid tree record |
    /// | [`TreeError::MalformedTest`] | a node's test does not parse |
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let record: TreeRecord =
            serde_json::from_str(json).map_err(|e| TreeError::DecodeRecord { source: e })?;
        Self::from_record(&record)
    }
}

/// Arena pattern: reserve index, recurse, then overwrite with the internal node.
fn push_record(record: &NodeRecord, nodes: &mut Vec<Node>) -> Result<NodeIndex, TreeError> {
    let idx = nodes.len();
    match record {
        NodeRecord::Leaf { label, n_samples } => {
            nodes.push(Node::Leaf {
                label: Label::new(label.as_str()),
                n_samples: *n_samples,
            });
        }
        NodeRecord::Internal {
            column,
            test,
            n_samples,
            children,
        } => {
            let feature = Feature::parse_test(column.as_str(), test)?;
            nodes.push(Node::Leaf {
                label: Label::new(""),
                n_samples: *n_samples,
            });
            let [has_record, lacks_record] = &**children;
            let has = push_record(has_record, nodes)?;
            let lacks = push_record(lacks_record, nodes)?;
            nodes[idx] = Node::Internal {
                feature,
                has,
                lacks,
                n_samples: *n_samples,
            };
        }
    }
    Ok(NodeIndex::new(idx))
}

impl RandomForest {
    /// Convert every tree into its record form, in training order.
    #[must_use]
    pub fn to_records(&self) -> Vec<TreeRecord> {
        self.trees.iter().map(DecisionTree::to_record).collect()
    }

    /// Rebuild a forest from tree records.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::EmptyForest`] | `records` is empty |
    /// | [`TreeError::MalformedTest`] | a node's test does not parse |
    #[instrument(skip_all, fields(n_records = records.len()))]
    pub fn from_records(records: &[TreeRecord]) -> Result<Self, TreeError> {
        let trees = records
            .iter()
            .map(DecisionTree::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_trees(trees)
    }
}
