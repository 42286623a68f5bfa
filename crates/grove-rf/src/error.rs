use std::path::PathBuf;

/// Errors from tree induction, classification, and ensemble operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when a training sample carries no label.
    #[error("sample {sample_index} has no label")]
    MissingLabel {
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a feature test reads a column the sample does not have.
    #[error("sample has no value for column \"{column}\"")]
    MissingValue {
        /// The column the feature tests.
        column: String,
    },

    /// Returned when a feature test reads a value that does not parse as a number.
    #[error("value \"{raw}\" in column \"{column}\" is not numeric")]
    NonNumericValue {
        /// The column the feature tests.
        column: String,
        /// The raw cell text.
        raw: String,
    },

    /// Returned when entropy is requested for a set with zero or more than two labels.
    #[error("binary entropy needs one or two distinct labels, found {distinct_labels}")]
    ImpurityInvariant {
        /// Number of distinct labels in the sample set.
        distinct_labels: usize,
    },

    /// Returned when homogeneity_threshold is not in (0.0, 1.0].
    #[error("homogeneity_threshold must be in (0.0, 1.0], got {threshold}")]
    InvalidHomogeneityThreshold {
        /// The invalid threshold provided.
        threshold: f64,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_features resolves to 0 or exceeds the number of columns.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_columns}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of distinct candidate columns.
        n_columns: usize,
    },

    /// Returned when max_subset_draws is zero.
    #[error("max_subset_draws must be at least 1")]
    InvalidSubsetDraws,

    /// Returned when a candidate list contains a feature on another column.
    #[error("feature \"{feature}\" does not belong to the candidate list for column \"{column}\"")]
    MixedColumnFeatureList {
        /// The column the list is keyed by.
        column: String,
        /// Display name of the offending feature.
        feature: String,
    },

    /// Returned when split search finds no candidate on a node that still has candidates.
    #[error("split search found no usable feature")]
    NoUsableSplit,

    /// Returned when random column subsets keep yielding no usable split.
    #[error("no usable split found after {attempts} random column draws")]
    SubsetDrawsExhausted {
        /// Number of subsets drawn before giving up.
        attempts: usize,
    },

    /// Returned when every tree in a forest failed to train.
    #[error("every tree in the forest failed to train")]
    NoTreesTrained,

    /// Returned when a forest is built from, or left with, zero trees.
    #[error("forest has no trees")]
    EmptyForest,

    /// Returned when a tree's node arena has no root.
    #[error("tree {tree_index} has no nodes")]
    EmptyTree {
        /// Position of the tree in the forest.
        tree_index: usize,
    },

    /// Returned when an internal node points outside the arena or back
    /// toward the root.
    #[error("tree {tree_index}: node {node} has child {child}, but children must lie in ({node}, {n_nodes})")]
    InvalidChildIndex {
        /// Position of the tree in the forest.
        tree_index: usize,
        /// Arena index of the parent.
        node: usize,
        /// The offending child index.
        child: usize,
        /// Arena length.
        n_nodes: usize,
    },

    /// Returned when a serialized feature test cannot be parsed.
    #[error("malformed feature test \"{test}\" on column \"{column}\"")]
    MalformedTest {
        /// The column named by the record.
        column: String,
        /// The test text, e.g. `"< 3.0"`.
        test: String,
    },

    /// Returned when a tree record cannot be encoded as JSON.
    #[error("failed to encode tree record")]
    EncodeRecord {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a tree record cannot be decoded from JSON.
    #[error("failed to decode tree record")]
    DecodeRecord {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },

    /// Returned when a model file's header disagrees with the forest it wraps.
    #[error("model header in {path} lists {header_trees} trees but the file holds {found_trees}")]
    ModelHeaderMismatch {
        /// Path to the inconsistent model file.
        path: PathBuf,
        /// Tree count recorded in the header.
        header_trees: usize,
        /// Tree count actually decoded.
        found_trees: usize,
    },
}
