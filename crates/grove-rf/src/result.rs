//! Training result types for the random forest.

use crate::forest::RandomForest;

/// Metadata about the training run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TrainingMetadata {
    /// Number of trees the config asked for.
    pub n_trees_requested: usize,
    /// Number of trees that trained and joined the forest.
    pub n_trees_trained: usize,
    /// Number of training samples.
    pub n_samples: usize,
    /// Number of distinct labels in the training set.
    pub n_labels: usize,
    /// Number of distinct candidate columns.
    pub n_columns: usize,
    /// Resolved per-split column ceiling; `None` when every column is searched.
    pub max_features_resolved: Option<usize>,
    /// Whether trees were grown on bootstrap samples.
    pub bootstrap: bool,
}

impl TrainingMetadata {
    /// Number of trees left out under the skip policy.
    #[must_use]
    pub fn n_trees_failed(&self) -> usize {
        self.n_trees_requested - self.n_trees_trained
    }
}

/// Result of random forest training: the fitted forest and run metadata.
#[derive(Debug)]
pub struct TrainingResult {
    forest: RandomForest,
    metadata: TrainingMetadata,
}

impl TrainingResult {
    /// Create a new training result.
    pub(crate) fn new(forest: RandomForest, metadata: TrainingMetadata) -> Self {
        Self { forest, metadata }
    }

    /// Borrow the fitted forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Consume the result and return the fitted forest.
    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// Return training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
