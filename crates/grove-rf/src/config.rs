//! Configuration builder for random forest training.

use crate::error::TreeError;
use crate::feature::FeatureList;
use crate::result::TrainingResult;
use crate::sample::Sample;
use crate::split::{ImpurityMethod, SearchStrategy};

/// Upper bound on the random column subset drawn at each split.
///
/// Each split draws a subset size uniformly from `[1, resolved]`, so the
/// resolved value is a ceiling, not a fixed size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// Floor of the square root of the column count, at least 1.
    Sqrt,
    /// Floor of log base 2 of the column count, at least 1.
    Log2,
    /// A fraction of the column count, rounded up (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// No per-split subsampling: every column is searched at every split.
    All,
}

/// What to do when one tree of the ensemble fails to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeFailurePolicy {
    /// Fail the whole forest with the tree's error.
    #[default]
    Abort,
    /// Log the failure and leave the tree out.
    Skip,
}

/// Configuration for random forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter               | Default     |
/// |-------------------------|-------------|
/// | `max_features`          | `Sqrt`      |
/// | `max_depth`             | `None`      |
/// | `homogeneity_threshold` | 1.0         |
/// | `impurity`              | `Entropy`   |
/// | `search`                | `Bisection` |
/// | `bootstrap`             | `true`      |
/// | `failure_policy`        | `Abort`     |
/// | `max_subset_draws`      | 1000        |
/// | `seed`                  | 42          |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) homogeneity_threshold: f64,
    pub(crate) impurity: ImpurityMethod,
    pub(crate) search: SearchStrategy,
    pub(crate) bootstrap: bool,
    pub(crate) failure_policy: TreeFailurePolicy,
    pub(crate) max_subset_draws: usize,
    pub(crate) seed: u64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, TreeError> {
        if n_trees == 0 {
            return Err(TreeError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            homogeneity_threshold: 1.0,
            impurity: ImpurityMethod::Entropy,
            search: SearchStrategy::Bisection,
            bootstrap: true,
            failure_policy: TreeFailurePolicy::Abort,
            max_subset_draws: 1000,
            seed: 42,
        })
    }

    // --- Setters ---

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth (root is depth 1). `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the label share at or above which a node becomes a leaf.
    #[must_use]
    pub fn with_homogeneity_threshold(mut self, homogeneity_threshold: f64) -> Self {
        self.homogeneity_threshold = homogeneity_threshold;
        self
    }

    /// Set the impurity measure.
    #[must_use]
    pub fn with_impurity(mut self, impurity: ImpurityMethod) -> Self {
        self.impurity = impurity;
        self
    }

    /// Set the split search strategy.
    #[must_use]
    pub fn with_search(mut self, search: SearchStrategy) -> Self {
        self.search = search;
        self
    }

    /// Enable or disable bootstrap resampling.
    ///
    /// With bootstrap off every tree sees the full training set and trees
    /// differ only through their column subsets.
    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set the per-tree failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, failure_policy: TreeFailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Set how many column subsets a split may draw before giving up.
    #[must_use]
    pub fn with_max_subset_draws(mut self, max_subset_draws: usize) -> Self {
        self.max_subset_draws = max_subset_draws;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the max features strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the homogeneity threshold.
    #[must_use]
    pub fn homogeneity_threshold(&self) -> f64 {
        self.homogeneity_threshold
    }

    /// Return the impurity measure.
    #[must_use]
    pub fn impurity(&self) -> ImpurityMethod {
        self.impurity
    }

    /// Return the split search strategy.
    #[must_use]
    pub fn search(&self) -> SearchStrategy {
        self.search
    }

    /// Return whether bootstrap resampling is on.
    #[must_use]
    pub fn bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Return the per-tree failure policy.
    #[must_use]
    pub fn failure_policy(&self) -> TreeFailurePolicy {
        self.failure_policy
    }

    /// Return the subset draw cap.
    #[must_use]
    pub fn max_subset_draws(&self) -> usize {
        self.max_subset_draws
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a random forest on labeled samples and per-column candidate lists.
    ///
    /// Every tree is grown from the same candidate lists; only its sample
    /// set and its split RNG differ.
    ///
    /// # Errors
    ///
    /// | Variant                                    | When                                              |
    /// |--------------------------------------------|---------------------------------------------------|
    /// | [`TreeError::EmptyDataset`]                | `samples` is empty                                |
    /// | [`TreeError::MissingLabel`]                | a sample has no label                             |
    /// | [`TreeError::InvalidMaxFeatures`]          | resolved max_features is outside [1, n_columns]   |
    /// | [`TreeError::InvalidHomogeneityThreshold`] | threshold outside (0.0, 1.0]                      |
    /// | [`TreeError::InvalidMaxDepth`]             | `max_depth` is `Some(0)`                          |
    /// | [`TreeError::NoTreesTrained`]              | policy `Skip` and every tree failed               |
    /// | any tree error                             | policy `Abort` and some tree failed               |
    pub fn fit(
        &self,
        samples: &[Sample],
        features: &[FeatureList],
    ) -> Result<TrainingResult, TreeError> {
        crate::forest::train(self, samples, features)
    }
}
