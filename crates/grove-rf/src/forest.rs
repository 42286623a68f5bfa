//! Random forest training with parallel tree construction.

use std::collections::BTreeSet;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument, warn};

use crate::config::{MaxFeatures, RandomForestConfig, TreeFailurePolicy};
use crate::error::TreeError;
use crate::feature::FeatureList;
use crate::result::{TrainingMetadata, TrainingResult};
use crate::sample::{Label, Sample, label_counts};
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// A fitted ensemble of decision trees.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Assemble a forest from already-grown trees.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::EmptyForest`] | `trees` is empty |
    /// | [`TreeError::EmptyTree`] | a tree has no nodes |
    /// | [`TreeError::InvalidChildIndex`] | a child index is out of range or not after its parent |
    pub fn from_trees(trees: Vec<DecisionTree>) -> Result<Self, TreeError> {
        if trees.is_empty() {
            return Err(TreeError::EmptyForest);
        }
        for (tree_index, tree) in trees.iter().enumerate() {
            tree.check_arena(tree_index)?;
        }
        Ok(Self { trees })
    }

    /// Return the trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Every label some leaf of some tree can return, in canonical order.
    #[must_use]
    pub fn labels(&self) -> BTreeSet<&Label> {
        self.trees
            .iter()
            .flat_map(DecisionTree::nodes)
            .filter_map(|node| node.label())
            .collect()
    }
}

/// Resolve `MaxFeatures` to a concrete subset ceiling.
///
/// `None` means no per-split subsampling, which is also the outcome when
/// there are no columns at all.
pub(crate) fn resolve_max_features(
    max_features: MaxFeatures,
    n_columns: usize,
) -> Result<Option<usize>, TreeError> {
    if n_columns == 0 {
        return Ok(None);
    }
    let resolved = match max_features {
        MaxFeatures::All => return Ok(None),
        MaxFeatures::Sqrt => ((n_columns as f64).sqrt().floor() as usize).max(1),
        MaxFeatures::Log2 => ((n_columns as f64).log2().floor().max(0.0) as usize).max(1),
        MaxFeatures::Fraction(f) => (n_columns as f64 * f).ceil() as usize,
        MaxFeatures::Fixed(n) => n,
    };
    if resolved == 0 || resolved > n_columns {
        return Err(TreeError::InvalidMaxFeatures {
            max_features: resolved,
            n_columns,
        });
    }
    Ok(Some(resolved))
}

/// Draw `samples.len()` samples uniformly with replacement.
fn bootstrap_sample<'a>(samples: &'a [Sample], rng: &mut impl Rng) -> Vec<&'a Sample> {
    (0..samples.len())
        .map(|_| &samples[rng.gen_range(0..samples.len())])
        .collect()
}

/// Train the random forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = samples.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    samples: &[Sample],
    features: &[FeatureList],
) -> Result<TrainingResult, TreeError> {
    // --- Validate inputs ---
    if samples.is_empty() {
        return Err(TreeError::EmptyDataset);
    }
    let refs: Vec<&Sample> = samples.iter().collect();
    let n_labels = label_counts(&refs)?.len();

    // --- Validate config ---
    if !(config.homogeneity_threshold > 0.0 && config.homogeneity_threshold <= 1.0) {
        return Err(TreeError::InvalidHomogeneityThreshold {
            threshold: config.homogeneity_threshold,
        });
    }
    if let Some(d) = config.max_depth
        && d == 0
    {
        return Err(TreeError::InvalidMaxDepth { max_depth: 0 });
    }

    let n_columns = features
        .iter()
        .map(FeatureList::column)
        .collect::<BTreeSet<_>>()
        .len();
    let max_features_resolved = resolve_max_features(config.max_features, n_columns)?;
    if max_features_resolved.is_some() && config.max_subset_draws == 0 {
        return Err(TreeError::InvalidSubsetDraws);
    }

    info!(
        n_trees = config.n_trees,
        n_samples = samples.len(),
        n_labels,
        n_columns,
        max_features = max_features_resolved,
        bootstrap = config.bootstrap,
        "training random forest"
    );

    // Generate per-tree seeds from master RNG.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let tree_config = DecisionTreeConfig::new()
        .with_impurity(config.impurity)
        .with_search(config.search)
        .with_homogeneity_threshold(config.homogeneity_threshold)
        .with_max_depth(config.max_depth)
        .with_max_features(max_features_resolved)
        .with_max_subset_draws(config.max_subset_draws);
    let bootstrap = config.bootstrap;

    // Parallel tree training.
    let outcomes: Vec<Result<DecisionTree, TreeError>> = tree_seeds
        .into_par_iter()
        .enumerate()
        .map(|(tree_index, seed)| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let bag = if bootstrap {
                bootstrap_sample(samples, &mut rng)
            } else {
                refs.clone()
            };
            let tree = tree_config.clone().with_seed(rng.r#gen()).fit_refs(&bag, features);
            if let Ok(t) = &tree {
                debug!(tree_index, n_nodes = t.n_nodes(), depth = t.depth(), "tree trained");
            }
            tree
        })
        .collect();

    let mut trees = Vec::with_capacity(config.n_trees);
    for (tree_index, outcome) in outcomes.into_iter().enumerate() {
        match (outcome, config.failure_policy) {
            (Ok(tree), _) => trees.push(tree),
            (Err(e), TreeFailurePolicy::Abort) => return Err(e),
            (Err(e), TreeFailurePolicy::Skip) => {
                warn!(tree_index, error = %e, "tree failed to train, skipping");
            }
        }
    }

    if trees.is_empty() {
        return Err(TreeError::NoTreesTrained);
    }

    let metadata = TrainingMetadata {
        n_trees_requested: config.n_trees,
        n_trees_trained: trees.len(),
        n_samples: samples.len(),
        n_labels,
        n_columns,
        max_features_resolved,
        bootstrap,
    };

    info!(
        n_trees_trained = metadata.n_trees_trained,
        n_trees_failed = metadata.n_trees_failed(),
        "random forest training complete"
    );

    Ok(TrainingResult::new(RandomForest { trees }, metadata))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::feature::Comparator;
    use crate::sample::Label;

    /// Two columns; label is Up when x >= 10.
    fn make_separable_data() -> (Vec<Sample>, Vec<FeatureList>) {
        let mut samples = Vec::new();
        for i in 0..20 {
            let x = f64::from(i) * 0.5;
            samples.push(Sample::new([("x", x), ("y", f64::from(i % 4))], Label::new("Down")));
        }
        for i in 0..20 {
            let x = 10.0 + f64::from(i) * 0.5;
            samples.push(Sample::new([("x", x), ("y", f64::from(i % 4))], Label::new("Up")));
        }
        let xs: Vec<f64> = samples.iter().map(|s| s.numeric("x").unwrap()).collect();
        let lists = vec![
            FeatureList::from_values("x", Comparator::GreaterOrEqual, xs),
            FeatureList::from_values("y", Comparator::LessThan, (0..4).map(f64::from)),
        ];
        (samples, lists)
    }

    #[test]
    fn separable_data_high_training_accuracy() {
        let (samples, lists) = make_separable_data();
        let result = RandomForestConfig::new(15)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .with_seed(42)
            .fit(&samples, &lists)
            .unwrap();
        let forest = result.forest();
        assert_eq!(forest.n_trees(), 15);

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let correct = samples
            .iter()
            .filter(|s| forest.classify(s, &mut rng).unwrap() == *s.label().unwrap())
            .count();
        assert!(correct >= 36, "only {correct}/40 correct");
    }

    #[test]
    fn same_seed_same_forest() {
        let (samples, lists) = make_separable_data();
        let config = RandomForestConfig::new(8).unwrap().with_seed(7);
        let a = config.fit(&samples, &lists).unwrap().into_forest();
        let b = config.fit(&samples, &lists).unwrap().into_forest();
        assert_eq!(a, b);
    }

    #[test]
    fn metadata_reports_resolution() {
        let (samples, lists) = make_separable_data();
        let result = RandomForestConfig::new(3).unwrap().fit(&samples, &lists).unwrap();
        let meta = result.metadata();
        assert_eq!(meta.n_trees_requested, 3);
        assert_eq!(meta.n_trees_trained, 3);
        assert_eq!(meta.n_columns, 2);
        assert_eq!(meta.n_labels, 2);
        // floor(sqrt(2)) = 1
        assert_eq!(meta.max_features_resolved, Some(1));
    }

    #[test]
    fn resolve_max_features_cases() {
        assert_eq!(resolve_max_features(MaxFeatures::Sqrt, 10).unwrap(), Some(3));
        assert_eq!(resolve_max_features(MaxFeatures::Sqrt, 1).unwrap(), Some(1));
        assert_eq!(resolve_max_features(MaxFeatures::Log2, 10).unwrap(), Some(3));
        assert_eq!(resolve_max_features(MaxFeatures::Log2, 1).unwrap(), Some(1));
        assert_eq!(resolve_max_features(MaxFeatures::Fraction(0.5), 5).unwrap(), Some(3));
        assert_eq!(resolve_max_features(MaxFeatures::Fixed(4), 4).unwrap(), Some(4));
        assert_eq!(resolve_max_features(MaxFeatures::All, 4).unwrap(), None);
        assert_eq!(resolve_max_features(MaxFeatures::Sqrt, 0).unwrap(), None);
        assert!(matches!(
            resolve_max_features(MaxFeatures::Fixed(5), 4),
            Err(TreeError::InvalidMaxFeatures { max_features: 5, n_columns: 4 })
        ));
        assert!(matches!(
            resolve_max_features(MaxFeatures::Fixed(0), 4),
            Err(TreeError::InvalidMaxFeatures { max_features: 0, .. })
        ));
    }

    #[test]
    fn bootstrap_draws_with_replacement() {
        let samples: Vec<Sample> = (0..50)
            .map(|i| Sample::new([("x", f64::from(i))], Label::new("a")))
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let bag = bootstrap_sample(&samples, &mut rng);
        assert_eq!(bag.len(), 50);
        let distinct: BTreeSet<u64> = bag.iter().map(|s| s.numeric("x").unwrap() as u64).collect();
        assert!(distinct.len() < 50, "expected repeats in a bootstrap sample");
    }

    #[test]
    fn no_candidate_lists_give_plurality_stumps() {
        let samples = vec![
            Sample::new([("x", 0.0)], Label::new("Up")),
            Sample::new([("x", 1.0)], Label::new("Up")),
            Sample::new([("x", 2.0)], Label::new("Down")),
        ];
        let result = RandomForestConfig::new(3)
            .unwrap()
            .with_bootstrap(false)
            .fit(&samples, &[])
            .unwrap();
        assert_eq!(result.metadata().max_features_resolved, None);
        for tree in result.forest().trees() {
            assert_eq!(tree.n_nodes(), 1);
            assert_eq!(tree.root().label().unwrap().as_str(), "Up");
        }
    }

    #[test]
    fn zero_trees_rejected() {
        assert!(matches!(
            RandomForestConfig::new(0),
            Err(TreeError::InvalidTreeCount { n_trees: 0 })
        ));
    }

    #[test]
    fn empty_dataset_rejected() {
        let (_, lists) = make_separable_data();
        let err = RandomForestConfig::new(2).unwrap().fit(&[], &lists).unwrap_err();
        assert!(matches!(err, TreeError::EmptyDataset));
    }

    /// Mostly two labels, with one sample carrying a third.
    fn data_with_rare_third_label() -> (Vec<Sample>, Vec<FeatureList>) {
        let mut samples: Vec<Sample> = (0..19)
            .map(|i| {
                Sample::new(
                    [("x", f64::from(i))],
                    Label::new(if i < 10 { "Down" } else { "Up" }),
                )
            })
            .collect();
        samples.push(Sample::new([("x", 19.0)], Label::new("Flat")));
        let lists = vec![FeatureList::from_values("x", Comparator::LessThan, (0..20).map(f64::from))];
        (samples, lists)
    }

    #[test]
    fn abort_policy_surfaces_tree_error() {
        let (samples, lists) = data_with_rare_third_label();
        let err = RandomForestConfig::new(30)
            .unwrap()
            .with_bootstrap(false)
            .fit(&samples, &lists)
            .unwrap_err();
        assert!(matches!(err, TreeError::ImpurityInvariant { distinct_labels: 3 }));
    }

    #[test]
    fn skip_policy_drops_failed_trees() {
        let (samples, lists) = data_with_rare_third_label();
        let result = RandomForestConfig::new(30)
            .unwrap()
            .with_failure_policy(TreeFailurePolicy::Skip)
            .fit(&samples, &lists)
            .unwrap();
        let meta = result.metadata();
        assert!(meta.n_trees_trained > 0);
        assert!(meta.n_trees_trained < 30);
        assert_eq!(meta.n_trees_failed(), 30 - meta.n_trees_trained);
    }

    #[test]
    fn skip_policy_with_no_survivors() {
        let (samples, lists) = data_with_rare_third_label();
        let err = RandomForestConfig::new(4)
            .unwrap()
            .with_bootstrap(false)
            .with_failure_policy(TreeFailurePolicy::Skip)
            .fit(&samples, &lists)
            .unwrap_err();
        assert!(matches!(err, TreeError::NoTreesTrained));
    }

    #[test]
    fn from_trees_rejects_empty() {
        assert!(matches!(RandomForest::from_trees(vec![]), Err(TreeError::EmptyForest)));
    }
}
