use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    TreeError,
    feature::FeatureList,
    node::{Node, NodeIndex},
    sample::{Label, Sample, label_counts, plurality_label},
    split::{ImpurityMethod, SearchStrategy, SplitChoice, select_best_split},
    subspace::ColumnSampler,
};

/// Configuration for a single decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter               | Default                      |
/// |-------------------------|------------------------------|
/// | `impurity`              | `Entropy`                    |
/// | `search`                | `Bisection`                  |
/// | `homogeneity_threshold` | 1.0                          |
/// | `max_depth`             | `None` (unlimited)           |
/// | `max_features`          | `None` (every column, every split) |
/// | `max_subset_draws`      | 1000                         |
/// | `seed`                  | 42                           |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) impurity: ImpurityMethod,
    pub(crate) search: SearchStrategy,
    pub(crate) homogeneity_threshold: f64,
    pub(crate) max_depth: Option<usize>,
    pub(crate) max_features: Option<usize>,
    pub(crate) max_subset_draws: usize,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    ///
    /// All parameters use the defaults shown in the struct-level documentation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            impurity: ImpurityMethod::Entropy,
            search: SearchStrategy::Bisection,
            homogeneity_threshold: 1.0,
            max_depth: None,
            max_features: None,
            max_subset_draws: 1000,
            seed: 42,
        }
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

    /// Set the label share at or above which a node becomes a leaf.
    #[must_use]
    pub fn with_homogeneity_threshold(mut self, homogeneity_threshold: f64) -> Self {
        self.homogeneity_threshold = homogeneity_threshold;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// The root is at depth 1, so `Some(1)` yields a single leaf.
    /// `None` grows until every node is homogeneous or out of candidates.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Restrict every split to a random subset of at most this many columns.
    ///
    /// `None` searches every column at every split.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
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

    /// Return the homogeneity threshold.
    #[must_use]
    pub fn homogeneity_threshold(&self) -> f64 {
        self.homogeneity_threshold
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the per-split column limit, if set.
    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
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

    /// Grow a decision tree from labeled samples and per-column candidate lists.
    ///
    /// # Errors
    ///
    /// | Variant                                  | When                                              |
    /// |------------------------------------------|---------------------------------------------------|
    /// | [`TreeError::EmptyDataset`]              | `samples` is empty                                |
    /// | [`TreeError::MissingLabel`]              | a sample has no label                             |
    /// | [`TreeError::InvalidHomogeneityThreshold`] | threshold outside (0.0, 1.0]                    |
    /// | [`TreeError::InvalidMaxDepth`]           | `max_depth` is `Some(0)`                          |
    /// | [`TreeError::InvalidMaxFeatures`]        | `max_features` outside [1, distinct columns]      |
    /// | [`TreeError::InvalidSubsetDraws`]        | `max_subset_draws` is 0 with `max_features` set   |
    /// | [`TreeError::ImpurityInvariant`]         | more than two distinct labels reach a split       |
    /// | [`TreeError::MissingValue`]              | a feature tests a column a sample lacks           |
    /// | [`TreeError::NonNumericValue`]           | a tested value does not parse as a number         |
    /// | [`TreeError::SubsetDrawsExhausted`]      | random column subsets kept coming up empty        |
    pub fn fit(&self, samples: &[Sample], features: &[FeatureList]) -> Result<DecisionTree, TreeError> {
        let refs: Vec<&Sample> = samples.iter().collect();
        self.fit_refs(&refs, features)
    }

    /// [`fit`](Self::fit) over borrowed samples, as drawn by bootstrap sampling.
    #[instrument(skip_all, fields(n_samples = samples.len(), n_lists = features.len()))]
    pub(crate) fn fit_refs(
        &self,
        samples: &[&Sample],
        features: &[FeatureList],
    ) -> Result<DecisionTree, TreeError> {
        // --- Validate inputs ---
        if samples.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        let counts = label_counts(samples)?;

        // --- Validate config ---
        if !(self.homogeneity_threshold > 0.0 && self.homogeneity_threshold <= 1.0) {
            return Err(TreeError::InvalidHomogeneityThreshold {
                threshold: self.homogeneity_threshold,
            });
        }

        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(TreeError::InvalidMaxDepth { max_depth: 0 });
        }

        let sampler = self
            .max_features
            .map(|k| ColumnSampler::new(features, k, self.max_subset_draws))
            .transpose()?;

        debug!(
            n_samples = samples.len(),
            n_labels = counts.len(),
            n_candidates = features.iter().map(FeatureList::len).sum::<usize>(),
            max_features = self.max_features,
            "fitting decision tree"
        );

        let mut grower = Grower {
            config: self,
            sampler,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            arena: Vec::new(),
        };
        let root = grower.grow(samples, features, 1)?;

        debug!(
            root_index = root.index(),
            n_nodes = grower.arena.len(),
            "decision tree built"
        );

        Ok(DecisionTree {
            nodes: grower.arena,
            impurity: self.impurity,
            homogeneity_threshold: self.homogeneity_threshold,
            max_depth: self.max_depth,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursive growth state: the arena being filled and the split RNG.
struct Grower<'c> {
    config: &'c DecisionTreeConfig,
    sampler: Option<ColumnSampler>,
    rng: ChaCha8Rng,
    arena: Vec<Node>,
}

impl Grower<'_> {
    /// Grow the subtree for a non-empty sample set at `depth` (root is 1).
    ///
    /// Returns the [`NodeIndex`] of the node just created in the arena.
    fn grow(
        &mut self,
        samples: &[&Sample],
        lists: &[FeatureList],
        depth: usize,
    ) -> Result<NodeIndex, TreeError> {
        let n_samples = samples.len();
        let counts = label_counts(samples)?;

        if let Some(label) = homogeneous_label(&counts, n_samples, self.config.homogeneity_threshold) {
            return Ok(self.push_leaf(label.clone(), n_samples));
        }

        let plurality = plurality_label(&counts).ok_or(TreeError::EmptyDataset)?.clone();

        let exhausted = lists.iter().all(FeatureList::is_empty);
        let depth_reached = self.config.max_depth.is_some_and(|max_d| depth >= max_d);
        if exhausted || depth_reached {
            return Ok(self.push_leaf(plurality, n_samples));
        }

        let choice = self.select_split(samples, lists)?;
        let feature = choice.feature.clone();
        let partition = feature.split(samples)?;
        let child_lists: Vec<FeatureList> =
            lists.iter().map(|l| l.reduced_after(&feature)).collect();

        debug!(
            depth,
            n_samples,
            feature = feature.display_name(),
            gain = choice.gain,
            n_has = partition.has.len(),
            n_lacks = partition.lacks.len(),
            "split chosen"
        );

        // Arena pattern: reserve index, recurse, then overwrite with the split.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            label: plurality.clone(),
            n_samples,
        });

        let has = self.grow_child(&partition.has, &child_lists, depth + 1, &plurality)?;
        let lacks = self.grow_child(&partition.lacks, &child_lists, depth + 1, &plurality)?;

        self.arena[node_idx] = Node::Internal {
            feature,
            has,
            lacks,
            n_samples,
        };

        Ok(NodeIndex::new(node_idx))
    }

    /// An empty partition becomes a leaf carrying the parent's plurality label.
    fn grow_child(
        &mut self,
        samples: &[&Sample],
        lists: &[FeatureList],
        depth: usize,
        parent_plurality: &Label,
    ) -> Result<NodeIndex, TreeError> {
        if samples.is_empty() {
            return Ok(self.push_leaf(parent_plurality.clone(), 0));
        }
        self.grow(samples, lists, depth)
    }

    fn select_split<'f>(
        &mut self,
        samples: &[&Sample],
        lists: &'f [FeatureList],
    ) -> Result<SplitChoice<'f>, TreeError> {
        let impurity = self.config.impurity;
        let search = self.config.search;
        match &self.sampler {
            Some(sampler) => sampler.select(samples, lists, impurity, search, &mut self.rng),
            None => {
                let all: Vec<&FeatureList> = lists.iter().collect();
                select_best_split(samples, &all, impurity, search)?.ok_or(TreeError::NoUsableSplit)
            }
        }
    }

    fn push_leaf(&mut self, label: Label, n_samples: usize) -> NodeIndex {
        let idx = self.arena.len();
        self.arena.push(Node::Leaf { label, n_samples });
        NodeIndex::new(idx)
    }
}

/// A label whose share reaches `threshold`, if any.
///
/// With a threshold at or below one half, several labels can qualify; the
/// most frequent wins, then the smallest label.
fn homogeneous_label<'a>(
    counts: &BTreeMap<&'a Label, usize>,
    n_samples: usize,
    threshold: f64,
) -> Option<&'a Label> {
    counts
        .iter()
        .filter(|&(_, &count)| count as f64 / n_samples as f64 >= threshold)
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(label, _)| *label)
}

/// A fitted binary decision tree.
///
/// Stored as an arena-based `Vec<Node>` with the root at index 0. Nodes
/// are immutable once growth finishes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) impurity: ImpurityMethod,
    pub(crate) homogeneity_threshold: f64,
    pub(crate) max_depth: Option<usize>,
}

impl DecisionTree {
    /// Classify a sample by walking from the root to a leaf.
    ///
    /// At each internal node the `has` branch is taken when the sample has
    /// the node's feature, the `lacks` branch otherwise. The sample's own
    /// label, if any, is ignored.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::MissingValue`] | a tested column is absent from the sample |
    /// | [`TreeError::NonNumericValue`] | a tested value does not parse as a number |
    pub fn classify(&self, sample: &Sample) -> Result<&Label, TreeError> {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { label, .. } => return Ok(label),
                Node::Internal {
                    feature, has, lacks, ..
                } => {
                    idx = if feature.evaluate(sample)? {
                        has.index()
                    } else {
                        lacks.index()
                    };
                }
            }
        }
    }

    /// Every internal node's children must come after it and inside the
    /// arena. Trees grown by `fit` or rebuilt from records always pass;
    /// decoded arenas may not, and walking one that fails could loop or
    /// index out of bounds.
    pub(crate) fn check_arena(&self, tree_index: usize) -> Result<(), TreeError> {
        let n_nodes = self.nodes.len();
        if n_nodes == 0 {
            return Err(TreeError::EmptyTree { tree_index });
        }
        for (node, entry) in self.nodes.iter().enumerate() {
            let Some((has, lacks)) = entry.children() else {
                continue;
            };
            if let Some(child) = [has.index(), lacks.index()]
                .into_iter()
                .find(|&child| child <= node || child >= n_nodes)
            {
                return Err(TreeError::InvalidChildIndex {
                    tree_index,
                    node,
                    child,
                    n_nodes,
                });
            }
        }
        Ok(())
    }

    /// Return the root node.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Return the node at `index`, if it exists.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index.index())
    }

    /// Return every node in arena order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the impurity measure the tree was grown with.
    #[must_use]
    pub fn impurity(&self) -> ImpurityMethod {
        self.impurity
    }

    /// Return the homogeneity threshold the tree was grown with.
    #[must_use]
    pub fn homogeneity_threshold(&self) -> f64 {
        self.homogeneity_threshold
    }

    /// Return the depth limit the tree was grown with.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the total number of nodes in the tree (both internal nodes and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the number of levels; a lone root leaf has depth 1.
    ///
    /// Uses BFS over the arena.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut queue = VecDeque::from([(0usize, 1usize)]);
        while let Some((idx, d)) = queue.pop_front() {
            max_depth = max_depth.max(d);
            if let Some((has, lacks)) = self.nodes[idx].children() {
                queue.push_back((has.index(), d + 1));
                queue.push_back((lacks.index(), d + 1));
            }
        }
        max_depth
    }

    fn write_branch(
        &self,
        f: &mut fmt::Formatter<'_>,
        idx: NodeIndex,
        upper: bool,
        indent: &str,
    ) -> fmt::Result {
        let node = &self.nodes[idx.index()];
        let (above, below) = if upper {
            ("        ", " |      ")
        } else {
            (" |      ", "        ")
        };
        if let Some((has, _)) = node.children() {
            self.write_branch(f, has, true, &format!("{indent}{above}"))?;
        }
        let stem = if upper { " /" } else { " \\" };
        writeln!(f, "{indent}{stem}----- {}", node.name())?;
        if let Some((_, lacks)) = node.children() {
            self.write_branch(f, lacks, false, &format!("{indent}{below}"))?;
        }
        Ok(())
    }
}

/// Sideways rendering: the `has` subtree above its parent, `lacks` below.
impl fmt::Display for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root();
        if let Some((has, _)) = root.children() {
            self.write_branch(f, has, true, "")?;
        }
        writeln!(f, "{}", root.name())?;
        if let Some((_, lacks)) = root.children() {
            self.write_branch(f, lacks, false, "")?;
        }
        Ok(())
    }
}
