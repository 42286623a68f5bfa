//! Binary-split decision trees and random forests over named-column samples.
//!
//! Trees split on single-column threshold features chosen by information
//! gain under binary entropy, found with a bisection search over each
//! column's sorted candidates. Forests add bootstrap sampling, random
//! per-split column subsets, parallel training via rayon, plurality voting
//! with random tie-breaks, JSON tree records, and bincode model files.

mod config;
mod confusion;
mod error;
mod feature;
mod forest;
mod node;
mod predict;
mod record;
mod result;
mod sample;
mod serialize;
mod split;
mod subspace;
mod tree;

pub use config::{MaxFeatures, RandomForestConfig, TreeFailurePolicy};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::TreeError;
pub use feature::{Comparator, Feature, FeatureList, Partition};
pub use forest::RandomForest;
pub use node::{Impurity, Node, NodeIndex};
pub use predict::{Evaluation, VoteTally};
pub use record::{NodeRecord, TreeRecord};
pub use result::{TrainingMetadata, TrainingResult};
pub use sample::{Label, Sample, Scalar};
pub use split::{ImpurityMethod, SearchStrategy};
pub use tree::{DecisionTree, DecisionTreeConfig};
