//! Random column subsets drawn per split for random-forest trees.

use std::collections::BTreeSet;

use rand::Rng;
use tracing::debug;

use crate::error::TreeError;
use crate::feature::FeatureList;
use crate::sample::Sample;
use crate::split::{ImpurityMethod, SearchStrategy, SplitChoice, select_best_split};

/// Restricts each split search to a random subset of columns.
///
/// The column universe is every column named by the candidate lists handed
/// to the tree at its root, including columns whose lists are empty or
/// become empty during growth.
#[derive(Debug, Clone)]
pub(crate) struct ColumnSampler {
    columns: Vec<String>,
    max_columns: usize,
    max_draws: usize,
}

impl ColumnSampler {
    /// Build a sampler over the distinct columns of `lists`, in first-seen order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::InvalidMaxFeatures`] | `max_columns` is 0 or exceeds the column count |
    /// | [`TreeError::InvalidSubsetDraws`] | `max_draws` is 0 |
    pub(crate) fn new(
        lists: &[FeatureList],
        max_columns: usize,
        max_draws: usize,
    ) -> Result<Self, TreeError> {
        let mut columns: Vec<String> = Vec::new();
        for list in lists {
            if !columns.iter().any(|c| c == list.column()) {
                columns.push(list.column().to_string());
            }
        }
        if max_columns == 0 || max_columns > columns.len() {
            return Err(TreeError::InvalidMaxFeatures {
                max_features: max_columns,
                n_columns: columns.len(),
            });
        }
        if max_draws == 0 {
            return Err(TreeError::InvalidSubsetDraws);
        }
        Ok(Self {
            columns,
            max_columns,
            max_draws,
        })
    }

    /// Draw `k` uniformly from `[1, max_columns]`, then `k` distinct columns
    /// by rejection sampling.
    pub(crate) fn draw<'c>(&'c self, rng: &mut impl Rng) -> BTreeSet<&'c str> {
        let k = rng.gen_range(1..=self.max_columns);
        let mut chosen = BTreeSet::new();
        while chosen.len() < k {
            let pick = rng.gen_range(0..self.columns.len());
            chosen.insert(self.columns[pick].as_str());
        }
        chosen
    }

    /// Split search restricted to a freshly drawn column subset.
    ///
    /// A subset whose lists are all empty yields nothing, so the whole draw
    /// is repeated, up to `max_draws` attempts.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::SubsetDrawsExhausted`] when every attempt comes up
    /// empty, and propagates errors from split search.
    pub(crate) fn select<'f>(
        &self,
        samples: &[&Sample],
        lists: &'f [FeatureList],
        method: ImpurityMethod,
        strategy: SearchStrategy,
        rng: &mut impl Rng,
    ) -> Result<SplitChoice<'f>, TreeError> {
        for attempt in 1..=self.max_draws {
            let subset = self.draw(rng);
            let restricted: Vec<&FeatureList> = lists
                .iter()
                .filter(|list| subset.contains(list.column()))
                .collect();
            if let Some(choice) = select_best_split(samples, &restricted, method, strategy)? {
                return Ok(choice);
            }
            debug!(attempt, subset_size = subset.len(), "column subset had no candidates, redrawing");
        }
        Err(TreeError::SubsetDrawsExhausted {
            attempts: self.max_draws,
        })
    }
}
