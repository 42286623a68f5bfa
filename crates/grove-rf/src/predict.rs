//! Ensemble voting: tallies, plurality classification, and evaluation.

use std::collections::BTreeMap;

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::confusion::ConfusionMatrix;
use crate::error::TreeError;
use crate::forest::RandomForest;
use crate::sample::{Label, Sample};

/// How many trees voted for each label on one sample.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VoteTally {
    counts: BTreeMap<Label, usize>,
}

impl VoteTally {
    /// Return per-label vote counts in canonical label order.
    #[must_use]
    pub fn counts(&self) -> &BTreeMap<Label, usize> {
        &self.counts
    }

    /// Return the votes cast for `label`.
    #[must_use]
    pub fn count(&self, label: &Label) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Return the total number of votes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Return every label sharing the highest count, in canonical order.
    #[must_use]
    pub fn leaders(&self) -> Vec<&Label> {
        let top = self.counts.values().copied().max().unwrap_or(0);
        self.counts
            .iter()
            .filter(|&(_, &c)| c == top)
            .map(|(label, _)| label)
            .collect()
    }

    /// Pick the plurality label, choosing uniformly among tied leaders.
    ///
    /// With two leaders this is a fair coin flip. Returns `None` for an
    /// empty tally.
    pub fn winner(&self, rng: &mut impl Rng) -> Option<&Label> {
        self.leaders().choose(rng).copied()
    }
}

/// Outcome of classifying a labeled evaluation set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Evaluation {
    /// Predictions matching the true label.
    pub correct: usize,
    /// Samples evaluated.
    pub total: usize,
    /// `correct / total` as a fraction in [0, 1].
    pub accuracy: f64,
    /// Full confusion matrix.
    pub confusion: ConfusionMatrix,
}

impl RandomForest {
    /// Collect one vote per tree for `sample`.
    ///
    /// # Errors
    ///
    /// Propagates [`TreeError::MissingValue`] or [`TreeError::NonNumericValue`]
    /// from tree traversal.
    pub fn votes(&self, sample: &Sample) -> Result<VoteTally, TreeError> {
        let mut counts = BTreeMap::new();
        for tree in &self.trees {
            *counts.entry(tree.classify(sample)?.clone()).or_insert(0) += 1;
        }
        Ok(VoteTally { counts })
    }

    /// Classify `sample` by plurality vote, breaking ties with `rng`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::EmptyForest`] | the forest holds no trees |
    /// | [`TreeError::MissingValue`] | a tested column is absent from the sample |
    /// | [`TreeError::NonNumericValue`] | a tested value does not parse as a number |
    pub fn classify(&self, sample: &Sample, rng: &mut impl Rng) -> Result<Label, TreeError> {
        self.votes(sample)?
            .winner(rng)
            .cloned()
            .ok_or(TreeError::EmptyForest)
    }

    /// Classify many samples in parallel.
    ///
    /// Sample `i` breaks ties with its own ChaCha8 stream `i` under `seed`,
    /// so results do not depend on thread scheduling.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`RandomForest::classify`].
    pub fn classify_batch(&self, samples: &[Sample], seed: u64) -> Result<Vec<Label>, TreeError> {
        Ok(self
            .predict_batch(samples, seed)?
            .into_iter()
            .map(|(label, _)| label)
            .collect())
    }

    /// Like [`RandomForest::classify_batch`], but keeps each sample's tally
    /// next to its label. Every tree runs once per sample.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`RandomForest::classify`].
    #[instrument(skip(self, samples), fields(n_samples = samples.len(), n_trees = self.trees.len()))]
    pub fn predict_batch(
        &self,
        samples: &[Sample],
        seed: u64,
    ) -> Result<Vec<(Label, VoteTally)>, TreeError> {
        samples
            .par_iter()
            .enumerate()
            .map(|(i, sample)| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(i as u64);
                let tally = self.votes(sample)?;
                let label = tally.winner(&mut rng).cloned().ok_or(TreeError::EmptyForest)?;
                Ok((label, tally))
            })
            .collect()
    }

    /// Classify labeled samples and score the predictions.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::EmptyDataset`] | `samples` is empty |
    /// | [`TreeError::MissingLabel`] | a sample has no label |
    /// | any classification error | see [`RandomForest::classify`] |
    pub fn evaluate(&self, samples: &[Sample], seed: u64) -> Result<Evaluation, TreeError> {
        if samples.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        let truth: Vec<&Label> = samples
            .iter()
            .enumerate()
            .map(|(sample_index, s)| s.label().ok_or(TreeError::MissingLabel { sample_index }))
            .collect::<Result<_, _>>()?;
        let predicted = self.classify_batch(samples, seed)?;

        let confusion = ConfusionMatrix::from_pairs(truth.iter().copied().zip(predicted.iter()))?;
        let evaluation = Evaluation {
            correct: confusion.correct(),
            total: confusion.total(),
            accuracy: confusion.accuracy(),
            confusion,
        };
        debug!(
            correct = evaluation.correct,
            total = evaluation.total,
            accuracy = evaluation.accuracy,
            "forest evaluated"
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Comparator, Feature, FeatureList};
    use crate::tree::{DecisionTree, DecisionTreeConfig};

    fn stump(label_when_has: &str, label_when_lacks: &str) -> DecisionTree {
        let data = vec![
            Sample::new([("x", 1.0)], Label::new(label_when_has)),
            Sample::new([("x", 0.0)], Label::new(label_when_lacks)),
        ];
        let lists =
            vec![FeatureList::new("x", vec![Feature::new("x", Comparator::GreaterOrEqual, 1.0)]).unwrap()];
        DecisionTreeConfig::new().fit(&data, &lists).unwrap()
    }

    #[test]
    fn unanimous_vote() {
        let forest = RandomForest::from_trees(vec![stump("Up", "Down"), stump("Up", "Down")]).unwrap();
        let s = Sample::unlabeled([("x", 2.0)]);
        let tally = forest.votes(&s).unwrap();
        assert_eq!(tally.count(&Label::new("Up")), 2);
        assert_eq!(tally.total(), 2);

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(forest.classify(&s, &mut rng).unwrap().as_str(), "Up");
    }

    #[test]
    fn plurality_beats_minority() {
        let forest = RandomForest::from_trees(vec![
            stump("Up", "Down"),
            stump("Up", "Down"),
            stump("Down", "Up"),
        ])
        .unwrap();
        let s = Sample::unlabeled([("x", 5.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(forest.classify(&s, &mut rng).unwrap().as_str(), "Up");
        }
    }

    #[test]
    fn two_way_tie_is_a_fair_coin() {
        let forest = RandomForest::from_trees(vec![stump("Up", "Down"), stump("Down", "Up")]).unwrap();
        let s = Sample::unlabeled([("x", 1.0)]);
        let tally = forest.votes(&s).unwrap();
        assert_eq!(tally.leaders().len(), 2);

        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let ups = (0..10_000)
            .filter(|_| forest.classify(&s, &mut rng).unwrap().as_str() == "Up")
            .count();
        // 10k fair flips: mean 5000, sd 50.
        assert!((4700..=5300).contains(&ups), "ups = {ups}");
    }

    #[test]
    fn batch_is_deterministic_per_seed() {
        let forest = RandomForest::from_trees(vec![stump("Up", "Down"), stump("Down", "Up")]).unwrap();
        let samples: Vec<Sample> = (0..64).map(|i| Sample::unlabeled([("x", f64::from(i % 2))])).collect();
        let a = forest.classify_batch(&samples, 5).unwrap();
        let b = forest.classify_batch(&samples, 5).unwrap();
        assert_eq!(a, b);
        // Independent streams: a 64-way tie should not resolve identically.
        assert!(a.iter().any(|l| l.as_str() == "Up"));
        assert!(a.iter().any(|l| l.as_str() == "Down"));
    }

    #[test]
    fn batch_keeps_tallies_beside_labels() {
        let forest = RandomForest::from_trees(vec![
            stump("Up", "Down"),
            stump("Down", "Up"),
            stump("Up", "Up"),
        ])
        .unwrap();
        let samples: Vec<Sample> = (0..32).map(|i| Sample::unlabeled([("x", f64::from(i % 3))])).collect();
        let pairs = forest.predict_batch(&samples, 9).unwrap();
        let labels = forest.classify_batch(&samples, 9).unwrap();
        assert_eq!(pairs.len(), samples.len());
        for ((sample, (label, tally)), expected) in samples.iter().zip(&pairs).zip(&labels) {
            assert_eq!(label, expected);
            assert_eq!(tally, &forest.votes(sample).unwrap());
            assert_eq!(tally.total(), 3);
        }
    }

    #[test]
    fn evaluation_counts_correct_predictions() {
        let forest = RandomForest::from_trees(vec![stump("Up", "Down")]).unwrap();
        let samples = vec![
            Sample::new([("x", 1.0)], Label::new("Up")),
            Sample::new([("x", 0.0)], Label::new("Down")),
            Sample::new([("x", 0.0)], Label::new("Up")),
            Sample::new([("x", 3.0)], Label::new("Up")),
        ];
        let eval = forest.evaluate(&samples, 0).unwrap();
        assert_eq!(eval.correct, 3);
        assert_eq!(eval.total, 4);
        assert!((eval.accuracy - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn evaluation_requires_labels() {
        let forest = RandomForest::from_trees(vec![stump("Up", "Down")]).unwrap();
        let samples = vec![Sample::unlabeled([("x", 1.0)])];
        assert!(matches!(
            forest.evaluate(&samples, 0),
            Err(TreeError::MissingLabel { sample_index: 0 })
        ));
    }

    #[test]
    fn missing_column_propagates() {
        let forest = RandomForest::from_trees(vec![stump("Up", "Down")]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = forest.classify(&Sample::unlabeled([("z", 1.0)]), &mut rng).unwrap_err();
        assert!(matches!(err, TreeError::MissingValue { .. }));
    }
}
