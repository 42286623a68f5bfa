use crate::error::TreeError;
use crate::feature::{Feature, FeatureList, Partition};
use crate::node::Impurity;
use crate::sample::{Sample, label_counts};

/// Above this many samples the two child impurities are scored with `rayon::join`.
const PARALLEL_MIN_SAMPLES: usize = 4096;

/// Measure of how mixed the labels of a sample set are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ImpurityMethod {
    /// Binary Shannon entropy in bits: `-p·log2(p) - (1-p)·log2(1-p)`.
    #[default]
    Entropy,
}

impl ImpurityMethod {
    /// Compute the impurity of a labeled sample set.
    ///
    /// With one distinct label the result is 0. With two, `p` is the share
    /// of the smaller label in canonical order; the result is symmetric in
    /// `p` so the orientation does not change its value.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::ImpurityInvariant`] | zero samples, or more than two distinct labels |
    /// | [`TreeError::MissingLabel`] | a sample is unlabeled |
    pub fn impurity(&self, samples: &[&Sample]) -> Result<Impurity, TreeError> {
        match self {
            ImpurityMethod::Entropy => binary_entropy(samples),
        }
    }
}

fn binary_entropy(samples: &[&Sample]) -> Result<Impurity, TreeError> {
    let counts = label_counts(samples)?;
    match counts.len() {
        1 => Ok(Impurity::new(0.0)),
        2 => {
            let first = counts.values().next().copied().unwrap_or(0);
            let p = first as f64 / samples.len() as f64;
            Ok(Impurity::new(-(plogp(p) + plogp(1.0 - p))))
        }
        distinct_labels => Err(TreeError::ImpurityInvariant { distinct_labels }),
    }
}

/// `p·log2(p)`, taking `0·log2(0)` as 0.
fn plogp(p: f64) -> f64 {
    if p > 0.0 { p * p.log2() } else { 0.0 }
}

/// How split search walks each column's candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum SearchStrategy {
    /// Binary search over the sorted list, assuming gain is unimodal in the
    /// threshold, with one inverted retry. Evaluates `O(log n)` candidates
    /// per column and can miss the true maximum.
    #[default]
    Bisection,
    /// Evaluate every candidate.
    Exhaustive,
}

/// The best feature found by split search and its information gain.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitChoice<'f> {
    pub(crate) feature: &'f Feature,
    pub(crate) gain: f64,
}

/// Information gain of splitting `samples` on `feature`.
///
/// Gain is the parent impurity minus the unweighted mean impurity of the
/// non-empty children. An empty side is left out of the mean.
pub(crate) fn information_gain(
    feature: &Feature,
    samples: &[&Sample],
    method: ImpurityMethod,
    parent: Impurity,
) -> Result<f64, TreeError> {
    let partition = feature.split(samples)?;
    Ok(parent.value() - children_impurity(&partition, method)?)
}

fn children_impurity(partition: &Partition<'_>, method: ImpurityMethod) -> Result<f64, TreeError> {
    let score = |side: &[&Sample]| -> Result<Option<f64>, TreeError> {
        if side.is_empty() {
            return Ok(None);
        }
        method.impurity(side).map(|imp| Some(imp.value()))
    };

    let (has, lacks) = if partition.has.len() + partition.lacks.len() >= PARALLEL_MIN_SAMPLES {
        rayon::join(|| score(&partition.has), || score(&partition.lacks))
    } else {
        (score(&partition.has), score(&partition.lacks))
    };

    let scored: Vec<f64> = [has?, lacks?].into_iter().flatten().collect();
    if scored.is_empty() {
        return Err(TreeError::EmptyDataset);
    }
    Ok(scored.iter().sum::<f64>() / scored.len() as f64)
}

/// Gain a candidate must beat to count as an improvement. Just below zero,
/// so a zero-gain split still qualifies but a harmful one does not.
const GAIN_FLOOR: f64 = -f64::MIN_POSITIVE;

/// Search `lists` for the feature with the highest information gain.
///
/// Columns are visited in the order given, and the running best carries
/// over from one column to the next. A candidate replaces the best only on
/// strictly greater gain, so ties keep the first maximizer found. If no
/// candidate of the first searched column beats [`GAIN_FLOOR`], that
/// column's starting candidate is kept as a fallback, and later columns
/// still compete against the floor. Empty lists are skipped; `None` means
/// no candidate was evaluated.
pub(crate) fn select_best_split<'f>(
    samples: &[&Sample],
    lists: &[&'f FeatureList],
    method: ImpurityMethod,
    strategy: SearchStrategy,
) -> Result<Option<SplitChoice<'f>>, TreeError> {
    let parent = method.impurity(samples)?;
    let mut search = Search {
        samples,
        method,
        parent,
        floor: GAIN_FLOOR,
        best: None,
    };
    for &list in lists {
        if list.is_empty() {
            continue;
        }
        match strategy {
            SearchStrategy::Bisection => search.bisect(list.features())?,
            SearchStrategy::Exhaustive => search.scan(list.features())?,
        }
    }
    Ok(search.best)
}

/// Which half a bisection pass keeps after an improving candidate.
#[derive(Debug, Clone, Copy)]
enum Lean {
    Lower,
    Upper,
}

struct Search<'s, 'a, 'f> {
    samples: &'s [&'a Sample],
    method: ImpurityMethod,
    parent: Impurity,
    /// Gain of the best scored candidate, or [`GAIN_FLOOR`].
    floor: f64,
    best: Option<SplitChoice<'f>>,
}

impl<'f> Search<'_, '_, 'f> {
    /// Score `feature` and keep it if it beats the running best.
    fn offer(&mut self, feature: &'f Feature) -> Result<bool, TreeError> {
        let gain = information_gain(feature, self.samples, self.method, self.parent)?;
        let improves = gain > self.floor;
        if improves {
            self.floor = gain;
            self.best = Some(SplitChoice { feature, gain });
        }
        Ok(improves)
    }

    /// Keep `feature` when nothing has beaten the floor yet. The floor is
    /// left alone so later candidates compete against it, not the fallback.
    fn fall_back_to(&mut self, feature: &'f Feature) -> Result<(), TreeError> {
        if self.best.is_none() {
            let gain = information_gain(feature, self.samples, self.method, self.parent)?;
            self.best = Some(SplitChoice { feature, gain });
        }
        Ok(())
    }

    fn scan(&mut self, features: &'f [Feature]) -> Result<(), TreeError> {
        for feature in features {
            self.offer(feature)?;
        }
        self.fall_back_to(&features[0])
    }

    /// Two-pass bisection over one column's sorted candidates.
    ///
    /// The first pass moves toward lower thresholds after an improvement.
    /// If it never improves anywhere but the starting midpoint, a second
    /// pass runs with the direction inverted.
    fn bisect(&mut self, features: &'f [Feature]) -> Result<(), TreeError> {
        let moved = self.bisect_pass(features, Lean::Lower)?;
        self.fall_back_to(&features[(features.len() - 1) / 2])?;
        if !moved {
            self.bisect_pass(features, Lean::Upper)?;
        }
        Ok(())
    }

    /// Returns `true` if an improvement happened away from the starting midpoint.
    fn bisect_pass(&mut self, features: &'f [Feature], lean: Lean) -> Result<bool, TreeError> {
        let start = (features.len() - 1) / 2;
        let mut moved = false;
        // Half-open window [low, high).
        let (mut low, mut high) = (0, features.len());
        while low < high {
            let mid = low + (high - 1 - low) / 2;
            let improved = self.offer(&features[mid])?;
            if improved && mid != start {
                moved = true;
            }
            match (improved, lean) {
                (true, Lean::Lower) | (false, Lean::Upper) => high = mid,
                (false, Lean::Lower) | (true, Lean::Upper) => low = mid + 1,
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Comparator;
    use crate::sample::Label;

    fn labeled(x: f64, label: &str) -> Sample {
        Sample::new([("x", x)], Label::new(label))
    }

    fn refs(samples: &[Sample]) -> Vec<&Sample> {
        samples.iter().collect()
    }

    #[test]
    fn entropy_pure() {
        let s = [labeled(0.0, "Up"), labeled(1.0, "Up")];
        let imp = ImpurityMethod::Entropy.impurity(&refs(&s)).unwrap();
        assert!(imp.value().abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_binary_balanced() {
        let s = [labeled(0.0, "Up"), labeled(1.0, "Down")];
        let imp = ImpurityMethod::Entropy.impurity(&refs(&s)).unwrap();
        assert!((imp.value() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn entropy_one_in_four() {
        let s = [
            labeled(0.0, "Up"),
            labeled(1.0, "Down"),
            labeled(2.0, "Down"),
            labeled(3.0, "Down"),
        ];
        let expected = -(0.25f64 * 0.25f64.log2() + 0.75 * 0.75f64.log2());
        let imp = ImpurityMethod::Entropy.impurity(&refs(&s)).unwrap();
        assert!((imp.value() - expected).abs() < 1e-12);
    }

    #[test]
    fn entropy_stays_in_unit_interval() {
        for up in 0..=10 {
            let s: Vec<Sample> = (0..10)
                .map(|i| labeled(i as f64, if i < up { "Up" } else { "Down" }))
                .collect();
            let v = ImpurityMethod::Entropy.impurity(&refs(&s)).unwrap().value();
            if up == 0 || up == 10 {
                assert!(v.abs() < f64::EPSILON, "up={up} entropy={v}");
            } else {
                assert!(v > 0.0 && v <= 1.0, "up={up} entropy={v}");
            }
        }
    }

    #[test]
    fn entropy_rejects_three_labels() {
        let s = [labeled(0.0, "a"), labeled(1.0, "b"), labeled(2.0, "c")];
        let err = ImpurityMethod::Entropy.impurity(&refs(&s)).unwrap_err();
        assert!(matches!(err, TreeError::ImpurityInvariant { distinct_labels: 3 }));
    }

    #[test]
    fn entropy_rejects_empty_set() {
        let err = ImpurityMethod::Entropy.impurity(&[]).unwrap_err();
        assert!(matches!(err, TreeError::ImpurityInvariant { distinct_labels: 0 }));
    }

    #[test]
    fn empty_child_is_left_out_of_the_mean() {
        let s = [labeled(0.0, "Up"), labeled(1.0, "Down")];
        let r = refs(&s);
        let parent = ImpurityMethod::Entropy.impurity(&r).unwrap();
        let nothing_below = Feature::new("x", Comparator::LessThan, -5.0);
        let gain = information_gain(&nothing_below, &r, ImpurityMethod::Entropy, parent).unwrap();
        assert!(gain.abs() < 1e-12);

        let separating = Feature::new("x", Comparator::LessThan, 0.5);
        let gain = information_gain(&separating, &r, ImpurityMethod::Entropy, parent).unwrap();
        assert!((gain - 1.0).abs() < 1e-12);
    }

    fn step_data() -> Vec<Sample> {
        // Down below 4.0, Up from 4.0 on.
        (0..8)
            .map(|i| labeled(i as f64, if i < 4 { "Down" } else { "Up" }))
            .collect()
    }

    #[test]
    fn exhaustive_finds_the_separating_threshold() {
        let data = step_data();
        let r = refs(&data);
        let list = FeatureList::from_values("x", Comparator::LessThan, (0..8).map(f64::from));
        let best = select_best_split(&r, &[&list], ImpurityMethod::Entropy, SearchStrategy::Exhaustive)
            .unwrap()
            .unwrap();
        assert_eq!(best.feature.threshold(), 4.0);
        assert!((best.gain - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bisection_keeps_a_peak_at_the_midpoint() {
        // Candidates 0..=8; the separating threshold 4.0 is the midpoint.
        let data = step_data();
        let r = refs(&data);
        let list = FeatureList::from_values("x", Comparator::LessThan, (0..9).map(f64::from));
        let best = select_best_split(&r, &[&list], ImpurityMethod::Entropy, SearchStrategy::Bisection)
            .unwrap()
            .unwrap();
        assert_eq!(best.feature.threshold(), 4.0);
        assert!((best.gain - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bisection_second_pass_reaches_the_low_end() {
        // Up at x=0 and x=9, Down elsewhere. Candidates 1..=7 start at 4.0.
        // The first pass only improves at the midpoint, then drifts upward
        // inside the lower half; the inverted pass walks down to 1.0, which
        // isolates the lone Up on the left.
        let data: Vec<Sample> = (0..10)
            .map(|i| labeled(f64::from(i), if i == 0 || i == 9 { "Up" } else { "Down" }))
            .collect();
        let r = refs(&data);
        let list = FeatureList::from_values("x", Comparator::LessThan, (1..8).map(f64::from));
        let best = select_best_split(&r, &[&list], ImpurityMethod::Entropy, SearchStrategy::Bisection)
            .unwrap()
            .unwrap();
        assert_eq!(best.feature.threshold(), 1.0);
        assert!(best.gain > 0.0);
    }

    #[test]
    fn bisection_can_settle_on_a_degenerate_midpoint() {
        // With two candidates the midpoint is the first one; its gain of 0
        // is never beaten on a strict comparison, so the heuristic keeps it.
        let data = [labeled(1.0, "Up"), labeled(1.0, "Up"), labeled(0.0, "Down"), labeled(0.0, "Down")];
        let r = refs(&data);
        let list = FeatureList::from_values("x", Comparator::LessThan, [0.0, 1.0]);
        let best = select_best_split(&r, &[&list], ImpurityMethod::Entropy, SearchStrategy::Bisection)
            .unwrap()
            .unwrap();
        assert_eq!(best.feature.threshold(), 0.0);
        assert!(best.gain.abs() < 1e-12);
    }

    const DIP_THEN_STEP: [&str; 7] = ["Down", "Down", "Down", "Up", "Up", "Down", "Up"];

    fn dip_then_step() -> Vec<Sample> {
        DIP_THEN_STEP
            .iter()
            .enumerate()
            .map(|(i, label)| labeled(i as f64, label))
            .collect()
    }

    #[test]
    fn harmful_midpoint_sends_bisection_upward() {
        // "x < 5.0" has a slightly negative gain; "x < 6.0" has about 0.526.
        let data = dip_then_step();
        let r = refs(&data);
        let list = FeatureList::from_values("x", Comparator::LessThan, [5.0, 6.0]);
        let best = select_best_split(&r, &[&list], ImpurityMethod::Entropy, SearchStrategy::Bisection)
            .unwrap()
            .unwrap();
        assert_eq!(best.feature.display_name(), "x < 6.0");
        assert!((best.gain - 0.526).abs() < 1e-3, "gain {}", best.gain);
    }

    #[test]
    fn harmful_only_candidate_is_kept_as_fallback() {
        let data = dip_then_step();
        let r = refs(&data);
        let list = FeatureList::from_values("x", Comparator::LessThan, [5.0]);
        for strategy in [SearchStrategy::Bisection, SearchStrategy::Exhaustive] {
            let best = select_best_split(&r, &[&list], ImpurityMethod::Entropy, strategy)
                .unwrap()
                .unwrap();
            assert_eq!(best.feature.threshold(), 5.0);
            assert!(best.gain < 0.0);
        }
    }

    #[test]
    fn fallback_yields_to_a_later_useful_column() {
        let data: Vec<Sample> = DIP_THEN_STEP
            .iter()
            .enumerate()
            .map(|(i, label)| Sample::new([("x", i as f64), ("y", i as f64)], Label::new(*label)))
            .collect();
        let r = refs(&data);
        let harmful = FeatureList::from_values("x", Comparator::LessThan, [5.0]);
        let useful = FeatureList::from_values("y", Comparator::LessThan, [6.0]);
        let best = select_best_split(&r, &[&harmful, &useful], ImpurityMethod::Entropy, SearchStrategy::Bisection)
            .unwrap()
            .unwrap();
        assert_eq!(best.feature.column(), "y");
    }

    #[test]
    fn best_carries_across_columns_and_ties_keep_first() {
        let data: Vec<Sample> = (0..4)
            .map(|i| {
                Sample::new(
                    [("a", f64::from(i)), ("b", f64::from(i))],
                    Label::new(if i < 2 { "Down" } else { "Up" }),
                )
            })
            .collect();
        let r = refs(&data);
        let a = FeatureList::new("a", vec![Feature::new("a", Comparator::LessThan, 2.0)]).unwrap();
        let b = FeatureList::new("b", vec![Feature::new("b", Comparator::LessThan, 2.0)]).unwrap();
        let best = select_best_split(&r, &[&a, &b], ImpurityMethod::Entropy, SearchStrategy::Bisection)
            .unwrap()
            .unwrap();
        assert_eq!(best.feature.column(), "a");
    }

    #[test]
    fn empty_lists_yield_nothing() {
        let data = step_data();
        let r = refs(&data);
        let empty = FeatureList::empty("x");
        let best = select_best_split(&r, &[&empty], ImpurityMethod::Entropy, SearchStrategy::Bisection).unwrap();
        assert!(best.is_none());
    }
}
