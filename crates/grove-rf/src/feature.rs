//! Single-column threshold predicates and per-column candidate lists.

use std::fmt;

use crate::error::TreeError;
use crate::sample::Sample;

/// Comparison a [`Feature`] applies between a column value and its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Comparator {
    /// `value < threshold`
    LessThan,
    /// `value >= threshold`
    GreaterOrEqual,
}

impl Comparator {
    /// Printable operator, e.g. `"<"`.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
        }
    }

    /// Apply the comparison.
    #[must_use]
    pub fn test(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::LessThan => value < threshold,
            Self::GreaterOrEqual => value >= threshold,
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<" => Some(Self::LessThan),
            ">=" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }
}

/// The two sides of a sample set split by a [`Feature`].
///
/// Both sides are always present; either may be empty.
#[derive(Debug, Clone, Default)]
pub struct Partition<'a> {
    /// Samples for which the feature holds.
    pub has: Vec<&'a Sample>,
    /// Samples for which the feature does not hold.
    pub lacks: Vec<&'a Sample>,
}

/// A predicate on one named column: `column <comparator> threshold`.
///
/// Equality covers column, comparator, and threshold. The display name is
/// derived from those three and never diverges.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Feature {
    column: String,
    comparator: Comparator,
    threshold: f64,
    display_name: String,
}

impl Feature {
    /// Create a feature. The display name reads like `"hour < 3.0"`.
    #[must_use]
    pub fn new(column: impl Into<String>, comparator: Comparator, threshold: f64) -> Self {
        let column = column.into();
        let display_name = format!("{column} {}", test_text(comparator, threshold));
        Self {
            column,
            comparator,
            threshold,
            display_name,
        }
    }

    /// Rebuild a feature from its column and test text such as `">= 1.5"`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::MalformedTest`] when the operator is unknown or
    /// the threshold does not parse.
    pub fn parse_test(column: impl Into<String>, test: &str) -> Result<Self, TreeError> {
        let column = column.into();
        let parsed = test.trim().split_once(' ').and_then(|(symbol, threshold)| {
            let comparator = Comparator::from_symbol(symbol)?;
            let threshold = threshold.trim().parse::<f64>().ok()?;
            Some((comparator, threshold))
        });
        match parsed {
            Some((comparator, threshold)) => Ok(Self::new(column, comparator, threshold)),
            None => Err(TreeError::MalformedTest {
                column,
                test: test.to_string(),
            }),
        }
    }

    /// Return the column this feature tests.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Return the comparator.
    #[must_use]
    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    /// Return the threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Return the display name, e.g. `"hour < 3.0"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Return the test without its column, e.g. `"< 3.0"`.
    #[must_use]
    pub fn test(&self) -> String {
        test_text(self.comparator, self.threshold)
    }

    /// Decide whether `sample` has this feature.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::MissingValue`] | the sample lacks the column |
    /// | [`TreeError::NonNumericValue`] | the value does not parse as a number |
    pub fn evaluate(&self, sample: &Sample) -> Result<bool, TreeError> {
        let value = sample.numeric(&self.column)?;
        Ok(self.comparator.test(value, self.threshold))
    }

    /// Split `samples` into those that have the feature and those that lack it.
    ///
    /// Relative order is preserved on both sides.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`Feature::evaluate`].
    pub fn split<'a>(&self, samples: &[&'a Sample]) -> Result<Partition<'a>, TreeError> {
        let mut partition = Partition::default();
        for &sample in samples {
            if self.evaluate(sample)? {
                partition.has.push(sample);
            } else {
                partition.lacks.push(sample);
            }
        }
        Ok(partition)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

fn test_text(comparator: Comparator, threshold: f64) -> String {
    format!("{} {threshold:?}", comparator.symbol())
}

/// Candidate features for one column, sorted ascending by threshold.
///
/// Duplicate thresholds are collapsed, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureList {
    column: String,
    features: Vec<Feature>,
}

impl FeatureList {
    /// Build a list from arbitrary features on `column`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::MixedColumnFeatureList`] when a feature tests a
    /// different column.
    pub fn new(column: impl Into<String>, mut features: Vec<Feature>) -> Result<Self, TreeError> {
        let column = column.into();
        if let Some(stray) = features.iter().find(|f| f.column != column) {
            return Err(TreeError::MixedColumnFeatureList {
                column,
                feature: stray.display_name.clone(),
            });
        }
        features.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
        features.dedup_by(|later, earlier| later.threshold == earlier.threshold);
        Ok(Self { column, features })
    }

    /// Build one feature per distinct value with a shared comparator.
    #[must_use]
    pub fn from_values(
        column: impl Into<String>,
        comparator: Comparator,
        values: impl IntoIterator<Item = f64>,
    ) -> Self {
        let column = column.into();
        let mut thresholds: Vec<f64> = values.into_iter().collect();
        thresholds.sort_by(f64::total_cmp);
        thresholds.dedup();
        let features = thresholds
            .into_iter()
            .map(|t| Feature::new(column.clone(), comparator, t))
            .collect();
        Self { column, features }
    }

    /// An empty list for `column`.
    #[must_use]
    pub fn empty(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            features: Vec::new(),
        }
    }

    /// Return the column this list covers.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Return the candidates in ascending threshold order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Return the number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Return `true` when no candidates remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The list handed to children after `chosen` was used to split.
    ///
    /// Lists on other columns pass through unchanged. On the chosen column,
    /// only features sharing the chosen threshold survive, minus the chosen
    /// feature itself, so the column is effectively exhausted.
    #[must_use]
    pub(crate) fn reduced_after(&self, chosen: &Feature) -> Self {
        if self.column != chosen.column {
            return self.clone();
        }
        let features = self
            .features
            .iter()
            .filter(|f| f.threshold == chosen.threshold && *f != chosen)
            .cloned()
            .collect();
        Self {
            column: self.column.clone(),
            features,
        }
    }
}
