//! Column kinds and candidate feature construction.

use grove_rf::{Comparator, FeatureList, Sample};
use tracing::{debug, instrument};

use crate::domain::Dataset;
use crate::IoError;

/// How a column's observed values become split tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Small ordinal domain (hour of day, weekday): tested with `<`.
    Discrete,
    /// Real-valued measurement: tested with `>=`.
    Continuous,
}

impl ColumnKind {
    /// Return the comparator used for this kind's candidates.
    #[must_use]
    pub fn comparator(self) -> Comparator {
        match self {
            Self::Discrete => Comparator::LessThan,
            Self::Continuous => Comparator::GreaterOrEqual,
        }
    }
}

/// Which columns produce candidate features, and how.
#[derive(Debug, Clone, Default)]
pub struct FeatureSchema {
    columns: Vec<(String, ColumnKind)>,
}

impl FeatureSchema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column (lowercased), replacing any earlier kind for it.
    #[must_use]
    pub fn with_column(mut self, name: &str, kind: ColumnKind) -> Self {
        let name = name.to_lowercase();
        match self.columns.iter_mut().find(|(c, _)| *c == name) {
            Some(entry) => entry.1 = kind,
            None => self.columns.push((name, kind)),
        }
        self
    }

    /// Every feature column of `dataset`, continuous unless named in `discrete`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnknownColumn`] if a discrete name is not a
    /// feature column of the dataset.
    pub fn for_dataset(dataset: &Dataset, discrete: &[String]) -> Result<Self, IoError> {
        let discrete: Vec<String> = discrete.iter().map(|d| d.to_lowercase()).collect();
        if let Some(unknown) = discrete.iter().find(|d| !dataset.columns().contains(d)) {
            return Err(IoError::UnknownColumn {
                column: unknown.clone(),
            });
        }
        let schema = dataset.columns().iter().fold(Self::new(), |schema, column| {
            let kind = if discrete.contains(column) {
                ColumnKind::Discrete
            } else {
                ColumnKind::Continuous
            };
            schema.with_column(column, kind)
        });
        Ok(schema)
    }

    /// Return the columns and their kinds, in insertion order.
    #[must_use]
    pub fn columns(&self) -> &[(String, ColumnKind)] {
        &self.columns
    }

    /// Build one sorted candidate list per schema column from observed values.
    ///
    /// Thresholds are the distinct observed values in ascending order,
    /// minus the smallest: at the minimum every sample falls on one side of
    /// the test for either comparator. A column with a single distinct
    /// value yields an empty list. Samples without the column (blank cells)
    /// contribute no thresholds.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Candidates`] | a sample holds a non-numeric value in a schema column |
    #[instrument(skip_all, fields(n_samples = samples.len(), n_columns = self.columns.len()))]
    pub fn candidate_features(&self, samples: &[Sample]) -> Result<Vec<FeatureList>, IoError> {
        self.columns
            .iter()
            .map(|(column, kind)| -> Result<FeatureList, IoError> {
                let mut values = samples
                    .iter()
                    .filter(|s| s.value(column).is_some())
                    .map(|s| s.numeric(column))
                    .collect::<Result<Vec<f64>, _>>()?;
                values.sort_by(f64::total_cmp);
                values.dedup();
                let thresholds = values.into_iter().skip(1);
                let list = FeatureList::from_values(column.as_str(), kind.comparator(), thresholds);
                debug!(column, kind = ?kind, n_candidates = list.len(), "candidate list built");
                Ok(list)
            })
            .collect()
    }
}
