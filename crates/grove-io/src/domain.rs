//! Domain types for grove-io.

use std::fmt;

use grove_rf::Sample;

use crate::IoError;

/// Prefix shared by every artifact of one run (`{name}_trees.json`, ...).
///
/// Restricted to ASCII letters, digits, `_` and `-` so it is safe inside a
/// file name on any platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] for an empty name or one
    /// holding any other character.
    pub fn new(name: impl Into<String>) -> Result<Self, IoError> {
        let name = name.into();
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-');
        match name.chars().all(allowed) && !name.is_empty() {
            true => Ok(Self(name)),
            false => Err(IoError::InvalidExperimentName { name }),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Samples read from one CSV file.
///
/// Produced by [`SampleReader`](crate::SampleReader). Column names are
/// lowercased and exclude the label column.
#[derive(Debug)]
pub struct Dataset {
    /// Feature column names in header order.
    columns: Vec<String>,
    /// Lowercased label column, if the file was read with labels.
    label_column: Option<String>,
    /// One sample per data row, in file order.
    samples: Vec<Sample>,
}

impl Dataset {
    pub(crate) fn new(columns: Vec<String>, label_column: Option<String>, samples: Vec<Sample>) -> Self {
        Self {
            columns,
            label_column,
            samples,
        }
    }

    /// Return the feature column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Return the label column, if any.
    #[must_use]
    pub fn label_column(&self) -> Option<&str> {
        self.label_column.as_deref()
    }

    /// Return the samples.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Consume the dataset, returning its samples.
    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Return the number of samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }
}
