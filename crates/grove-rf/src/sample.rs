//! Samples, labels, and the scalar cell values they carry.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::TreeError;

/// A classification outcome.
///
/// Labels compare by their printable value. That ordering is the canonical
/// total order used wherever two labels tie (entropy orientation, plurality
/// and homogeneity tie-breaks, vote tallies).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    /// Create a label from its printable value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Create a directional label: `"Up"` when `up` is true, `"Down"` otherwise.
    #[must_use]
    pub fn directional(up: bool) -> Self {
        Self::new(if up { "Up" } else { "Down" })
    }

    /// Return the printable value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single cell value.
///
/// Ingestion keeps cells that parse as numbers as [`Scalar::Number`] and
/// everything else as [`Scalar::Text`]; feature tests coerce text lazily.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Scalar {
    /// A numeric value.
    Number(f64),
    /// Raw text that did not parse as a number at ingestion time.
    Text(String),
}

impl Scalar {
    /// Classify a raw cell: numeric when it parses as `f64`, text otherwise.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(v) => Self::Number(v),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    /// Coerce to a number for a feature test on `column`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NonNumericValue`] when text does not parse.
    pub fn as_f64(&self, column: &str) -> Result<f64, TreeError> {
        match self {
            Self::Number(v) => Ok(*v),
            Self::Text(raw) => {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| TreeError::NonNumericValue {
                        column: column.to_string(),
                        raw: raw.clone(),
                    })
            }
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// An immutable record: named column values plus an optional label.
///
/// Training requires every sample to be labeled; classification does not
/// look at the label.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sample {
    values: BTreeMap<String, Scalar>,
    label: Option<Label>,
}

impl Sample {
    /// Create a labeled sample.
    #[must_use]
    pub fn new<I, K, V>(values: I, label: Label) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Scalar>,
    {
        Self {
            values: collect_values(values),
            label: Some(label),
        }
    }

    /// Create a sample with no label, for classification only.
    #[must_use]
    pub fn unlabeled<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Scalar>,
    {
        Self {
            values: collect_values(values),
            label: None,
        }
    }

    /// Return the value stored under `column`, if any.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Scalar> {
        self.values.get(column)
    }

    /// Return the numeric value stored under `column`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::MissingValue`] | the sample has no such column |
    /// | [`TreeError::NonNumericValue`] | the value is text that does not parse |
    pub fn numeric(&self, column: &str) -> Result<f64, TreeError> {
        self.values
            .get(column)
            .ok_or_else(|| TreeError::MissingValue {
                column: column.to_string(),
            })?
            .as_f64(column)
    }

    /// Return the label, if the sample has one.
    #[must_use]
    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    /// Iterate over column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

fn collect_values<I, K, V>(values: I) -> BTreeMap<String, Scalar>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Scalar>,
{
    values
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Count samples per label, keyed in canonical label order.
///
/// Returns [`TreeError::MissingLabel`] for the first unlabeled sample.
pub(crate) fn label_counts<'a>(
    samples: &[&'a Sample],
) -> Result<BTreeMap<&'a Label, usize>, TreeError> {
    let mut counts = BTreeMap::new();
    for (sample_index, sample) in samples.iter().enumerate() {
        let label = sample
            .label
            .as_ref()
            .ok_or(TreeError::MissingLabel { sample_index })?;
        *counts.entry(label).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Most frequent label; ties go to the smallest label.
pub(crate) fn plurality_label<'a>(counts: &BTreeMap<&'a Label, usize>) -> Option<&'a Label> {
    counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(label, _)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_parse_classifies_cells() {
        assert_eq!(Scalar::parse("3.5"), Scalar::Number(3.5));
        assert_eq!(Scalar::parse(" 7 "), Scalar::Number(7.0));
        assert_eq!(Scalar::parse("abc"), Scalar::Text("abc".to_string()));
    }

    #[test]
    fn text_coerces_when_numeric() {
        let s = Scalar::Text("2.25".to_string());
        assert!((s.as_f64("x").unwrap() - 2.25).abs() < f64::EPSILON);
    }

    #[test]
    fn text_coercion_failure_names_column() {
        let s = Scalar::Text("n/a".to_string());
        let err = s.as_f64("price").unwrap_err();
        assert!(matches!(
            err,
            TreeError::NonNumericValue { ref column, ref raw } if column == "price" && raw == "n/a"
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let sample = Sample::new([("a", 1.0)], Label::new("Up"));
        let err = sample.numeric("b").unwrap_err();
        assert!(matches!(err, TreeError::MissingValue { ref column } if column == "b"));
    }

    #[test]
    fn labels_order_by_printable_value() {
        assert!(Label::directional(false) < Label::directional(true));
        assert_eq!(Label::directional(true).to_string(), "Up");
        assert_eq!(Label::directional(false).as_str(), "Down");
    }

    #[test]
    fn plurality_breaks_ties_toward_smallest_label() {
        let samples = [
            Sample::new([("x", 0.0)], Label::new("b")),
            Sample::new([("x", 0.0)], Label::new("a")),
            Sample::new([("x", 0.0)], Label::new("b")),
            Sample::new([("x", 0.0)], Label::new("a")),
        ];
        let refs: Vec<&Sample> = samples.iter().collect();
        let counts = label_counts(&refs).unwrap();
        assert_eq!(plurality_label(&counts).unwrap().as_str(), "a");
    }

    #[test]
    fn label_counts_rejects_unlabeled() {
        let samples = [
            Sample::new([("x", 0.0)], Label::new("a")),
            Sample::unlabeled([("x", 1.0)]),
        ];
        let refs: Vec<&Sample> = samples.iter().collect();
        let err = label_counts(&refs).unwrap_err();
        assert!(matches!(err, TreeError::MissingLabel { sample_index: 1 }));
    }
}
