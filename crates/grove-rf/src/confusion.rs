//! Confusion matrix and per-label classification metrics.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::TreeError;
use crate::sample::Label;

/// A confusion matrix over the labels seen in truth or prediction.
///
/// Entry `matrix[t][p]` counts how many samples with true label
/// `labels[t]` were predicted as `labels[p]`. Labels are kept in
/// canonical order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfusionMatrix {
    labels: Vec<Label>,
    matrix: Vec<Vec<usize>>,
}

/// Per-label precision, recall, and F1 score.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassMetrics {
    /// The label.
    pub label: Label,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this label.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true samples for this label.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples with this label.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from paired true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::EmptyDataset`] | Zero pairs provided |
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = (&'a Label, &'a Label)>,
    {
        let pairs: Vec<(&Label, &Label)> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        let labels: Vec<Label> = pairs
            .iter()
            .flat_map(|&(t, p)| [t, p])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        let position = |label: &Label| labels.binary_search(label).unwrap_or(0);
        let mut matrix = vec![vec![0usize; labels.len()]; labels.len()];
        for &(t, p) in &pairs {
            matrix[position(t)][position(p)] += 1;
        }
        Ok(Self { labels, matrix })
    }

    /// Number of correct predictions.
    #[must_use]
    pub fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.matrix[i][i]).sum()
    }

    /// Number of predictions.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flat_map(|row| row.iter()).sum()
    }

    /// Overall accuracy: proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.correct() as f64 / total as f64
        }
    }

    /// Per-label precision, recall, F1, and support.
    ///
    /// Rows are true labels and columns predictions, so support is a row
    /// sum and the precision denominator a column sum. Any ratio with a
    /// zero denominator is reported as 0.0.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let ratio = |num: f64, den: f64| if den == 0.0 { 0.0 } else { num / den };
        self.labels
            .iter()
            .enumerate()
            .map(|(c, label)| {
                let hits = self.matrix[c][c];
                let support: usize = self.matrix[c].iter().sum();
                let predicted: usize = self.matrix.iter().map(|row| row[c]).sum();
                let precision = ratio(hits as f64, predicted as f64);
                let recall = ratio(hits as f64, support as f64);
                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1: ratio(2.0 * precision * recall, precision + recall),
                    support,
                }
            })
            .collect()
    }

    /// Return the labels indexing rows and columns.
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }
}

impl fmt::Display for ConfusionMatrix {
    /// Right-aligned grid with true labels down the side and predictions across.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const CORNER: &str = "true\\pred";
        let width = self
            .labels
            .iter()
            .map(|l| l.as_str().len())
            .fold(CORNER.len(), usize::max);

        let header = self
            .labels
            .iter()
            .map(|l| format!("{:>width$}", l.as_str()))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(f, "{CORNER:>width$} {header}")?;

        for (label, row) in self.labels.iter().zip(&self.matrix) {
            let cells = row
                .iter()
                .map(|n| format!("{n:>width$}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{:>width$} {cells}", label.as_str())?;
        }
        Ok(())
    }
}
