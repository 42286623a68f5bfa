//! CSV sample reader with input validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use grove_rf::{Label, Sample, Scalar};
use tracing::{debug, info, instrument};

use crate::domain::Dataset;
use crate::IoError;

/// How raw label cells become [`Label`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelPolicy {
    /// Use the cell text as the label.
    #[default]
    Verbatim,
    /// `"0"` becomes `Down`, any other value becomes `Up`.
    Directional,
}

impl LabelPolicy {
    /// Turn a raw label cell into a label.
    #[must_use]
    pub fn label(self, raw: &str) -> Label {
        match self {
            Self::Verbatim => Label::new(raw),
            Self::Directional => Label::directional(raw != "0"),
        }
    }
}

/// Reads labeled or unlabeled samples from a CSV file.
///
/// Expected CSV format:
/// - Header row required; names are lowercased and must be unique
/// - One column holds the label (default `label`), every other column is a feature
/// - Cells that parse as numbers become [`Scalar::Number`], others [`Scalar::Text`]
/// - Blank feature cells are left out of the sample
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::DuplicateColumn`] | Two header cells share a name |
/// | [`IoError::MissingLabelColumn`] | Labels are required and the label column is absent |
/// | [`IoError::NoFeatureColumns`] | Only the label column is present |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::EmptyLabel`] | A label cell is blank |
/// | [`IoError::NonFiniteValue`] | A cell parses as NaN or an infinity |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
pub struct SampleReader {
    path: PathBuf,
    label_column: String,
    labels_required: bool,
    label_policy: LabelPolicy,
}

impl SampleReader {
    /// Create a reader for the given CSV file path.
    ///
    /// Defaults to a required `label` column read verbatim.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            label_column: "label".to_string(),
            labels_required: true,
            label_policy: LabelPolicy::Verbatim,
        }
    }

    /// Set the label column name (matched case-insensitively).
    #[must_use]
    pub fn with_label_column(mut self, column: &str) -> Self {
        self.label_column = column.to_lowercase();
        self
    }

    /// Set how label cells become labels.
    #[must_use]
    pub fn with_label_policy(mut self, policy: LabelPolicy) -> Self {
        self.label_policy = policy;
        self
    }

    /// Read unlabeled samples when the label column is absent instead of failing.
    #[must_use]
    pub fn with_optional_labels(mut self) -> Self {
        self.labels_required = false;
        self
    }

    /// Read and validate the CSV file, returning a [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Dataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets the InconsistentRowLength check below report
        // short rows instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header: Vec<String> = rdr
            .headers()
            .map_err(|e| self.csv_error(e))?
            .iter()
            .map(str::to_lowercase)
            .collect();
        let expected_cols = header.len();
        debug!(expected_cols, "read CSV header");

        let mut seen = HashSet::new();
        for column in &header {
            if !seen.insert(column.as_str()) {
                return Err(IoError::DuplicateColumn {
                    path: self.path.clone(),
                    column: column.clone(),
                });
            }
        }

        let label_index = header.iter().position(|c| *c == self.label_column);
        if label_index.is_none() && self.labels_required {
            return Err(IoError::MissingLabelColumn {
                path: self.path.clone(),
                column: self.label_column.clone(),
            });
        }

        let columns: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|&(i, _)| Some(i) != label_index)
            .map(|(_, c)| c.clone())
            .collect();
        if columns.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }

        let mut samples = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let mut values = Vec::with_capacity(columns.len());
            for (i, raw) in record.iter().enumerate() {
                if Some(i) == label_index || raw.is_empty() {
                    continue;
                }
                let scalar = Scalar::parse(raw);
                if let Scalar::Number(v) = scalar
                    && !v.is_finite()
                {
                    return Err(IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        column: header[i].clone(),
                        raw: raw.to_string(),
                    });
                }
                values.push((header[i].clone(), scalar));
            }

            let sample = match label_index.and_then(|i| record.get(i)) {
                Some("") => {
                    return Err(IoError::EmptyLabel {
                        path: self.path.clone(),
                        row_index,
                    });
                }
                Some(raw) => Sample::new(values, self.label_policy.label(raw)),
                None => Sample::unlabeled(values),
            };
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_samples = samples.len(),
            n_columns = columns.len(),
            labeled = label_index.is_some(),
            "samples loaded"
        );

        let label_column = label_index.map(|_| self.label_column.clone());
        Ok(Dataset::new(columns, label_column, samples))
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_valid_samples() {
        let csv = "Hour,Close,Label\n3,1.25,Up\n14,1.20,Down\n";
        let f = write_csv(csv);
        let ds = SampleReader::new(f.path()).read().unwrap();
        assert_eq!(ds.n_samples(), 2);
        assert_eq!(ds.columns(), &["hour", "close"]);
        assert_eq!(ds.label_column(), Some("label"));

        let first = &ds.samples()[0];
        assert_eq!(first.value("hour"), Some(&Scalar::Number(3.0)));
        assert_eq!(first.label().unwrap().as_str(), "Up");
        assert!(first.value("label").is_none());
    }

    #[test]
    fn directional_labels() {
        let csv = "x,label\n1,0\n2,1\n3,7\n";
        let f = write_csv(csv);
        let ds = SampleReader::new(f.path())
            .with_label_policy(LabelPolicy::Directional)
            .read()
            .unwrap();
        let labels: Vec<&str> = ds.samples().iter().map(|s| s.label().unwrap().as_str()).collect();
        assert_eq!(labels, ["Down", "Up", "Up"]);
    }

    #[test]
    fn custom_label_column_is_case_insensitive() {
        let csv = "x,Direction\n1,Up\n";
        let f = write_csv(csv);
        let ds = SampleReader::new(f.path())
            .with_label_column("DIRECTION")
            .read()
            .unwrap();
        assert_eq!(ds.samples()[0].label().unwrap().as_str(), "Up");
    }

    #[test]
    fn missing_label_column_error() {
        let csv = "x,y\n1,2\n";
        let f = write_csv(csv);
        let err = SampleReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::MissingLabelColumn { ref column, .. } if column == "label"));
    }

    #[test]
    fn optional_labels_read_unlabeled_samples() {
        let csv = "x,y\n1,2\n";
        let f = write_csv(csv);
        let ds = SampleReader::new(f.path()).with_optional_labels().read().unwrap();
        assert_eq!(ds.label_column(), None);
        assert!(ds.samples()[0].label().is_none());
        assert_eq!(ds.columns().len(), 2);
    }

    #[test]
    fn text_cells_kept_and_blank_cells_skipped() {
        let csv = "x,day,label\n,mon,Up\n";
        let f = write_csv(csv);
        let ds = SampleReader::new(f.path()).read().unwrap();
        let s = &ds.samples()[0];
        assert!(s.value("x").is_none());
        assert_eq!(s.value("day"), Some(&Scalar::Text("mon".to_string())));
    }

    #[test]
    fn empty_label_error() {
        let csv = "x,label\n1,\n";
        let f = write_csv(csv);
        let err = SampleReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::EmptyLabel { row_index: 0, .. }));
    }

    #[test]
    fn empty_dataset_error() {
        let f = write_csv("x,label\n");
        let err = SampleReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn no_feature_columns_error() {
        let f = write_csv("label\nUp\n");
        let err = SampleReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::NoFeatureColumns { .. }));
    }

    #[test]
    fn duplicate_column_error() {
        let f = write_csv("x,X,label\n1,2,Up\n");
        let err = SampleReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::DuplicateColumn { ref column, .. } if column == "x"));
    }

    #[test]
    fn inconsistent_row_length_error() {
        let f = write_csv("x,y,label\n1,2,Up\n1,Down\n");
        let err = SampleReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength { row_index: 1, expected: 3, got: 2, .. }
        ));
    }

    #[test]
    fn non_finite_value_error() {
        let f = write_csv("x,label\nNaN,Up\n");
        let err = SampleReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { ref column, .. } if column == "x"));
    }

    #[test]
    fn file_not_found_error() {
        let err = SampleReader::new(Path::new("/tmp/grove_missing_input_7f3a.csv"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}
