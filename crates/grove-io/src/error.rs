//! Errors raised while reading samples and writing forest artifacts.

use std::path::PathBuf;

use grove_rf::TreeError;

/// Everything that can go wrong between a CSV file on disk and the
/// artifacts written after training.
///
/// Row indices count data rows from zero; the header is not a row.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    // --- Reading ---
    /// The input file could not be opened.
    #[error("cannot open {path}")]
    FileNotFound { path: PathBuf, source: std::io::Error },

    /// The CSV layer rejected a record.
    #[error("malformed CSV in {path} near byte {offset}")]
    CsvParse {
        path: PathBuf,
        offset: u64,
        source: csv::Error,
    },

    /// Header present, no data rows.
    #[error("{path} has a header but no data rows")]
    EmptyDataset { path: PathBuf },

    #[error("row {row_index} of {path} has {got} cells, header has {expected}")]
    InconsistentRowLength {
        path: PathBuf,
        row_index: usize,
        expected: usize,
        got: usize,
    },

    /// Two header cells are equal once lowercased.
    #[error("column \"{column}\" appears twice in {path}")]
    DuplicateColumn { path: PathBuf, column: String },

    #[error("{path} has no \"{column}\" column to read labels from")]
    MissingLabelColumn { path: PathBuf, column: String },

    /// A labeled file left a label cell blank.
    #[error("row {row_index} of {path} has a blank label")]
    EmptyLabel { path: PathBuf, row_index: usize },

    /// A cell parsed as NaN or an infinity. `raw` is the cell text as read.
    #[error("row {row_index} of {path}: column \"{column}\" holds non-finite \"{raw}\"")]
    NonFiniteValue {
        path: PathBuf,
        row_index: usize,
        column: String,
        raw: String,
    },

    /// Only the label column is present.
    #[error("{path} has no feature columns")]
    NoFeatureColumns { path: PathBuf },

    // --- Preparing ---
    #[error("no feature column named \"{column}\"")]
    UnknownColumn { column: String },

    #[error("test fraction {fraction} is outside [0.0, 1.0)")]
    InvalidTestFraction { fraction: f64 },

    #[error("experiment name \"{name}\" may only use ASCII letters, digits, '_' and '-'")]
    InvalidExperimentName { name: String },

    /// A schema column holds text that is not a number.
    #[error("cannot build candidate features")]
    Candidates {
        #[from]
        source: TreeError,
    },

    // --- Writing ---
    #[error("cannot create output directory {path}")]
    OutputDirCreate { path: PathBuf, source: std::io::Error },

    #[error("cannot encode {path} as JSON")]
    EncodeArtifact {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot append a line to {path}")]
    AppendHistory { path: PathBuf, source: csv::Error },

    #[error("cannot write {path}")]
    WriteFile { path: PathBuf, source: std::io::Error },
}
