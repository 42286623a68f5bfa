//! JSON and CSV result writer for trained forests and their evaluations.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use grove_rf::{ClassMetrics, Evaluation, Label, RandomForest, Sample, TreeRecord, VoteTally};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::ExperimentName;
use crate::IoError;

/// Writes forest artifacts for one experiment.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_{kind}.{ext}`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write every tree's nested record to `{experiment}_trees.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::EncodeArtifact`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | the file cannot be written |
    #[instrument(skip_all, fields(n_trees = forest.n_trees()))]
    pub fn write_trees(&self, forest: &RandomForest) -> Result<PathBuf, IoError> {
        let artifact = TreesArtifact {
            experiment: self.experiment.as_str(),
            n_trees: forest.n_trees(),
            trees: forest.to_records(),
        };
        let path = self.write_json("trees", &artifact)?;
        info!(path = %path.display(), "tree records written");
        Ok(path)
    }

    /// Write an evaluation to `{experiment}_evaluate.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::EncodeArtifact`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | the file cannot be written |
    #[instrument(skip_all)]
    pub fn write_evaluation(&self, n_trees: usize, evaluation: &Evaluation) -> Result<PathBuf, IoError> {
        let artifact = EvaluateArtifact {
            experiment: self.experiment.as_str(),
            n_trees,
            correct: evaluation.correct,
            total: evaluation.total,
            accuracy: evaluation.accuracy,
            accuracy_percent: percent(evaluation.accuracy),
            labels: evaluation.confusion.labels(),
            confusion_matrix: evaluation.confusion.as_rows(),
            class_metrics: evaluation.confusion.class_metrics(),
        };
        let path = self.write_json("evaluate", &artifact)?;
        info!(path = %path.display(), "evaluation written");
        Ok(path)
    }

    /// Append one `time,numtrees,correct,total,accuracy` line to
    /// `{experiment}_accuracy.csv`.
    ///
    /// The header is written when the file is new or empty. Accuracy is a
    /// percentage with two decimals and a trailing `%`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::WriteFile`] | the file cannot be opened |
    /// | [`IoError::AppendHistory`] | the line cannot be written |
    #[instrument(skip_all)]
    pub fn append_accuracy_history(
        &self,
        n_trees: usize,
        evaluation: &Evaluation,
    ) -> Result<PathBuf, IoError> {
        let path = self.artifact_path("accuracy", "csv");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| IoError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        let is_new = file
            .metadata()
            .map_err(|e| IoError::WriteFile {
                path: path.clone(),
                source: e,
            })?
            .len()
            == 0;

        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        let history_error = |e: csv::Error| IoError::AppendHistory {
            path: path.clone(),
            source: e,
        };
        if is_new {
            wtr.write_record(["time", "numtrees", "correct", "total", "accuracy"])
                .map_err(history_error)?;
        }
        wtr.write_record([
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            n_trees.to_string(),
            evaluation.correct.to_string(),
            evaluation.total.to_string(),
            format!("{:.2}%", percent(evaluation.accuracy)),
        ])
        .map_err(history_error)?;
        wtr.flush().map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), accuracy = evaluation.accuracy, "accuracy history appended");
        Ok(path)
    }

    /// Write per-sample predictions and vote counts to `{experiment}_predict.json`.
    ///
    /// `samples`, `predicted`, and `votes` are parallel slices; a sample's
    /// own label, when present, is reported as `actual`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::EncodeArtifact`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | the file cannot be written |
    #[instrument(skip_all, fields(n_samples = samples.len()))]
    pub fn write_predictions(
        &self,
        samples: &[Sample],
        predicted: &[Label],
        votes: &[VoteTally],
    ) -> Result<PathBuf, IoError> {
        let predictions: Vec<PredictionEntry> = samples
            .iter()
            .zip(predicted)
            .zip(votes)
            .enumerate()
            .map(|(row, ((sample, label), tally))| PredictionEntry {
                row,
                predicted: label.as_str(),
                actual: sample.label().map(Label::as_str),
                votes: tally,
            })
            .collect();

        let artifact = PredictArtifact {
            experiment: self.experiment.as_str(),
            n_samples: predictions.len(),
            predictions,
        };
        let path = self.write_json("predict", &artifact)?;
        info!(path = %path.display(), "predictions written");
        Ok(path)
    }

    /// Return the path where the model binary should be saved.
    ///
    /// Does not write anything, just computes `{output_dir}/{experiment}_model.bin`.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.artifact_path("model", "bin")
    }

    fn artifact_path(&self, kind: &str, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{kind}.{ext}", self.experiment.as_str()))
    }

    fn write_json(&self, kind: &str, artifact: &impl Serialize) -> Result<PathBuf, IoError> {
        let path = self.artifact_path(kind, "json");
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::EncodeArtifact {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

fn percent(accuracy: f64) -> f64 {
    100.0 * accuracy
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct TreesArtifact<'a> {
    experiment: &'a str,
    n_trees: usize,
    trees: Vec<TreeRecord>,
}

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    n_trees: usize,
    correct: usize,
    total: usize,
    accuracy: f64,
    accuracy_percent: f64,
    labels: &'a [Label],
    confusion_matrix: &'a [Vec<usize>],
    class_metrics: Vec<ClassMetrics>,
}

#[derive(Serialize)]
struct PredictArtifact<'a> {
    experiment: &'a str,
    n_samples: usize,
    predictions: Vec<PredictionEntry<'a>>,
}

#[derive(Serialize)]
struct PredictionEntry<'a> {
    row: usize,
    predicted: &'a str,
    actual: Option<&'a str>,
    votes: &'a VoteTally,
}
