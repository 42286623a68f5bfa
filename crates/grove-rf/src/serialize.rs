//! Binary model files: a versioned header followed by the bincode-encoded forest.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::TreeError;
use crate::forest::RandomForest;
use crate::sample::Label;

/// Bumped whenever the encoded layout of [`RandomForest`] changes.
const FORMAT_VERSION: u32 = 1;

/// Facts about the model that can be checked without walking any tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelHeader {
    format_version: u32,
    n_trees: usize,
    labels: Vec<Label>,
}

/// On-disk layout. Saving borrows the forest; loading owns it.
#[derive(Serialize, Deserialize)]
struct ModelFile<F> {
    header: ModelHeader,
    forest: F,
}

impl RandomForest {
    fn header(&self) -> ModelHeader {
        ModelHeader {
            format_version: FORMAT_VERSION,
            n_trees: self.n_trees(),
            labels: self.labels().into_iter().cloned().collect(),
        }
    }

    /// Write the forest to `path` as a bincode model file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::SerializeModel`] | bincode encoding failed |
    /// | [`TreeError::WriteModel`] | the file could not be written |
    #[instrument(skip(self), fields(path = %path.as_ref().display(), n_trees = self.n_trees()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TreeError> {
        let path = path.as_ref();
        let file = ModelFile {
            header: self.header(),
            forest: self,
        };
        let bytes =
            bincode::serialize(&file).map_err(|source| TreeError::SerializeModel { source })?;
        std::fs::write(path, &bytes).map_err(|source| TreeError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;

        info!(size_bytes = bytes.len(), labels = ?file.header.labels, "model saved");
        Ok(())
    }

    /// Read a forest written by [`RandomForest::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::ReadModel`] | the file could not be read |
    /// | [`TreeError::DeserializeModel`] | bincode decoding failed |
    /// | [`TreeError::IncompatibleModelVersion`] | the header carries another format version |
    /// | [`TreeError::ModelHeaderMismatch`] | the header's tree count disagrees with the decoded forest |
    /// | [`TreeError::EmptyForest`] | the file holds a forest with no trees |
    /// | [`TreeError::EmptyTree`] / [`TreeError::InvalidChildIndex`] | a decoded tree's arena cannot be walked safely |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TreeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| TreeError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ModelFile<RandomForest> =
            bincode::deserialize(&bytes).map_err(|source| TreeError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;

        let ModelFile { header, forest } = file;
        if header.format_version != FORMAT_VERSION {
            return Err(TreeError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: header.format_version,
                path: path.to_path_buf(),
            });
        }
        if header.n_trees != forest.trees.len() {
            return Err(TreeError::ModelHeaderMismatch {
                path: path.to_path_buf(),
                header_trees: header.n_trees,
                found_trees: forest.trees.len(),
            });
        }

        debug!(n_trees = header.n_trees, labels = ?header.labels, "model loaded");
        Self::from_trees(forest.trees)
    }
}
