mod labels;
mod manifest;
mod predictions;
mod source;
mod split;

use std::path::{Path, PathBuf};

pub use labels::LabelTable;
pub use manifest::{parse_manifest, read_manifest};
pub use predictions::{save_predictions, write_predictions};
pub use source::{parse_json_frames, parse_text_frames, FeatureDir, FeatureFormat};
pub use split::split_utterances;

/// Which feature subdirectory an utterance lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    pub fn dir_name(self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
        }
    }
}

/// File layout of a LibriPhone-style corpus rooted at one directory.
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    root: PathBuf,
}

impl CorpusLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn train_manifest(&self) -> PathBuf {
        self.root.join("train_split.txt")
    }

    pub fn test_manifest(&self) -> PathBuf {
        self.root.join("test_split.txt")
    }

    pub fn train_labels(&self) -> PathBuf {
        self.root.join("train_labels.txt")
    }

    pub fn feature_dir(&self, partition: Partition) -> PathBuf {
        self.root.join("feat").join(partition.dir_name())
    }
}
