use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::phoneme::features::FeatureSource;
use crate::phoneme::{PhonemeError, Result};

/// On-disk encoding of a per-utterance feature file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeatureFormat {
    /// JSON array of frames, each an array of coefficients.
    #[default]
    Json,
    /// One frame per line, coefficients separated by whitespace.
    Txt,
}

impl FeatureFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FeatureFormat::Json => "json",
            FeatureFormat::Txt => "txt",
        }
    }

    pub fn parse(self, data: &str, feature_dim: usize) -> Result<Array2<f32>> {
        match self {
            FeatureFormat::Json => parse_json_frames(data, feature_dim),
            FeatureFormat::Txt => parse_text_frames(data, feature_dim),
        }
    }
}

/// Directory holding one `<utterance_id>.<ext>` feature file per utterance.
#[derive(Debug, Clone)]
pub struct FeatureDir {
    root: PathBuf,
    format: FeatureFormat,
    feature_dim: usize,
}

impl FeatureDir {
    pub fn new(root: impl Into<PathBuf>, format: FeatureFormat, feature_dim: usize) -> Self {
        Self {
            root: root.into(),
            format,
            feature_dim,
        }
    }

    pub fn path_for(&self, utterance_id: &str) -> PathBuf {
        self.root.join(format!("{utterance_id}.{}", self.format.extension()))
    }
}

impl FeatureSource for FeatureDir {
    fn load(&self, utterance_id: &str) -> Result<Array2<f32>> {
        let path = self.path_for(utterance_id);
        let data = read_feature_file(&path, utterance_id)?;
        self.format.parse(&data, self.feature_dim).map_err(|err| {
            PhonemeError::new(err.kind(), format!("{}: {}", path.display(), err.message()))
        })
    }
}

fn read_feature_file(path: &Path, utterance_id: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            PhonemeError::missing_data(format!(
                "no feature file for utterance {utterance_id} at {}",
                path.display()
            ))
        } else {
            PhonemeError::io(path, &err)
        }
    })
}

pub fn parse_json_frames(data: &str, feature_dim: usize) -> Result<Array2<f32>> {
    let rows: Vec<Vec<f32>> = serde_json::from_str(data)
        .map_err(|err| PhonemeError::invalid_data(format!("malformed feature JSON: {err}")))?;
    frames_from_rows(rows, feature_dim)
}

pub fn parse_text_frames(data: &str, feature_dim: usize) -> Result<Array2<f32>> {
    let rows = data
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            line.split_whitespace()
                .map(|raw| {
                    raw.parse::<f32>().map_err(|_| {
                        PhonemeError::invalid_data(format!(
                            "line {}: '{raw}' is not a number",
                            idx + 1
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    frames_from_rows(rows, feature_dim)
}

fn frames_from_rows(rows: Vec<Vec<f32>>, feature_dim: usize) -> Result<Array2<f32>> {
    let frame_count = rows.len();
    let mut flat = Vec::with_capacity(frame_count * feature_dim);
    for (idx, row) in rows.into_iter().enumerate() {
        if row.len() != feature_dim {
            return Err(PhonemeError::invalid_data(format!(
                "frame {idx} has {} coefficients, expected {feature_dim}",
                row.len()
            )));
        }
        if row.iter().any(|value| !value.is_finite()) {
            return Err(PhonemeError::invalid_data(format!(
                "frame {idx} contains NaN or infinite values"
            )));
        }
        flat.extend(row);
    }
    Array2::from_shape_vec((frame_count, feature_dim), flat)
        .map_err(|err| PhonemeError::invalid_data(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use ndarray::array;
    use tempfile::tempdir;

    use super::{parse_json_frames, parse_text_frames, FeatureDir, FeatureFormat};
    use crate::phoneme::features::FeatureSource;
    use crate::phoneme::ErrorKind;

    #[test]
    fn parses_json_frames() {
        let frames = parse_json_frames("[[1.0, 2.0], [3.5, -4.0]]", 2).unwrap();
        assert_eq!(frames, array![[1.0_f32, 2.0], [3.5, -4.0]]);
    }

    #[test]
    fn parses_whitespace_frames() {
        let frames = parse_text_frames("1 2\n\n3.5\t-4\n", 2).unwrap();
        assert_eq!(frames, array![[1.0_f32, 2.0], [3.5, -4.0]]);
    }

    #[test]
    fn rejects_ragged_frames() {
        let err = parse_json_frames("[[1.0, 2.0], [3.0]]", 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().contains("frame 1"));
    }

    #[test]
    fn empty_json_array_is_an_empty_utterance() {
        let frames = parse_json_frames("[]", 39).unwrap();
        assert_eq!(frames.dim(), (0, 39));
    }

    #[test]
    fn feature_dir_reports_missing_utterances() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("present.txt"), "0 1\n2 3\n").unwrap();
        let source = FeatureDir::new(dir.path(), FeatureFormat::Txt, 2);

        assert_eq!(source.load("present").unwrap().dim(), (2, 2));
        let err = source.load("absent").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingData);
    }
}
