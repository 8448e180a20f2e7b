use ndarray::{Array1, Array2, Axis};
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use super::window::concat_frames;
use crate::phoneme::data::LabelTable;
use crate::phoneme::{FlatDataset, PhonemeError, Result};

/// Anything able to produce the raw `frames x feature_dim` matrix of an utterance.
pub trait FeatureSource: Sync {
    fn load(&self, utterance_id: &str) -> Result<Array2<f32>>;
}

impl<F> FeatureSource for F
where
    F: Fn(&str) -> Result<Array2<f32>> + Sync,
{
    fn load(&self, utterance_id: &str) -> Result<Array2<f32>> {
        self(utterance_id)
    }
}

/// Turns an ordered list of utterances into one flat, label-aligned table.
#[derive(Debug, Clone, Copy)]
pub struct DatasetAssembler {
    concat_nframes: usize,
    feature_dim: usize,
    parallel: bool,
}

type Block = (Array2<f32>, Option<Vec<usize>>);

impl DatasetAssembler {
    pub fn new(concat_nframes: usize, feature_dim: usize) -> Result<Self> {
        if concat_nframes % 2 == 0 {
            return Err(PhonemeError::invalid_argument(format!(
                "window size must be odd, got {concat_nframes}"
            )));
        }
        if feature_dim == 0 {
            return Err(PhonemeError::invalid_argument("feature dimension must be positive"));
        }
        Ok(Self {
            concat_nframes,
            feature_dim,
            parallel: false,
        })
    }

    /// Loads and windows utterances on the rayon pool. Output order is unchanged.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn output_dim(&self) -> usize {
        self.feature_dim * self.concat_nframes
    }

    pub fn assemble<S>(
        &self,
        utterance_ids: &[String],
        source: &S,
        labels: Option<&LabelTable>,
    ) -> Result<FlatDataset>
    where
        S: FeatureSource + ?Sized,
    {
        let blocks: Vec<Block> = if self.parallel {
            utterance_ids
                .par_iter()
                .map(|id| self.prepare(id, source, labels))
                .collect::<Result<Vec<Block>>>()?
        } else {
            utterance_ids
                .iter()
                .map(|id| self.prepare(id, source, labels))
                .collect::<Result<Vec<Block>>>()?
        };

        if blocks.is_empty() {
            return Ok(FlatDataset::empty(self.output_dim(), labels.is_some()));
        }

        let views: Vec<_> = blocks.iter().map(|(features, _)| features.view()).collect();
        let features = ndarray::concatenate(Axis(0), &views)
            .map_err(|err| PhonemeError::invalid_data(format!("cannot stack frames: {err}")))?;

        let labels = labels.map(|_| {
            let flat: Vec<usize> = blocks
                .iter()
                .filter_map(|(_, labels)| labels.as_deref())
                .flatten()
                .copied()
                .collect();
            Array1::from_vec(flat)
        });

        Ok(FlatDataset { features, labels })
    }

    fn prepare<S>(&self, id: &str, source: &S, labels: Option<&LabelTable>) -> Result<Block>
    where
        S: FeatureSource + ?Sized,
    {
        let aligned = match labels {
            Some(table) => Some(table.get(id).ok_or_else(|| {
                PhonemeError::missing_data(format!("no labels for utterance {id}"))
            })?),
            None => None,
        };

        let raw = source.load(id)?;
        let frame_count = raw.len_of(Axis(0));
        let raw = if frame_count == 0 {
            Array2::zeros((0, self.feature_dim))
        } else if raw.len_of(Axis(1)) != self.feature_dim {
            return Err(PhonemeError::invalid_data(format!(
                "utterance {id} has {} features per frame, expected {}",
                raw.len_of(Axis(1)),
                self.feature_dim
            )));
        } else {
            raw
        };

        if let Some(aligned) = aligned {
            if aligned.len() != frame_count {
                return Err(PhonemeError::invalid_data(format!(
                    "utterance {id} has {frame_count} frames but {} labels",
                    aligned.len()
                )));
            }
        }

        let windowed = concat_frames(raw.view(), self.concat_nframes)?;
        debug!(utterance = id, frames = frame_count, "windowed utterance");
        Ok((windowed, aligned.map(<[usize]>::to_vec)))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use super::DatasetAssembler;
    use crate::phoneme::data::LabelTable;
    use crate::phoneme::{ErrorKind, PhonemeError, Result};

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|id| id.to_string()).collect()
    }

    fn ramp(id: &str) -> Result<Array2<f32>> {
        match id {
            "a" => Ok(array![[0.0_f32, 1.0], [2.0, 3.0]]),
            "b" => Ok(array![[4.0_f32, 5.0], [6.0, 7.0], [8.0, 9.0]]),
            other => Err(PhonemeError::missing_data(format!("no features for {other}"))),
        }
    }

    #[test]
    fn keeps_utterance_order_and_label_alignment() {
        let labels: LabelTable = [
            ("a".to_string(), vec![0, 1]),
            ("b".to_string(), vec![2, 3, 4]),
        ]
        .into_iter()
        .collect();
        let assembler = DatasetAssembler::new(3, 2).unwrap();

        let dataset = assembler
            .assemble(&ids(&["b", "a"]), &ramp, Some(&labels))
            .unwrap();

        assert_eq!(dataset.features.dim(), (5, 6));
        assert_eq!(dataset.labels.unwrap().to_vec(), vec![2, 3, 4, 0, 1]);
        assert_eq!(
            dataset.features.row(3).to_vec(),
            vec![0.0, 1.0, 0.0, 1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn unlabelled_assembly_has_no_labels() {
        let assembler = DatasetAssembler::new(1, 2).unwrap();
        let dataset = assembler.assemble(&ids(&["a"]), &ramp, None).unwrap();
        assert!(dataset.labels.is_none());
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn rejects_label_count_mismatch() {
        let labels: LabelTable = [("a".to_string(), vec![0, 1, 2])].into_iter().collect();
        let assembler = DatasetAssembler::new(3, 2).unwrap();
        let err = assembler
            .assemble(&ids(&["a"]), &ramp, Some(&labels))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_wrong_feature_dimension() {
        let assembler = DatasetAssembler::new(3, 39).unwrap();
        let err = assembler.assemble(&ids(&["a"]), &ramp, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn propagates_missing_features() {
        let assembler = DatasetAssembler::new(3, 2).unwrap();
        let err = assembler.assemble(&ids(&["zzz"]), &ramp, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingData);
    }

    #[test]
    fn empty_id_list_yields_empty_table() {
        let assembler = DatasetAssembler::new(5, 2).unwrap();
        let dataset = assembler.assemble(&[], &ramp, None).unwrap();
        assert_eq!(dataset.features.dim(), (0, 10));
        assert!(dataset.is_empty());
    }
}
