use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::phoneme::{PhonemeError, Result};

/// Per-frame phoneme labels keyed by utterance id.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    entries: HashMap<String, Vec<usize>>,
}

impl LabelTable {
    pub fn from_path(path: &Path, class_count: usize) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|err| PhonemeError::io(path, &err))?;
        Self::parse(&data, class_count)
    }

    /// Parses `<utterance_id> <label_0> ... <label_n>` lines. Blank lines are skipped.
    pub fn parse(data: &str, class_count: usize) -> Result<Self> {
        let mut entries = HashMap::new();

        for (idx, line) in data.lines().enumerate() {
            let mut parts = line.split_whitespace();
            let Some(id) = parts.next() else {
                continue;
            };

            let labels = parts
                .map(|raw| parse_label(raw, class_count, idx + 1))
                .collect::<Result<Vec<_>>>()?;

            if entries.insert(id.to_string(), labels).is_some() {
                return Err(PhonemeError::invalid_data(format!(
                    "label line {} repeats utterance {id}",
                    idx + 1
                )));
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, utterance_id: &str) -> Option<&[usize]> {
        self.entries.get(utterance_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Vec<usize>)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<usize>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn parse_label(raw: &str, class_count: usize, line: usize) -> Result<usize> {
    let label: usize = raw.parse().map_err(|_| {
        PhonemeError::invalid_data(format!("label line {line}: '{raw}' is not a class id"))
    })?;
    if label >= class_count {
        return Err(PhonemeError::invalid_data(format!(
            "label line {line}: class {label} outside [0, {class_count})"
        )));
    }
    Ok(label)
}
