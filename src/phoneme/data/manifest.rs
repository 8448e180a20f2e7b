use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::phoneme::{PhonemeError, Result};

/// Reads a split manifest: one utterance id per line.
pub fn read_manifest(path: &Path) -> Result<Vec<String>> {
    let data = fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            PhonemeError::missing_data(format!("manifest {} not found", path.display()))
        } else {
            PhonemeError::io(path, &err)
        }
    })?;
    parse_manifest(&data)
        .map_err(|err| PhonemeError::invalid_data(format!("{}: {}", path.display(), err.message())))
}

/// Trimmed ids in file order. Blank lines are skipped and a repeated id is `InvalidData`.
pub fn parse_manifest(data: &str) -> Result<Vec<String>> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut ids = Vec::new();
    for (idx, line) in data.lines().enumerate() {
        let id = line.trim();
        if id.is_empty() {
            continue;
        }
        if let Some(first) = seen.insert(id, idx + 1) {
            return Err(PhonemeError::invalid_data(format!(
                "manifest line {} repeats utterance {id} from line {first}",
                idx + 1
            )));
        }
        ids.push(id.to_string());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{parse_manifest, read_manifest};
    use crate::phoneme::ErrorKind;

    #[test]
    fn trims_and_skips_blank_lines() {
        let ids = parse_manifest("a-1\n  b-2  \r\n\n c-3\n").unwrap();
        assert_eq!(ids, vec!["a-1", "b-2", "c-3"]);
    }

    #[test]
    fn repeated_id_is_invalid_data() {
        let err = parse_manifest("a\nb\n\n  a \n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().contains("line 4"), "{}", err.message());
        assert!(err.message().contains("line 1"), "{}", err.message());
    }

    #[test]
    fn read_reports_file_for_repeated_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train_split.txt");
        fs::write(&path, "a\nb\nc\nd\na\n").unwrap();

        let err = read_manifest(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().contains("train_split.txt"));
    }

    #[test]
    fn missing_manifest_is_missing_data() {
        let dir = tempdir().unwrap();
        let err = read_manifest(&dir.path().join("absent.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingData);
    }
}
