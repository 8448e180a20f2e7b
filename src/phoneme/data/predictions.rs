use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::phoneme::{PhonemeError, Result};

/// Writes `Id,Class` rows, one per flat-table index.
pub fn write_predictions<W: Write>(mut writer: W, predictions: &[usize]) -> std::io::Result<()> {
    writeln!(writer, "Id,Class")?;
    for (idx, class) in predictions.iter().enumerate() {
        writeln!(writer, "{idx},{class}")?;
    }
    writer.flush()
}

pub fn save_predictions(path: &Path, predictions: &[usize]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| PhonemeError::io(parent, &err))?;
    }
    let file = File::create(path).map_err(|err| PhonemeError::io(path, &err))?;
    write_predictions(BufWriter::new(file), predictions).map_err(|err| PhonemeError::io(path, &err))
}
