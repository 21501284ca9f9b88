use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use failure::ResultExt;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::errors::*;

pub type IntentName = String;
pub type SlotName = String;

/// Index and value of the highest element, the first one wins ties
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .enumerate()
        .fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if *value <= best_value => best,
            _ => Some((index, *value)),
        })
}

/// Row-major one-hot encoding of `labels` over `depth` classes
pub fn one_hot(labels: &[usize], depth: usize) -> Vec<f32> {
    let mut encoded = vec![0.0; labels.len() * depth];
    for (row, label) in labels.iter().enumerate() {
        if *label < depth {
            encoded[row * depth + label] = 1.0;
        }
    }
    encoded
}

/// Writes a file through a temporary sibling which is renamed once the write succeeded
pub fn write_atomically<P, F>(path: P, write: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&Path) -> Result<()>,
{
    let path = path.as_ref();
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&directory)
        .with_context(|_| format!("Cannot create directory {:?}", directory))?;
    let temp_file = NamedTempFile::new_in(&directory)?;
    write(temp_file.path())?;
    temp_file
        .persist(path)
        .with_context(|_| format!("Cannot write file {:?}", path))?;
    Ok(())
}

pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    write_atomically(path, |temp_path| {
        let mut writer = BufWriter::new(fs::File::create(temp_path)?);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_keeps_first_maximum() {
        assert_eq!(Some((1, 0.4)), argmax(&[0.2, 0.4, 0.4]));
        assert_eq!(None, argmax(&[]));
    }

    #[test]
    fn test_one_hot() {
        assert_eq!(
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0],
            one_hot(&[1, 0], 3)
        );
    }

    #[test]
    fn test_write_atomically_does_not_leave_partial_files() {
        // Given
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("weights.bin");

        // When
        let failed = write_atomically(&path, |_| Err(failure::format_err!("disk full")));
        write_atomically(&path, |temp_path| Ok(fs::write(temp_path, b"ok")?)).unwrap();

        // Then
        assert!(failed.is_err());
        assert_eq!(b"ok".to_vec(), fs::read(&path).unwrap());
        assert_eq!(1, fs::read_dir(directory.path()).unwrap().count());
    }
}
