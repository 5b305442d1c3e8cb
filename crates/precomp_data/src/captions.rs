//! Caption text store: one caption per line of `<split>_caps.txt`.

use crate::types::{DatasetResult, PrecompError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub struct CaptionStore {
    captions: Vec<String>,
}

impl CaptionStore {
    /// Reads the caption file, trimming surrounding whitespace per line.
    ///
    /// A missing file yields an empty store instead of an error; splits
    /// without captions stay constructible and fail on first fetch.
    pub fn load(path: &Path) -> DatasetResult<Self> {
        let mut captions = Vec::new();
        if path.exists() {
            let file = File::open(path).map_err(|e| PrecompError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| PrecompError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                captions.push(line.trim().to_string());
            }
        }
        Ok(CaptionStore { captions })
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    pub fn get(&self, index: usize) -> DatasetResult<&str> {
        self.captions
            .get(index)
            .map(String::as_str)
            .ok_or(PrecompError::IndexOutOfRange {
                what: "caption",
                index,
                len: self.captions.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_trimmed_lines() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dev_caps.txt");
        fs::write(&path, "a dog runs\n  two cats sit  \n\nbirds fly\n")?;
        let store = CaptionStore::load(&path)?;
        assert_eq!(store.len(), 4);
        assert_eq!(store.get(0)?, "a dog runs");
        assert_eq!(store.get(1)?, "two cats sit");
        assert_eq!(store.get(2)?, "");
        assert_eq!(store.get(3)?, "birds fly");
        Ok(())
    }

    #[test]
    fn missing_file_is_an_empty_store() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CaptionStore::load(&dir.path().join("nope_caps.txt"))?;
        assert!(store.is_empty());
        assert!(matches!(
            store.get(0),
            Err(PrecompError::IndexOutOfRange { len: 0, .. })
        ));
        Ok(())
    }
}
