use crate::error::Result;
use crate::types::Letter;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-letter raw markup files under a data directory: `<data-dir>/<letter>.html`.
#[derive(Debug, Clone)]
pub struct LetterStore {
    data_dir: PathBuf,
}

impl LetterStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, letter: Letter) -> PathBuf {
        self.data_dir.join(format!("{}.html", letter))
    }

    /// Overwrites any previous content. An empty `html` produces an empty file.
    pub fn write(&self, letter: Letter, html: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.path_for(letter);
        fs::write(&path, html)?;
        debug!("Wrote {} bytes to {}", html.len(), path.display());
        Ok(path)
    }

    /// Reads the stored markup. A missing file is an error; an empty file reads as "".
    pub fn read(&self, letter: Letter) -> Result<String> {
        Ok(fs::read_to_string(self.path_for(letter))?)
    }

    pub fn exists(&self, letter: Letter) -> bool {
        self.path_for(letter).is_file()
    }

    /// A letter counts as cached only when its file exists and is non-empty,
    /// so a previous timeout is retried on the next fetch.
    pub fn is_cached(&self, letter: Letter) -> bool {
        fs::metadata(self.path_for(letter))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }
}
