use std::path::{Path, PathBuf};
use std::fs;
use crate::core::config::Config;
use crate::core::error::Result;

/// On-disk naming of the engine objects backing one index. Every path is
/// relative to the host data directory.
///
/// ```text
/// <base>.grn      key table
/// <base>.grn.<n>  column of attribute n (1-based)
/// <base>.grn.i    inverted index table
/// <base>.grn.r    index column `ref`
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub data_dir: PathBuf,      // Host data directory
    pub database_path: PathBuf, // Engine database, relative to data_dir
}

impl StorageLayout {
    pub fn new(config: &Config) -> Result<Self> {
        let layout = StorageLayout {
            data_dir: config.data_dir.clone(),
            database_path: config.database_path(),
        };

        if let Some(parent) = layout.resolve(&layout.database_path).parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(layout)
    }

    pub fn key_table_path(base: &Path) -> PathBuf {
        with_suffix(base, ".grn")
    }

    pub fn column_path(base: &Path, attno: usize) -> PathBuf {
        with_suffix(base, &format!(".grn.{}", attno))
    }

    pub fn lexicon_path(base: &Path) -> PathBuf {
        with_suffix(base, ".grn.i")
    }

    pub fn index_column_path(base: &Path) -> PathBuf {
        with_suffix(base, ".grn.r")
    }

    /// Lock file serializing mutations of one index across processes.
    pub fn lock_path(&self, base: &Path) -> PathBuf {
        self.resolve(&with_suffix(base, ".lock"))
    }

    /// Lock file of the engine database as a whole.
    pub fn database_lock_path(&self) -> PathBuf {
        self.resolve(&with_suffix(&self.database_path, ".lock"))
    }

    /// Absolute location of a data-directory-relative path.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.data_dir.join(relative)
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_paths_share_the_index_base() {
        let base = Path::new("base/1/16384");
        assert_eq!(StorageLayout::key_table_path(base), PathBuf::from("base/1/16384.grn"));
        assert_eq!(StorageLayout::column_path(base, 2), PathBuf::from("base/1/16384.grn.2"));
        assert_eq!(StorageLayout::lexicon_path(base), PathBuf::from("base/1/16384.grn.i"));
        assert_eq!(StorageLayout::index_column_path(base), PathBuf::from("base/1/16384.grn.r"));
    }

    #[test]
    fn database_lives_under_data_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let layout = StorageLayout::new(&Config::with_data_dir(dir.path())).unwrap();
        assert_eq!(layout.resolve(&layout.database_path), dir.path().join("base/1/grn"));
        assert!(dir.path().join("base/1").is_dir());
    }
}
