//! Directory-backed key-value store

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

use super::KeyValueStore;
use crate::error::{Result, RoutineError};

/// Stores each key as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RoutineError::Storage(format!(
                "failed to read '{}': {e}",
                path.display()
            ))),
        }
    }

    /// Write atomically: temp file, fsync, rename.
    fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        fs::create_dir_all(&self.dir).map_err(|e| {
            RoutineError::Storage(format!(
                "failed to create data directory '{}': {e}",
                self.dir.display()
            ))
        })?;

        let mut file = fs::File::create(&tmp_path).map_err(|e| {
            RoutineError::Storage(format!("failed to create '{}': {e}", tmp_path.display()))
        })?;
        file.write_all(value.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| {
                RoutineError::Storage(format!("failed to write '{}': {e}", tmp_path.display()))
            })?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(|e| {
            RoutineError::Storage(format!(
                "failed to replace '{}': {e}",
                path.display()
            ))
        })?;

        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}
