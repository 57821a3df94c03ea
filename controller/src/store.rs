use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use heatpump_common::{PreferenceBackend, StoreError};

/// One file per preference key. A save returns only after the bytes are
/// renamed into place.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }
}

impl PreferenceBackend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err.to_string())),
        }
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|err| StoreError::Io(err.to_string()))?;

        let path = self.path_for(key);
        let staging = path.with_extension("tmp");
        std::fs::write(&staging, bytes).map_err(|err| StoreError::Io(err.to_string()))?;
        std::fs::rename(&staging, &path).map_err(|err| StoreError::Io(err.to_string()))
    }
}
