use nesbridge_core::{BridgeError, FileSource};
use std::future::Future;
use std::path::{Path, PathBuf};

/// A cartridge picked from the local filesystem.
#[derive(Debug, Clone)]
pub struct FsFile {
    path: PathBuf,
}

impl FsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileSource for FsFile {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn read(&self) -> impl Future<Output = Result<Vec<u8>, BridgeError>> + 'static {
        let result =
            std::fs::read(&self.path).map_err(|e| BridgeError::read(self.name(), e.to_string()));
        futures::future::ready(result)
    }
}
