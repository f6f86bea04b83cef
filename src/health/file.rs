// src/health/file.rs
use super::checker::{CheckError, Checker};
use async_trait::async_trait;
use std::path::PathBuf;

/// Fails while a file exists at `path`.
///
/// Dropping a marker file takes the instance out of rotation without
/// restarting it; removing the file brings it back on the next tick.
#[derive(Debug, Clone)]
pub struct FileChecker {
    path: PathBuf,
}

impl FileChecker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Checker for FileChecker {
    async fn probe(&self) -> Result<(), CheckError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => Err(CheckError::FileExists),
            Err(_) => Ok(()),
        }
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}
