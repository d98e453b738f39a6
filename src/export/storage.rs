use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::export::format::OutputFormat;
use crate::export::job::JobId;
use crate::foundation::error::OperationResult;

/// Where export jobs write their output.
pub trait Storage: Send + Sync {
    /// A fresh location for `job`'s output. Distinct jobs never receive the same path.
    fn allocate(&self, job: JobId, format: OutputFormat) -> OperationResult<PathBuf>;

    /// Remove an abandoned or failed output. Missing files are not an error.
    fn discard(&self, path: &Path);
}

/// Flat scratch directory with one `<job-id>.<ext>` file per job.
#[derive(Clone, Debug)]
pub struct ScratchStorage {
    root: PathBuf,
}

impl ScratchStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Storage for ScratchStorage {
    fn allocate(&self, job: JobId, format: OutputFormat) -> OperationResult<PathBuf> {
        std::fs::create_dir_all(&self.root).with_context(|| {
            format!("failed to create scratch directory '{}'", self.root.display())
        })?;
        Ok(self.root.join(format!("{}.{}", job.0, format.extension())))
    }

    fn discard(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "discarded partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to discard output");
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/storage.rs"]
mod tests;
