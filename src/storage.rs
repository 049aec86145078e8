//! Output artifact persistence.
//!
//! Article texts are first written to a `.partial` staging file, measured,
//! and only renamed to `<id>.txt` once the orchestrator commits them. A failed
//! validation deletes the staging file so no truncated article is left behind.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension of committed article texts
pub const DOCUMENT_EXTENSION: &str = "txt";

/// Suffix appended to a document stem for its structured summary
pub const SUMMARY_SUFFIX: &str = "_summary.json";

const STAGING_SUFFIX: &str = ".partial";

/// File name of the summary for a given document stem
pub fn summary_file_name(stem: &str) -> String {
    format!("{}{}", stem, SUMMARY_SUFFIX)
}

/// A document written to disk but not yet committed
#[derive(Debug, PartialEq, Eq)]
pub struct StagedArtifact {
    pub id: String,
    pub path: PathBuf,
    /// Size on disk
    pub bytes: u64,
}

/// A directory of pipeline outputs
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open a store, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path of a committed article text
    pub fn document_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", id, DOCUMENT_EXTENSION))
    }

    fn staging_path(&self, id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}{}", id, DOCUMENT_EXTENSION, STAGING_SUFFIX))
    }

    /// Write a document to its staging file and report its size
    pub fn stage(&self, id: &str, contents: &str) -> Result<StagedArtifact> {
        let path = self.staging_path(id);
        std::fs::write(&path, contents)?;
        let bytes = std::fs::metadata(&path)?.len();
        debug!(id = id, bytes = bytes, "Staged document");
        Ok(StagedArtifact {
            id: id.to_string(),
            path,
            bytes,
        })
    }

    /// Delete a staged document
    pub fn discard(&self, staged: StagedArtifact) -> Result<()> {
        if staged.path.exists() {
            std::fs::remove_file(&staged.path)?;
            debug!(id = %staged.id, "Discarded staged document");
        }
        Ok(())
    }

    /// Move a staged document to its final name
    pub fn commit(&self, staged: StagedArtifact) -> Result<PathBuf> {
        let target = self.document_path(&staged.id);
        std::fs::rename(&staged.path, &target)?;
        info!(id = %staged.id, bytes = staged.bytes, path = ?target, "Committed document");
        Ok(target)
    }

    /// Write any named file directly (summaries)
    pub fn write(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root.join(file_name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Files in the store with the given suffix, sorted by name
    pub fn list(&self, suffix: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            let matches = path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(suffix));
            if matches {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Committed article texts, sorted by name
    pub fn documents(&self) -> Result<Vec<PathBuf>> {
        self.list(&format!(".{}", DOCUMENT_EXTENSION))
    }

    /// Remove staging files left over from an interrupted run
    pub fn clean_staging(&self) -> Result<usize> {
        let leftovers = self.list(STAGING_SUFFIX)?;
        for path in &leftovers {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = ?path, error = %e, "Failed to remove leftover staging file");
            }
        }
        Ok(leftovers.len())
    }
}

/// File stem of a path, or an empty string
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
