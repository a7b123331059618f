//! Repository content fetched once per job run.

use super::ProviderDomainError;
use serde::{Deserialize, Serialize};

/// One file of repository content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    path: String,
    content: String,
}

impl SourceFile {
    /// Creates a source file.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError::EmptyFilePath`] for a blank path.
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, ProviderDomainError> {
        let raw = path.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProviderDomainError::EmptyFilePath);
        }
        Ok(Self {
            path: trimmed.to_owned(),
            content: content.into(),
        })
    }

    /// Returns the repository-relative path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the file content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Repository content at a resolved commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    commit_sha: Option<String>,
    files: Vec<SourceFile>,
}

impl RepositorySnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub const fn new(commit_sha: Option<String>, files: Vec<SourceFile>) -> Self {
        Self { commit_sha, files }
    }

    /// Returns the commit the snapshot was taken at, if known.
    #[must_use]
    pub fn commit_sha(&self) -> Option<&str> {
        self.commit_sha.as_deref()
    }

    /// Returns the files in the snapshot.
    #[must_use]
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Concatenates every file under a `--- path` header.
    #[must_use]
    pub fn render_content(&self) -> String {
        self.files
            .iter()
            .map(|file| format!("--- {}\n{}\n", file.path, file.content))
            .collect()
    }
}
