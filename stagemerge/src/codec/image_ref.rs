//! Opaque handles to stored images.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{Result, StagemergeError};

/// Identifies where an image's bytes live on local storage.
///
/// An `ImageRef` says nothing about whether the file exists or decodes;
/// [`ImageRef::ensure_readable`] checks the former and the codec the latter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    /// Creates a handle for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Returns the underlying path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Consumes the handle, returning the path.
    #[must_use]
    pub fn into_path(self) -> PathBuf {
        self.0
    }

    /// Returns true if a regular file exists at this location.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.0.is_file()
    }

    /// Fails with a not-found error unless a regular file exists here.
    pub fn ensure_readable(&self) -> Result<()> {
        if self.exists() {
            Ok(())
        } else {
            Err(StagemergeError::not_found(&self.0))
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<&str> for ImageRef {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

impl AsRef<Path> for ImageRef {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
