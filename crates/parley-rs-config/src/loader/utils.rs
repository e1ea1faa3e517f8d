//! Path identity for layer discovery.

use crate::ConfigError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Resolve `path` to its canonical form. Paths that do not exist yet are kept
/// verbatim so a missing cwd layer is not an error.
pub(super) fn normalize_path(path: &Path) -> Result<PathBuf, ConfigError> {
    path.canonicalize().or_else(|err| match err.kind() {
        ErrorKind::NotFound => Ok(path.to_path_buf()),
        _ => Err(ConfigError::Read {
            origin: path.display().to_string(),
            source: err,
        }),
    })
}

/// Key used to skip a layer file that was already merged under another name.
pub(super) fn unique_path(path: &Path) -> PathBuf {
    normalize_path(path).unwrap_or_else(|_| path.to_path_buf())
}
