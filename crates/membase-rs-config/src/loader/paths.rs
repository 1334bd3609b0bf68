//! Path bookkeeping for layer discovery.

use crate::ConfigError;
use log::debug;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Resolve the working directory; a directory that does not exist yet is kept as given.
pub(super) fn resolve_cwd(cwd: &Path) -> Result<PathBuf, ConfigError> {
    match cwd.canonicalize() {
        Ok(resolved) => Ok(resolved),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("cwd does not exist, using it verbatim (cwd={})", cwd.display());
            Ok(cwd.to_path_buf())
        }
        Err(source) => Err(ConfigError::ReadFailed {
            layer: format!("cwd({})", cwd.display()),
            source,
        }),
    }
}

/// Layer files already merged, keyed by canonical path.
#[derive(Debug, Default)]
pub(super) struct SeenLayers(HashSet<PathBuf>);

impl SeenLayers {
    /// Record `path`; false when the same file was merged before.
    pub(super) fn first_visit(&mut self, path: &Path) -> bool {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.0.insert(key)
    }
}
