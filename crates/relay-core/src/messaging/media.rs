use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::messaging::types::MediaKind;

/// A downloaded media file that is deleted from disk when dropped.
///
/// The router holds one of these only for the duration of a delivery attempt,
/// so cleanup happens on every path out of it, including early returns.
#[derive(Debug)]
pub struct TempMedia {
    path: PathBuf,
    kind: MediaKind,
}

impl TempMedia {
    /// Take ownership of a file that already exists at `path`.
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "temporary media removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove temporary media"),
        }
    }
}
