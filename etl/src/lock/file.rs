use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::lock::{RunLockGuard, RunLocks};

/// Run locks backed by lock files, shared by every process using the same directory.
///
/// A lock is a file created with `create_new` whose name is derived from the destination identity.
/// A crashed run leaves its file behind and the lock must then be removed by hand.
#[derive(Debug, Clone)]
pub struct FileRunLocks {
    dir: PathBuf,
}

impl FileRunLocks {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the lock file path used for `identity`.
    pub fn lock_path(&self, identity: &str) -> PathBuf {
        let digest = Sha256::digest(identity.as_bytes());
        let name: String = digest[..16].iter().map(|byte| format!("{byte:02x}")).collect();

        self.dir.join(format!("{name}.lock"))
    }
}

impl RunLocks for FileRunLocks {
    fn try_acquire(&self, identity: &str) -> EtlResult<RunLockGuard> {
        std::fs::create_dir_all(&self.dir).map_err(|err| {
            etl_error!(
                ErrorKind::IoError,
                "Failed to create the run lock directory",
                format!("{}: {err}", self.dir.display()),
                source: err
            )
        })?;

        let path = self.lock_path(identity);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(etl_error!(
                    ErrorKind::RunInProgress,
                    "Another run holds the destination lock",
                    format!("{identity} (lock file {})", path.display())
                ));
            }
            Err(err) => {
                return Err(etl_error!(
                    ErrorKind::IoError,
                    "Failed to create the run lock file",
                    format!("{}: {err}", path.display()),
                    source: err
                ));
            }
        };

        // The owner is informational, the lock is the file itself.
        if let Err(err) = writeln!(file, "{} {identity}", std::process::id()) {
            warn!(path = %path.display(), error = %err, "failed to write run lock owner");
        }

        debug!(identity, path = %path.display(), "acquired run lock");

        Ok(RunLockGuard::new(identity.to_owned(), move || {
            release(&path)
        }))
    }
}

fn release(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "released run lock"),
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove run lock file"),
    }
}
