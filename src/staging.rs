//! Local temporary files bridging request/response bodies and remote files.
//!
//! A [`TransferBuffer`] deletes its file when dropped, whichever way the
//! transfer ends. Deletion failures are logged and otherwise ignored.

use std::{
    env,
    path::{Path, PathBuf},
};
use tempfile::{Builder, TempPath};
use tokio::fs;

use crate::error::{Error, Result};

const PREFIX: &str = "sftp-gateway-";

/// Creates transfer buffers inside one directory
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Default for Staging {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Staging {
    /// Stages in `dir`, or in the system temp directory
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir: dir.unwrap_or_else(env::temp_dir),
        }
    }

    /// Creates an empty buffer with a random name
    pub fn empty(&self) -> Result<TransferBuffer> {
        let file = Builder::new()
            .prefix(PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| Error::staging(&e))?;

        let buffer = TransferBuffer {
            path: file.into_temp_path(),
        };
        debug!("staged {}", buffer.path().display());
        Ok(buffer)
    }

    /// Creates a buffer holding `payload`
    pub async fn with_contents(&self, payload: &[u8]) -> Result<TransferBuffer> {
        let buffer = self.empty()?;
        fs::write(buffer.path(), payload)
            .await
            .map_err(|e| Error::staging(&e))?;
        Ok(buffer)
    }
}

/// A staged local file, removed on drop
#[derive(Debug)]
pub struct TransferBuffer {
    path: TempPath,
}

impl TransferBuffer {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the buffer for reading and removes its path right away. On unix
    /// the returned handle stays readable until dropped.
    pub async fn into_reader(self) -> Result<fs::File> {
        let file = fs::File::open(self.path())
            .await
            .map_err(|e| Error::staging(&e));
        self.release();
        file
    }

    /// Removes the buffer now instead of at drop
    pub fn release(self) {
        let display = self.path().display().to_string();
        if let Err(err) = self.path.close() {
            debug!("removing staged {display}: {err}");
        }
    }
}
