use std::path::Path;
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};

use super::is_dir;
use crate::{
    error::{classify, classify_io, Error, Op, Result},
    session::RemoteSession,
};

impl RemoteSession {
    /// Copies a local file to `remote_path`, replacing any existing file
    pub async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        debug!("upload {} -> {remote_path}", local_path.display());

        let channel = self.channel().await?;
        let mut local = File::open(local_path)
            .await
            .map_err(|e| Error::staging(&e))?;
        let mut remote = channel
            .create(remote_path)
            .await
            .map_err(|e| classify(Op::Upload, remote_path, e))?;

        let copied = io::copy(&mut local, &mut remote)
            .await
            .map_err(|e| classify_io(Op::Upload, remote_path, &e))?;
        remote
            .shutdown()
            .await
            .map_err(|e| classify_io(Op::Upload, remote_path, &e))?;

        debug!("uploaded {copied} bytes to {remote_path}");
        Ok(())
    }

    /// Copies `remote_path` into an existing local file. Directories are
    /// rejected before anything is written locally.
    pub async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        debug!("download {remote_path} -> {}", local_path.display());

        let channel = self.channel().await?;
        let metadata = channel
            .metadata(remote_path)
            .await
            .map_err(|e| classify(Op::Download, remote_path, e))?;
        if is_dir(&metadata) {
            let error = Error::is_directory(remote_path);
            warn!("{} {remote_path}: {error}", Op::Download);
            return Err(error);
        }

        let mut remote = channel
            .open(remote_path)
            .await
            .map_err(|e| classify(Op::Download, remote_path, e))?;
        let mut local = File::create(local_path)
            .await
            .map_err(|e| Error::staging(&e))?;

        let copied = io::copy(&mut remote, &mut local)
            .await
            .map_err(|e| classify_io(Op::Download, remote_path, &e))?;
        local.flush().await.map_err(|e| Error::staging(&e))?;

        if let Err(err) = remote.shutdown().await {
            debug!("closing {remote_path}: {err}");
        }

        debug!("downloaded {copied} bytes from {remote_path}");
        Ok(())
    }
}
