use russh_sftp::client::{error::Error as SftpError, SftpSession};

use super::is_dir;
use crate::{
    error::{classify, is_generic_failure, Error, Op, Result},
    session::RemoteSession,
};

impl RemoteSession {
    /// Creates a directory. Fails if anything already exists at `path`.
    pub async fn mkdir(&self, path: &str) -> Result<()> {
        debug!("mkdir {path}");

        let channel = self.channel().await?;
        match channel.create_dir(path).await {
            Ok(()) => Ok(()),
            Err(err) => Err(refine_failure(&channel, Op::Mkdir, path, err).await),
        }
    }

    /// Removes a file or an empty directory.
    ///
    /// The target is inspected first because files and directories are
    /// removed through different requests.
    pub async fn remove(&self, path: &str) -> Result<()> {
        debug!("remove {path}");

        let channel = self.channel().await?;
        let metadata = channel
            .metadata(path)
            .await
            .map_err(|e| classify(Op::Remove, path, e))?;

        let removed = if is_dir(&metadata) {
            channel.remove_dir(path).await
        } else {
            channel.remove_file(path).await
        };

        match removed {
            Ok(()) => Ok(()),
            Err(err) => Err(refine_failure(&channel, Op::Remove, path, err).await),
        }
    }

    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        debug!("rename {old_path} -> {new_path}");

        let channel = self.channel().await?;
        channel
            .rename(old_path, new_path)
            .await
            .map_err(|e| classify(Op::Rename, old_path, e))
    }
}

/// Servers tend to report "exists" and "not empty" as a bare failure. Probe
/// the path to tell those apart from other failures.
async fn refine_failure(channel: &SftpSession, op: Op, path: &str, err: SftpError) -> Error {
    if !is_generic_failure(&err) {
        return classify(op, path, err);
    }

    let refined = match op {
        Op::Mkdir => channel
            .metadata(path)
            .await
            .ok()
            .map(|_| Error::already_exists(path)),
        Op::Remove => has_entries(channel, path)
            .await
            .then(|| Error::not_empty(path)),
        _ => None,
    };

    match refined {
        Some(error) => {
            warn!("{op} {path}: {error}");
            error
        }
        None => classify(op, path, err),
    }
}

async fn has_entries(channel: &SftpSession, path: &str) -> bool {
    channel
        .read_dir(path)
        .await
        .is_ok_and(|mut entries| entries.next().is_some())
}
