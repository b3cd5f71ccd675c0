use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{
    error::{classify, classify_io, Op, Result},
    session::RemoteSession,
};

impl RemoteSession {
    /// Reads a file as text, at most `max_bytes` bytes when given.
    ///
    /// The cap applies to raw bytes before decoding. Invalid UTF-8, including
    /// a code point cut by the cap, is replaced with U+FFFD.
    pub async fn read(&self, path: &str, max_bytes: Option<u64>) -> Result<String> {
        debug!("read {path} (max {max_bytes:?})");

        let channel = self.channel().await?;
        let mut file = channel
            .open(path)
            .await
            .map_err(|e| classify(Op::Read, path, e))?;

        let mut buffer = Vec::new();
        let read = match max_bytes {
            Some(cap) => (&mut file).take(cap).read_to_end(&mut buffer).await,
            None => file.read_to_end(&mut buffer).await,
        }
        .map_err(|e| classify_io(Op::Read, path, &e))?;
        debug!("read {read} bytes from {path}");

        if let Err(err) = file.shutdown().await {
            debug!("closing {path}: {err}");
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Creates or truncates `path` and writes `content` to it
    pub async fn write(&self, path: &str, content: &str) -> Result<()> {
        debug!("write {path} ({} bytes)", content.len());

        let channel = self.channel().await?;
        let mut file = channel
            .create(path)
            .await
            .map_err(|e| classify(Op::Write, path, e))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| classify_io(Op::Write, path, &e))?;
        file.shutdown()
            .await
            .map_err(|e| classify_io(Op::Write, path, &e))?;

        Ok(())
    }
}
