use super::{listing_order, DirEntry, StatRecord};
use crate::{
    error::{classify, Op, Result},
    session::RemoteSession,
};

impl RemoteSession {
    /// Lists a directory, directories first, then by case-insensitive name.
    /// An empty path lists the root.
    pub async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let path = if path.is_empty() { "/" } else { path };
        debug!("list {path}");

        let channel = self.channel().await?;
        let dir = channel
            .read_dir(path)
            .await
            .map_err(|e| classify(Op::List, path, e))?;

        let mut entries: Vec<DirEntry> = dir
            .map(|entry| DirEntry::new(path, entry.file_name(), &entry.metadata()))
            .collect();
        entries.sort_by(listing_order);

        Ok(entries)
    }

    pub async fn stat(&self, path: &str) -> Result<StatRecord> {
        debug!("stat {path}");

        let channel = self.channel().await?;
        let metadata = channel
            .metadata(path)
            .await
            .map_err(|e| classify(Op::Stat, path, e))?;

        Ok(StatRecord::from(&metadata))
    }
}
