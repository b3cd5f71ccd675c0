//! Filesystem operations on a remote session.
//!
//! Every operation locks the session channel for its duration and reports
//! failures through the crate error taxonomy. Operations on a closed session
//! fail with "not connected" without touching the network.

mod browse;
mod content;
mod dir_ops;
mod transfer;

use chrono::{DateTime, Utc};
use russh_sftp::client::fs::Metadata;
use serde::Serialize;
use std::cmp::Ordering;

use crate::path::join_path;

bitflags! {
    /// File type bits of a unix mode
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileKind: u32 {
        const FIFO = 0o010_000;
        const CHR = 0o020_000;
        const DIR = 0o040_000;
        const BLK = 0o060_000;
        const REG = 0o100_000;
        const LNK = 0o120_000;
        const SOCK = 0o140_000;
    }
}

impl FileKind {
    /// `S_IFMT`
    pub const MASK: u32 = 0o170_000;

    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        Self::from_bits_retain(mode & Self::MASK)
    }

    /// Type bits are an enumeration, not a set: `BLK` shares bits with `DIR`.
    #[must_use]
    pub const fn is_dir(self) -> bool {
        self.bits() == Self::DIR.bits()
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: u64,
}

impl DirEntry {
    pub(crate) fn new(dir: &str, name: String, metadata: &Metadata) -> Self {
        Self {
            path: join_path([dir, name.as_str()]),
            name,
            is_dir: is_dir(metadata),
            size: metadata.size.unwrap_or(0),
            mtime: metadata.mtime.map_or(0, u64::from),
        }
    }
}

/// Directories first, then case-insensitive name
pub(crate) fn listing_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

/// Metadata of a single remote path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRecord {
    pub size: u64,
    pub mtime: u64,
    /// Raw permission and type bits
    pub mode: u32,
    pub is_dir: bool,
}

impl StatRecord {
    /// Modification time as a UTC timestamp
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.mtime)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl From<&Metadata> for StatRecord {
    fn from(metadata: &Metadata) -> Self {
        Self {
            size: metadata.size.unwrap_or(0),
            mtime: metadata.mtime.map_or(0, u64::from),
            mode: metadata.permissions.unwrap_or(0),
            is_dir: is_dir(metadata),
        }
    }
}

fn is_dir(metadata: &Metadata) -> bool {
    metadata
        .permissions
        .is_some_and(|mode| FileKind::from_mode(mode).is_dir())
}
