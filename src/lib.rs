//! Web-facing gateway to remote file servers reached over SSH/SFTP.
//!
//! A [`Gateway`] keeps one [`RemoteSession`] at a time and turns browser
//! requests (list, read, write, mkdir, remove, rename, stat, upload,
//! download) into SFTP operations. Results are shaped as `http` responses
//! with JSON bodies, so any HTTP server can host it.
//!
//! Sessions can also be driven directly:
//!
//! ```no_run
//! use sftp_gateway::{Credentials, RemoteSession, SessionConfig, SshConnector};
//!
//! # async fn run() -> sftp_gateway::Result<()> {
//! let credentials = Credentials::new("localhost", 22, "root", "pass");
//! let session = RemoteSession::connect(&SshConnector, credentials, &SessionConfig::default()).await?;
//! for entry in session.list("/").await? {
//!     println!("{} {}", if entry.is_dir { "d" } else { "-" }, entry.name);
//! }
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate async_trait;

mod config;
mod error;
/// Filesystem operations on a remote session
pub mod fs;
/// Request handling
pub mod gateway;
/// Remote path helpers
pub mod path;
mod session;
mod staging;
#[cfg(test)]
mod testing;

pub use config::{
    GatewayConfig, SessionConfig, CONNECT_TIMEOUT_ENV, DEFAULT_PORT_ENV, REQUEST_TIMEOUT_ENV,
    STAGING_DIR_ENV,
};
pub use error::{Error, ErrorKind, Op, Result};
pub use fs::{DirEntry, FileKind, StatRecord};
pub use gateway::Gateway;
pub use session::{
    Connection, Connector, Credentials, RemoteSession, SessionSlot, SshConnector, Transport,
};
pub use staging::{Staging, TransferBuffer};
