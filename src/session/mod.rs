//! Remote session lifecycle.
//!
//! A [`RemoteSession`] owns one SSH transport and the SFTP channel opened on
//! it. The [`SessionSlot`] keeps at most one of them alive per gateway.

mod connector;
mod slot;

pub use connector::{Connection, Connector, SshConnector, Transport};
pub use slot::SessionSlot;

use russh_sftp::client::SftpSession;
use std::fmt;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::{
    config::SessionConfig,
    error::{Error, Result},
};

/// Where to connect and as whom. The password only lives in memory and is
/// never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new<H, U, P>(host: H, port: u16, username: U, password: P) -> Self
    where
        H: Into<String>,
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

struct Link {
    channel: SftpSession,
    transport: Box<dyn Transport>,
}

/// One authenticated connection to a remote file server.
///
/// Filesystem operations lock the link for their whole duration, so requests
/// on a session never interleave on the channel. Once disconnected every
/// operation fails with "not connected".
pub struct RemoteSession {
    credentials: Credentials,
    link: Mutex<Option<Link>>,
}

impl RemoteSession {
    /// Establishes the transport and the SFTP channel on top of it
    pub async fn connect(
        connector: &dyn Connector,
        credentials: Credentials,
        config: &SessionConfig,
    ) -> Result<Self> {
        info!("connecting to {credentials}");

        let Connection { transport, channel } = connector.open(&credentials, config).await?;

        info!("connected to {credentials}");
        Ok(Self {
            credentials,
            link: Mutex::new(Some(Link { channel, transport })),
        })
    }

    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.is_some()
    }

    /// Closes the channel and the transport. Safe to call repeatedly; closing
    /// errors are logged and dropped.
    pub async fn disconnect(&self) {
        let Some(link) = self.link.lock().await.take() else {
            return;
        };

        if let Err(err) = link.channel.close().await {
            debug!("closing sftp channel to {}: {err}", self.credentials);
        }
        if let Err(err) = link.transport.close().await {
            debug!("closing transport to {}: {err}", self.credentials);
        }

        info!("disconnected from {}", self.credentials);
    }

    /// Locks the channel for one operation
    pub(crate) async fn channel(&self) -> Result<MappedMutexGuard<'_, SftpSession>> {
        MutexGuard::try_map(self.link.lock().await, |link| {
            link.as_mut().map(|link| &mut link.channel)
        })
        .map_err(|_| Error::not_connected())
    }
}

impl fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSession")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
