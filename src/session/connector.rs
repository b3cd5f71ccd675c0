use russh::{client, keys::ssh_key, Disconnect};
use russh_sftp::client::SftpSession;
use std::sync::Arc;
use tokio::time;

use super::Credentials;
use crate::{
    config::SessionConfig,
    error::{Error, Result},
};

/// Transport-level half of a connection. Closing it tears down every
/// channel layered on top.
#[async_trait]
pub trait Transport: Send {
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A freshly established transport with its SFTP channel
pub struct Connection {
    pub transport: Box<dyn Transport>,
    pub channel: SftpSession,
}

/// Opens connections to remote file servers
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, credentials: &Credentials, config: &SessionConfig) -> Result<Connection>;
}

/// Connects over SSH with password authentication and starts the `sftp`
/// subsystem.
///
/// Host keys are accepted without verification. Public-key and agent
/// authentication are never attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

struct PermissiveHostKeys {
    host: String,
    port: u16,
}

impl client::Handler for PermissiveHostKeys {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        warn!(
            "accepting unverified {} host key from {}:{}",
            server_public_key.algorithm(),
            self.host,
            self.port
        );
        Ok(true)
    }
}

struct SshTransport {
    handle: client::Handle<PermissiveHostKeys>,
}

#[async_trait]
impl Transport for SshTransport {
    async fn close(self: Box<Self>) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn open(&self, credentials: &Credentials, config: &SessionConfig) -> Result<Connection> {
        let limit = config.connect_timeout();
        let ssh_config = Arc::new(client::Config::default());
        let handler = PermissiveHostKeys {
            host: credentials.host.clone(),
            port: credentials.port,
        };

        let addr = (credentials.host.as_str(), credentials.port);
        let mut handle = time::timeout(limit, client::connect(ssh_config, addr, handler)).await??;

        let auth = time::timeout(
            limit,
            handle.authenticate_password(credentials.username.clone(), credentials.password()),
        )
        .await??;
        if !auth.success() {
            let _ = handle.disconnect(Disconnect::ByApplication, "", "en").await;
            return Err(Error::auth_failed(format!(
                "server rejected password for {}",
                credentials.username
            )));
        }

        let channel = time::timeout(limit, handle.channel_open_session()).await??;
        time::timeout(limit, channel.request_subsystem(true, "sftp")).await??;

        let sftp = time::timeout(limit, SftpSession::new(channel.into_stream()))
            .await?
            .map_err(Error::handshake)?;
        sftp.set_timeout(config.request_timeout_secs);

        Ok(Connection {
            transport: Box::new(SshTransport { handle }),
            channel: sftp,
        })
    }
}
