use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::{Connector, Credentials, RemoteSession};
use crate::{
    config::SessionConfig,
    error::{Error, Result},
};

/// Holds the single active session of a gateway.
///
/// Connect and disconnect are serialized against each other. A replaced
/// session is taken out of the slot before it is closed, so new requests
/// never pick it up; requests that already hold it finish first or fail
/// with "not connected".
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: RwLock<Option<Arc<RemoteSession>>>,
    lifecycle: Mutex<()>,
}

impl SessionSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes whatever session is active, then connects a new one. A failed
    /// connect leaves the slot empty.
    pub async fn connect(
        &self,
        connector: &dyn Connector,
        credentials: Credentials,
        config: &SessionConfig,
    ) -> Result<Arc<RemoteSession>> {
        let _lifecycle = self.lifecycle.lock().await;

        let previous = self.current.write().await.take();
        if let Some(previous) = previous {
            debug!("replacing session {}", previous.credentials());
            previous.disconnect().await;
        }

        let session = Arc::new(RemoteSession::connect(connector, credentials, config).await?);
        *self.current.write().await = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Closes the active session, if any
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let previous = self.current.write().await.take();
        if let Some(previous) = previous {
            previous.disconnect().await;
        }
    }

    /// The active session, or "not connected"
    pub async fn current(&self) -> Result<Arc<RemoteSession>> {
        self.current
            .read()
            .await
            .clone()
            .ok_or_else(Error::not_connected)
    }
}
