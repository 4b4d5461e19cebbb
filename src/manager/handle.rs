use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_channel::Sender;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ManagerError;
use crate::request::{NotificationId, RequestKey};

use super::{Command, ManagerStats};

/// Cloneable entry point into a running [`super::NotificationManager`].
#[derive(Clone, Debug)]
pub struct ManagerHandle {
    outbox: Sender<Command>,
    next_key: Arc<AtomicU64>,
}

impl ManagerHandle {
    pub(super) fn new(outbox: Sender<Command>) -> Self {
        Self {
            outbox,
            next_key: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Mark the event configuration of `app_name` stale. It is re-read the next
    /// time a request for that application is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub fn invalidate_config(&self, app_name: impl Into<String>) -> Result<(), ManagerError> {
        self.submit(Command::InvalidateConfig {
            app_name: app_name.into(),
        })
    }

    /// Deliver a user action for the request presented as `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub fn action_invoked(&self, id: NotificationId, action: u32) -> Result<(), ManagerError> {
        self.submit(Command::ActionInvoked { id, action })
    }

    /// Deliver text typed into the reply action of the request presented as
    /// `id`. The request is closed afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub fn reply(&self, id: NotificationId, text: impl Into<String>) -> Result<(), ManagerError> {
        self.submit(Command::Replied {
            id,
            text: text.into(),
        })
    }

    /// Close the request presented as `id`. Unknown ids are ignored; with
    /// `force` the attempt is logged.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub fn close(&self, id: NotificationId, force: bool) -> Result<(), ManagerError> {
        self.submit(Command::CloseId { id, force })
    }

    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub async fn stats(&self) -> Result<ManagerStats, ManagerError> {
        self.query(|reply| Command::Stats { reply }).await
    }

    /// Stop the manager loop. Requests still open never report `Closed`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] if the manager already stopped.
    pub fn shutdown(&self) -> Result<(), ManagerError> {
        self.submit(Command::Shutdown)
    }

    pub fn is_running(&self) -> bool {
        !self.outbox.is_closed()
    }

    pub(crate) fn allocate_key(&self) -> RequestKey {
        RequestKey::new(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn submit(&self, command: Command) -> Result<(), ManagerError> {
        self.outbox.try_send(command).map_err(|err| {
            debug!(command = err.into_inner().name(), "manager is gone; dropping command");
            ManagerError::Stopped
        })
    }

    pub(crate) async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ManagerError> {
        let (reply, response) = oneshot::channel();
        self.submit(build(reply))?;
        response.await.map_err(|_| ManagerError::Stopped)
    }
}
