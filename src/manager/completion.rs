use async_channel::Sender;
use tracing::warn;

use crate::request::{NotificationId, RequestKey};

use super::Command;

/// Proof that a backend still owes the manager a completion for one dispatch.
///
/// Finishing consumes the token, so a single dispatch cannot be completed
/// twice. A token dropped without [`Completion::finish`] still releases its
/// hold, but is logged as a backend defect.
#[must_use = "a backend must finish the completion once presentation is over"]
pub struct Completion {
    key: RequestKey,
    id: NotificationId,
    backend: String,
    outbox: Sender<Command>,
    finished: bool,
}

impl Completion {
    pub(crate) fn new(
        key: RequestKey,
        id: NotificationId,
        backend: impl Into<String>,
        outbox: Sender<Command>,
    ) -> Self {
        Self {
            key,
            id,
            backend: backend.into(),
            outbox,
            finished: false,
        }
    }

    pub const fn id(&self) -> NotificationId {
        self.id
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Report that the user picked action `action` (0 is the default action).
    /// The manager activates the request and closes it.
    pub fn invoke_action(&self, action: u32) {
        let _ = self.outbox.try_send(Command::ActionInvoked {
            id: self.id,
            action,
        });
    }

    /// Report text sent through the reply action.
    pub fn reply(&self, text: impl Into<String>) {
        let _ = self.outbox.try_send(Command::Replied {
            id: self.id,
            text: text.into(),
        });
    }

    /// Release the hold taken for this dispatch.
    pub fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.outbox.is_closed() {
            return;
        }
        if !self.finished {
            warn!(
                backend = %self.backend,
                id = %self.id,
                "backend dropped its completion without finishing"
            );
        }
        let _ = self.outbox.try_send(Command::BackendFinished {
            key: self.key,
            id: self.id,
            backend: std::mem::take(&mut self.backend),
        });
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("id", &self.id)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
