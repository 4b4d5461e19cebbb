//! Caller-facing notification handle.

use async_channel::{Receiver, unbounded};
use tracing::debug;

use crate::error::ManagerError;
use crate::manager::{Command, Dispatched, ManagerHandle};
use crate::request::{NotificationRequest, RequestId, RequestKey, RequestSnapshot};
use crate::types::{Context, Icon, NotificationFlags, ReplyAction, Urgency};

/// Events reported back to the owner of a [`Notification`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotificationEvent {
    /// The user picked an action; 0 is the default action.
    Activated(u32),
    /// The user sent text through the reply action.
    Replied(String),
    /// The reply action was picked where inline replies are unsupported.
    ReplyActivated,
    /// The current episode is over.
    Closed,
}

/// A notification owned by application code.
///
/// Setters only touch local content until the notification is sent. Once it
/// is being presented, a change is forwarded to the manager, which refreshes
/// the backends after a short quiet period.
///
/// Dropping the handle does not close a notification that is being presented.
#[derive(Debug)]
pub struct Notification {
    key: RequestKey,
    request: NotificationRequest,
    manager: ManagerHandle,
    events: Receiver<NotificationEvent>,
    configured_urgency: Option<Urgency>,
}

impl Notification {
    pub fn new(manager: &ManagerHandle, event_id: impl Into<String>) -> Self {
        Self::with_flags(manager, event_id, NotificationFlags::default())
    }

    pub fn with_flags(
        manager: &ManagerHandle,
        event_id: impl Into<String>,
        flags: NotificationFlags,
    ) -> Self {
        let key = manager.allocate_key();
        let request = NotificationRequest::new(event_id, flags);
        let (events_tx, events) = unbounded();
        if manager
            .submit(Command::Register {
                key,
                request: request.clone(),
                events: events_tx,
            })
            .is_err()
        {
            debug!(%key, "notification created after the manager stopped");
        }
        Self {
            key,
            request,
            manager: manager.clone(),
            events,
            configured_urgency: None,
        }
    }

    pub fn event_id(&self) -> &str {
        self.request.event_id()
    }

    pub fn title(&self) -> &str {
        &self.request.title
    }

    pub fn text(&self) -> &str {
        &self.request.text
    }

    pub const fn icon(&self) -> Option<&Icon> {
        self.request.icon.as_ref()
    }

    pub fn actions(&self) -> &[String] {
        &self.request.actions
    }

    pub fn default_action(&self) -> Option<&str> {
        self.request.default_action.as_deref()
    }

    pub fn contexts(&self) -> &[Context] {
        &self.request.contexts
    }

    pub fn component_name(&self) -> Option<&str> {
        self.request.component_name.as_deref()
    }

    pub const fn flags(&self) -> NotificationFlags {
        self.request.flags
    }

    /// The urgency set on this notification, or the one its event
    /// configuration supplied at the last send.
    pub fn urgency(&self) -> Urgency {
        match (self.request.urgency, self.configured_urgency) {
            (Urgency::Default, Some(configured)) => configured,
            (urgency, _) => urgency,
        }
    }

    pub fn hint(&self, key: &str) -> Option<&str> {
        self.request.hints.get(key).map(String::as_str)
    }

    pub const fn reply_action(&self) -> Option<&ReplyAction> {
        self.request.reply_action.as_ref()
    }

    pub const fn request(&self) -> &NotificationRequest {
        &self.request
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        self.change(|request| replace(&mut request.title, title));
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.change(|request| replace(&mut request.text, text));
    }

    pub fn set_icon_name(&mut self, name: impl Into<String>) {
        let icon = Some(Icon::Name(name.into()));
        self.change(|request| replace(&mut request.icon, icon));
    }

    /// Attach encoded image data instead of a themed icon name.
    pub fn set_pixmap(&mut self, data: Vec<u8>) {
        let icon = Some(Icon::Pixmap(data));
        self.change(|request| replace(&mut request.icon, icon));
    }

    pub fn set_actions<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions: Vec<String> = actions.into_iter().map(Into::into).collect();
        self.change(|request| replace(&mut request.actions, actions));
    }

    pub fn set_default_action(&mut self, label: impl Into<String>) {
        let label = Some(label.into());
        self.change(|request| replace(&mut request.default_action, label));
    }

    pub fn set_flags(&mut self, flags: NotificationFlags) {
        self.change(|request| replace(&mut request.flags, flags));
    }

    pub fn set_urgency(&mut self, urgency: Urgency) {
        self.change(|request| replace(&mut request.urgency, urgency));
    }

    pub fn set_component_name(&mut self, component: impl Into<String>) {
        let component = Some(component.into());
        self.change(|request| replace(&mut request.component_name, component));
    }

    /// Set a backend hint, e.g. [`crate::RESIDENT_HINT`].
    pub fn set_hint(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.change(|request| {
            let previous = request.hints.insert(key, value.clone());
            previous.as_deref() != Some(value.as_str())
        });
    }

    pub fn set_reply_action(&mut self, reply: ReplyAction) {
        let reply = Some(reply);
        self.change(|request| replace(&mut request.reply_action, reply));
    }

    pub fn add_context(&mut self, context: Context) {
        self.change(|request| {
            request.contexts.push(context);
            true
        });
    }

    pub fn set_contexts(&mut self, contexts: Vec<Context>) {
        self.change(|request| replace(&mut request.contexts, contexts));
    }

    fn change(&mut self, apply: impl FnOnce(&mut NotificationRequest) -> bool) {
        if !apply(&mut self.request) {
            return;
        }
        let _ = self.manager.submit(Command::Modify {
            key: self.key,
            request: self.request.clone(),
        });
    }

    /// Send the notification, or re-present it if it is still active.
    ///
    /// Returns [`RequestId::Unset`] when the event resolves to no backend; the
    /// notification then closes immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub async fn send_event(&mut self) -> Result<RequestId, ManagerError> {
        let key = self.key;
        let request = self.request.clone();
        let Dispatched { id, urgency } = self
            .manager
            .query(|reply| Command::Dispatch {
                key,
                request,
                reply,
            })
            .await?;
        self.configured_urgency = urgency;
        Ok(id)
    }

    /// Keep the notification open until a matching [`Notification::release`].
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub fn retain(&self) -> Result<(), ManagerError> {
        self.manager.submit(Command::Retain { key: self.key })
    }

    /// Drop a hold taken with [`Notification::retain`]. Releasing the last
    /// hold closes the notification.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub fn release(&self) -> Result<(), ManagerError> {
        self.manager.submit(Command::Release { key: self.key })
    }

    /// Close the notification now. Closing twice reports `Closed` once.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub fn close(&self) -> Result<(), ManagerError> {
        self.manager.submit(Command::Close { key: self.key })
    }

    /// Push pending content changes to the backends without waiting for the
    /// debounce timer.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub fn update(&self) -> Result<(), ManagerError> {
        self.manager.submit(Command::Update { key: self.key })
    }

    /// Wait for the next event. `None` once the manager is gone.
    pub async fn next_event(&self) -> Option<NotificationEvent> {
        self.events.recv().await.ok()
    }

    pub fn try_next_event(&self) -> Option<NotificationEvent> {
        self.events.try_recv().ok()
    }

    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub async fn snapshot(&self) -> Result<RequestSnapshot, ManagerError> {
        let key = self.key;
        self.manager
            .query(|reply| Command::Inspect { key, reply })
            .await?
            .ok_or(ManagerError::Stopped)
    }

    /// # Errors
    ///
    /// Returns [`ManagerError::Stopped`] once the manager has shut down.
    pub async fn id(&self) -> Result<RequestId, ManagerError> {
        self.snapshot().await.map(|snapshot| snapshot.id)
    }
}

impl Drop for Notification {
    fn drop(&mut self) {
        let _ = self.manager.submit(Command::Detach { key: self.key });
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
