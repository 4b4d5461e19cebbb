use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use notify_rust::{Hint, Notification as Popup, Timeout, Urgency as PopupUrgency};
use tracing::{debug, trace, warn};

use crate::manager::Completion;
use crate::notifyrc::EventConfig;
use crate::request::{NotificationId, RESIDENT_HINT};
use crate::types::{Icon, NotificationFlags, ReplyFallback, Urgency};

use super::{Backend, Envelope};

const NAME: &str = "Popup";
const DEFAULT_ACTION_KEY: &str = "default";
const REPLY_ACTION_KEY: &str = "inline-reply";

/// Desktop popup through the freedesktop notification service.
///
/// Action `n` is sent under the key `"n"`, the default action under
/// `"default"`. The popup blocks a worker thread until it is dismissed.
/// Updates replace the popup in place; closing removes it from the screen.
#[derive(Debug)]
pub struct PopupBackend {
    timeout: Option<Duration>,
    shown: ShownPopups,
}

impl PopupBackend {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            shown: ShownPopups::default(),
        }
    }

    fn build(&self, envelope: &Envelope<'_>) -> Popup {
        let request = envelope.request;
        let summary = if request.title.is_empty() {
            envelope.app_name
        } else {
            request.title.as_str()
        };

        let mut popup = Popup::new();
        popup
            .summary(summary)
            .body(&request.text)
            .appname(envelope.app_name)
            .urgency(map_urgency(request.urgency))
            .timeout(map_timeout(request.flags, self.timeout));

        match &request.icon {
            Some(Icon::Name(name)) => {
                popup.icon(name);
            }
            Some(Icon::Pixmap(_)) => trace!(id = %envelope.id, "pixmap icons are not forwarded"),
            None => {}
        }

        for (key, value) in &request.hints {
            if key == RESIDENT_HINT {
                popup.hint(Hint::Resident(request.hint_enabled(RESIDENT_HINT)));
            } else {
                popup.hint(Hint::Custom(key.clone(), value.clone()));
            }
        }

        if let Some(label) = &request.default_action {
            popup.action(DEFAULT_ACTION_KEY, label);
        }
        for (index, label) in request.actions.iter().enumerate() {
            popup.action(&(index + 1).to_string(), label);
        }
        // no inline replies over this channel; offer it as a plain action when allowed
        if let Some(reply) = request
            .reply_action
            .as_ref()
            .filter(|reply| reply.fallback == ReplyFallback::UseRegularAction)
        {
            popup.action(REPLY_ACTION_KEY, &reply.label);
        }
        popup
    }
}

impl Backend for PopupBackend {
    fn option_name(&self) -> &str {
        NAME
    }

    fn notify(&mut self, envelope: &Envelope<'_>, _config: &EventConfig, completion: Completion) {
        let popup = self.build(envelope);
        let id = envelope.id;
        let shown = self.shown.clone();
        tokio::task::spawn_blocking(move || {
            let handle = match popup.show() {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(%id, error = %err, "failed to show popup");
                    completion.finish();
                    return;
                }
            };
            shown.record(id, handle.id(), popup);
            handle.wait_for_action(|action| match parse_action(action) {
                Some(PopupAction::Activate(index)) => completion.invoke_action(index),
                Some(PopupAction::Reply) => completion.reply(String::new()),
                None => trace!(%id, action, "popup dismissed"),
            });
            shown.forget(id);
            completion.finish();
        });
    }

    fn update(&mut self, envelope: &Envelope<'_>, _config: &EventConfig) {
        let id = envelope.id;
        let Some(server_id) = self.shown.server_id(id) else {
            trace!(%id, "update for a popup that is not on screen");
            return;
        };
        let mut popup = self.build(envelope);
        popup.id(server_id);
        let shown = self.shown.clone();
        tokio::task::spawn_blocking(move || match popup.show() {
            Ok(_) => shown.refresh(id, popup),
            Err(err) => warn!(%id, error = %err, "failed to replace popup"),
        });
    }

    fn close(&mut self, id: NotificationId) {
        let Some((server_id, mut popup)) = self.shown.forget(id) else {
            debug!(%id, "close for a popup that is not on screen");
            return;
        };
        popup.id(server_id);
        tokio::task::spawn_blocking(move || match popup.show() {
            Ok(handle) => handle.close(),
            Err(err) => warn!(%id, error = %err, "failed to close popup"),
        });
    }
}

/// Server-side ids and last content of the popups on screen.
#[derive(Clone, Debug, Default)]
struct ShownPopups(Arc<Mutex<HashMap<NotificationId, (u32, Popup)>>>);

impl ShownPopups {
    fn lock(&self) -> MutexGuard<'_, HashMap<NotificationId, (u32, Popup)>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, id: NotificationId, server_id: u32, popup: Popup) {
        self.lock().insert(id, (server_id, popup));
    }

    /// Store new content for a popup still on screen.
    fn refresh(&self, id: NotificationId, popup: Popup) {
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.1 = popup;
        }
    }

    fn server_id(&self, id: NotificationId) -> Option<u32> {
        self.lock().get(&id).map(|(server_id, _)| *server_id)
    }

    fn forget(&self, id: NotificationId) -> Option<(u32, Popup)> {
        self.lock().remove(&id)
    }
}

#[derive(Debug, Eq, PartialEq)]
enum PopupAction {
    Activate(u32),
    Reply,
}

fn parse_action(key: &str) -> Option<PopupAction> {
    match key {
        DEFAULT_ACTION_KEY => Some(PopupAction::Activate(0)),
        REPLY_ACTION_KEY => Some(PopupAction::Reply),
        other => other
            .parse::<u32>()
            .ok()
            .filter(|index| *index > 0)
            .map(PopupAction::Activate),
    }
}

const fn map_urgency(urgency: Urgency) -> PopupUrgency {
    match urgency {
        Urgency::Low => PopupUrgency::Low,
        Urgency::Default | Urgency::Normal => PopupUrgency::Normal,
        Urgency::High | Urgency::Critical => PopupUrgency::Critical,
    }
}

fn map_timeout(flags: NotificationFlags, configured: Option<Duration>) -> Timeout {
    if flags.contains(NotificationFlags::PERSISTENT) {
        return Timeout::Never;
    }
    configured
        .and_then(|duration| u32::try_from(duration.as_millis()).ok())
        .map_or(Timeout::Default, Timeout::Milliseconds)
}
