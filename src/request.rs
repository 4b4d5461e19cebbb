//! Notification content and the per-episode coordination state.

use std::collections::HashMap;
use std::fmt::{self, Display};

use tracing::warn;

use crate::types::{Context, Icon, NotificationFlags, ReplyAction, Urgency};

/// Identity assigned by the manager when a request is dispatched.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NotificationId(u32);

impl NotificationId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Manager-side identity of a `Notification` handle, stable across episodes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct RequestKey(u64);

impl RequestKey {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time view of a request as the manager tracks it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RequestSnapshot {
    pub id: RequestId,
    pub references: u32,
    pub needs_update: bool,
}

/// Where a request stands within its current activation episode.
///
/// `Unset` doubles as the no-op sentinel returned when an event resolves to
/// no backend at all.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum RequestId {
    #[default]
    Unset,
    Active(NotificationId),
    Closed,
}

impl RequestId {
    pub const fn active(self) -> Option<NotificationId> {
        match self {
            Self::Active(id) => Some(id),
            Self::Unset | Self::Closed => None,
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Integer form: the id itself, `-1` for `Unset`, `-2` for `Closed`.
    pub const fn as_raw(self) -> i64 {
        match self {
            Self::Unset => -1,
            Self::Closed => -2,
            Self::Active(id) => id.0 as i64,
        }
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("unset"),
            Self::Closed => f.write_str("closed"),
            Self::Active(id) => write!(f, "{id}"),
        }
    }
}

/// Outstanding holds on a request: one per dispatched backend plus manual holds.
///
/// Releasing below zero is a logic error. Debug builds panic; release builds
/// log and leave the count at zero without reporting a zero-crossing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RefCount(u32);

impl RefCount {
    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn acquire(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    /// Drops one hold. Returns `true` exactly on the 1 → 0 transition.
    pub fn release(&mut self) -> bool {
        debug_assert!(self.0 > 0, "reference count released below zero");
        if self.0 == 0 {
            warn!("reference count released below zero; ignoring");
            return false;
        }
        self.0 -= 1;
        self.0 == 0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Hint that leaves closing to the application after an action is picked.
pub const RESIDENT_HINT: &str = "resident";

/// The content of one user-visible event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotificationRequest {
    event_id: String,
    pub title: String,
    pub text: String,
    pub icon: Option<Icon>,
    /// Labels for actions `1..=n`; index 0 is the default action.
    pub actions: Vec<String>,
    pub default_action: Option<String>,
    /// Most significant first.
    pub contexts: Vec<Context>,
    pub component_name: Option<String>,
    pub flags: NotificationFlags,
    pub urgency: Urgency,
    /// Free-form key/value pairs interpreted by backends.
    pub hints: HashMap<String, String>,
    pub reply_action: Option<ReplyAction>,
}

impl NotificationRequest {
    pub fn new(event_id: impl Into<String>, flags: NotificationFlags) -> Self {
        Self {
            event_id: event_id.into(),
            title: String::new(),
            text: String::new(),
            icon: None,
            actions: Vec::new(),
            default_action: None,
            contexts: Vec::new(),
            component_name: None,
            flags,
            urgency: Urgency::Default,
            hints: HashMap::new(),
            reply_action: None,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Name used to look up the event configuration.
    pub fn app_name<'a>(&'a self, app_name: &'a str, default_component: &'a str) -> &'a str {
        if self.flags.contains(NotificationFlags::DEFAULT_EVENT) {
            default_component
        } else {
            match self.component_name.as_deref() {
                Some(component) if !component.is_empty() => component,
                _ => app_name,
            }
        }
    }

    /// Whether hint `key` is set to a true value (`true`, `yes`, `on` or `1`).
    pub fn hint_enabled(&self, key: &str) -> bool {
        self.hints.get(key).is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            )
        })
    }

    /// Label for action `index`, where 0 is the default action.
    pub fn action_label(&self, index: u32) -> Option<&str> {
        if index == 0 {
            return self.default_action.as_deref();
        }
        let slot = usize::try_from(index - 1).ok()?;
        self.actions.get(slot).map(String::as_str)
    }
}
