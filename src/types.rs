use std::fmt::{self, Display};
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Urgency of a notification. `Default` means "let the event configuration decide".
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Urgency {
    #[default]
    Default,
    Low,
    Normal,
    High,
    Critical,
}

impl Urgency {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }
}

impl Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            "default" => Ok(Self::Default),
            other => Err(format!("unknown urgency: {other}")),
        }
    }
}

bitflags! {
    /// Presentation hints carried by a request.
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct NotificationFlags: u32 {
        /// The popup closes on its own after the server timeout.
        const CLOSE_ON_TIMEOUT = 0x01;
        /// The popup stays until it is closed explicitly.
        const PERSISTENT = 0x02;
        /// Closing is tied to the originating window being activated.
        const CLOSE_WHEN_ACTIVATED = 0x04;
        /// The sound backend replays the sound until the request closes.
        const LOOP_SOUND = 0x08;
        /// Ask the presentation server not to group this notification.
        const SKIP_GROUPING = 0x10;
        /// Resolve configuration against the default component instead of the app.
        const DEFAULT_EVENT = 0xF000;
    }
}

impl Default for NotificationFlags {
    fn default() -> Self {
        Self::CLOSE_ON_TIMEOUT
    }
}

/// One key/value pair used to select a context-specific configuration group.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Context {
    pub key: String,
    pub value: String,
}

impl Context {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl FromStr for Context {
    type Err = String;

    /// Parses `key=value`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok(Self::new(key.trim(), value.trim()))
            }
            _ => Err(format!("expected key=value, got: {s}")),
        }
    }
}

/// Icon shown alongside the notification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Icon {
    /// Themed icon name or file path.
    Name(String),
    /// Encoded image bytes.
    Pixmap(Vec<u8>),
}

impl Icon {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Pixmap(_) => None,
        }
    }
}

/// What a reply-capable presenter does when it cannot offer inline replies.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ReplyFallback {
    /// Leave the reply action out.
    #[default]
    Hide,
    /// Show it as a regular action; picking it reports an empty reply.
    UseRegularAction,
}

/// Inline reply offered with a notification.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReplyAction {
    pub label: String,
    pub placeholder: Option<String>,
    pub submit_label: Option<String>,
    pub fallback: ReplyFallback,
}

impl ReplyAction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}
