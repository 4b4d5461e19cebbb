//! Per-application event configuration.
//!
//! Each application ships an `<app>.notifyrc` TOML file describing how its
//! events are presented. A user copy of the same file may override any entry.
//! Lookups walk context-specific groups before the event-global group, and the
//! user layer before the bundled one.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::types::Context;

mod file;

pub use file::FileResolver;

/// Entry holding the `|`-separated backend names for an event.
pub const ACTION_KEY: &str = "Action";
/// Entry holding the default urgency for an event.
pub const URGENCY_KEY: &str = "Urgency";

const NO_ACTION: &str = "None";

type Entries = HashMap<String, String>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct EventGroup {
    entries: Entries,
    contexts: HashMap<(String, String), Entries>,
}

/// One parsed event file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotifyRc {
    events: HashMap<String, EventGroup>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    event: HashMap<String, RawEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEvent {
    #[serde(default)]
    context: HashMap<String, HashMap<String, toml::Table>>,
    #[serde(flatten)]
    entries: toml::Table,
}

impl NotifyRc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the TOML body of an event file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the body is not valid TOML or does
    /// not follow the `[event.<id>]` layout.
    pub fn from_toml_str(body: &str) -> std::result::Result<Self, ConfigError> {
        let raw: RawFile =
            toml::from_str(body).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let events = raw
            .event
            .into_iter()
            .map(|(event_id, raw_event)| {
                let contexts = raw_event
                    .context
                    .into_iter()
                    .flat_map(|(key, by_value)| {
                        by_value.into_iter().map(move |(value, table)| {
                            ((key.clone(), value), stringify_table(table))
                        })
                    })
                    .collect();
                let group = EventGroup {
                    entries: stringify_table(raw_event.entries),
                    contexts,
                };
                (event_id, group)
            })
            .collect();

        Ok(Self { events })
    }

    /// Read and parse an event file. A missing file yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> std::result::Result<Option<Self>, ConfigError> {
        let body = match std::fs::read_to_string(path) {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::FileRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml_str(&body)
            .map(Some)
            .map_err(|err| ConfigError::EventFile {
                path: path.to_path_buf(),
                message: err.to_string(),
            })
    }

    /// Set an event-global entry.
    pub fn set_entry(&mut self, event_id: &str, key: &str, value: impl Into<String>) {
        self.events
            .entry(event_id.to_string())
            .or_default()
            .entries
            .insert(key.to_string(), value.into());
    }

    /// Set an entry that only applies while `context` is attached to the request.
    pub fn set_context_entry(
        &mut self,
        event_id: &str,
        context: &Context,
        key: &str,
        value: impl Into<String>,
    ) {
        self.events
            .entry(event_id.to_string())
            .or_default()
            .contexts
            .entry((context.key.clone(), context.value.clone()))
            .or_default()
            .insert(key.to_string(), value.into());
    }

    #[must_use]
    pub fn with_entry(mut self, event_id: &str, key: &str, value: impl Into<String>) -> Self {
        self.set_entry(event_id, key, value);
        self
    }

    fn entry(&self, event_id: &str, context: Option<&Context>, key: &str) -> Option<&str> {
        let group = self.events.get(event_id)?;
        let entries = match context {
            None => &group.entries,
            Some(ctx) => group
                .contexts
                .get(&(ctx.key.clone(), ctx.value.clone()))?,
        };
        entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn stringify_table(table: toml::Table) -> Entries {
    table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(text) => text,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

/// Configuration resolved for one `(app, contexts, event)` key.
#[derive(Clone, Default)]
pub struct EventConfig {
    pub app_name: String,
    pub event_id: String,
    pub contexts: Vec<Context>,
    layers: Vec<Arc<NotifyRc>>,
}

impl EventConfig {
    /// `layers` are consulted in order: user overrides first, bundled defaults last.
    #[must_use]
    pub fn new(
        app_name: impl Into<String>,
        event_id: impl Into<String>,
        contexts: Vec<Context>,
        layers: Vec<Arc<NotifyRc>>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            event_id: event_id.into(),
            contexts,
            layers,
        }
    }

    /// Look up `key`, returning an empty string when no layer defines it.
    #[must_use]
    pub fn read_entry(&self, key: &str) -> String {
        let scoped = self.contexts.iter().map(Some).chain(std::iter::once(None));
        for context in scoped {
            for layer in &self.layers {
                if let Some(value) = layer.entry(&self.event_id, context, key) {
                    return value.to_string();
                }
            }
        }
        String::new()
    }

    /// Backend names from the `Action` entry, in declared order.
    ///
    /// An empty entry or the literal `None` yields no names.
    #[must_use]
    pub fn backend_names(&self) -> Vec<String> {
        let action = self.read_entry(ACTION_KEY);
        let action = action.trim();
        if action.is_empty() || action == NO_ACTION {
            return Vec::new();
        }
        action
            .split('|')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Debug for EventConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventConfig")
            .field("app_name", &self.app_name)
            .field("event_id", &self.event_id)
            .field("contexts", &self.contexts)
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Maps a resolution key to event configuration.
pub trait ConfigResolver: Send {
    fn resolve(&mut self, app_name: &str, contexts: &[Context], event_id: &str) -> EventConfig;

    /// Drop anything cached for `app_name` so the next resolve re-reads it.
    fn invalidate(&mut self, app_name: &str);
}

/// In-memory resolver with one layer per application.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    apps: HashMap<String, Arc<NotifyRc>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_app(mut self, app_name: impl Into<String>, rc: NotifyRc) -> Self {
        self.insert(app_name, rc);
        self
    }

    pub fn insert(&mut self, app_name: impl Into<String>, rc: NotifyRc) {
        self.apps.insert(app_name.into(), Arc::new(rc));
    }
}

impl ConfigResolver for StaticResolver {
    fn resolve(&mut self, app_name: &str, contexts: &[Context], event_id: &str) -> EventConfig {
        let layers = self.apps.get(app_name).cloned().into_iter().collect();
        EventConfig::new(app_name, event_id, contexts.to_vec(), layers)
    }

    fn invalidate(&mut self, app_name: &str) {
        debug!(app = app_name, "static resolver has nothing to invalidate");
    }
}
