//! The lifecycle manager.
//!
//! One task owns every request's coordination state: ids, reference counts,
//! the backend instances and the set of applications whose configuration went
//! stale. Callers and backends talk to it only through its inbox, so a backend
//! that finishes from inside `notify` is handled after the dispatch pass that
//! called it has returned.

use std::collections::{HashMap, HashSet};

use async_channel::{Receiver, Sender, unbounded};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::backend::{BackendRegistry, Envelope};
use crate::config::ManagerSettings;
use crate::notification::NotificationEvent;
use crate::notifyrc::{ConfigResolver, EventConfig, URGENCY_KEY};
use crate::request::{
    NotificationId, NotificationRequest, RESIDENT_HINT, RefCount, RequestId, RequestKey,
    RequestSnapshot,
};
use crate::types::{ReplyFallback, Urgency};

mod completion;
mod handle;

pub use completion::Completion;
pub use handle::ManagerHandle;

pub(crate) enum Command {
    Register {
        key: RequestKey,
        request: NotificationRequest,
        events: Sender<NotificationEvent>,
    },
    Dispatch {
        key: RequestKey,
        request: NotificationRequest,
        reply: oneshot::Sender<Dispatched>,
    },
    Modify {
        key: RequestKey,
        request: NotificationRequest,
    },
    Update {
        key: RequestKey,
    },
    FlushUpdate {
        key: RequestKey,
        generation: u64,
    },
    Retain {
        key: RequestKey,
    },
    Release {
        key: RequestKey,
    },
    Close {
        key: RequestKey,
    },
    CloseId {
        id: NotificationId,
        force: bool,
    },
    Detach {
        key: RequestKey,
    },
    BackendFinished {
        key: RequestKey,
        id: NotificationId,
        backend: String,
    },
    ActionInvoked {
        id: NotificationId,
        action: u32,
    },
    Replied {
        id: NotificationId,
        text: String,
    },
    InvalidateConfig {
        app_name: String,
    },
    Inspect {
        key: RequestKey,
        reply: oneshot::Sender<Option<RequestSnapshot>>,
    },
    Stats {
        reply: oneshot::Sender<ManagerStats>,
    },
    Shutdown,
}

impl Command {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Dispatch { .. } => "dispatch",
            Self::Modify { .. } => "modify",
            Self::Update { .. } => "update",
            Self::FlushUpdate { .. } => "flush-update",
            Self::Retain { .. } => "retain",
            Self::Release { .. } => "release",
            Self::Close { .. } => "close",
            Self::CloseId { .. } => "close-id",
            Self::Detach { .. } => "detach",
            Self::BackendFinished { .. } => "backend-finished",
            Self::ActionInvoked { .. } => "action-invoked",
            Self::Replied { .. } => "replied",
            Self::InvalidateConfig { .. } => "invalidate-config",
            Self::Inspect { .. } => "inspect",
            Self::Stats { .. } => "stats",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Outcome of a send, as reported back to the handle.
#[derive(Debug)]
pub(crate) struct Dispatched {
    pub(crate) id: RequestId,
    /// Urgency taken from the event configuration for this episode.
    pub(crate) urgency: Option<Urgency>,
}

/// Counters exposed for diagnostics.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ManagerStats {
    /// Requests currently holding an id.
    pub active: usize,
    /// Requests known to the manager, sent or not.
    pub tracked: usize,
    /// Backends instantiated so far.
    pub backends: Vec<String>,
}

struct Slot {
    request: NotificationRequest,
    id: RequestId,
    refs: RefCount,
    needs_update: bool,
    update_generation: u64,
    events: Sender<NotificationEvent>,
    detached: bool,
    configured_urgency: Option<Urgency>,
}

impl Slot {
    fn emit(&self, event: NotificationEvent) {
        // a dropped handle no longer listens
        let _ = self.events.try_send(event);
    }

    /// Install caller content, keeping the configured urgency while the
    /// caller leaves urgency unset.
    fn set_request(&mut self, mut request: NotificationRequest) {
        if let (Urgency::Default, Some(configured)) = (request.urgency, self.configured_urgency) {
            request.urgency = configured;
        }
        self.request = request;
    }
}

pub struct NotificationManager {
    settings: ManagerSettings,
    resolver: Box<dyn ConfigResolver>,
    registry: BackendRegistry,
    inbox: Receiver<Command>,
    outbox: Sender<Command>,
    handle: ManagerHandle,
    slots: HashMap<RequestKey, Slot>,
    active: HashMap<NotificationId, RequestKey>,
    stale_apps: HashSet<String>,
    /// `None` once every id has been handed out.
    next_id: Option<u32>,
}

impl NotificationManager {
    pub fn new(
        settings: ManagerSettings,
        resolver: impl ConfigResolver + 'static,
        registry: BackendRegistry,
    ) -> Self {
        let (outbox, inbox) = unbounded();
        Self {
            settings,
            resolver: Box::new(resolver),
            registry,
            inbox,
            handle: ManagerHandle::new(outbox.clone()),
            outbox,
            slots: HashMap::new(),
            active: HashMap::new(),
            stale_apps: HashSet::new(),
            next_id: Some(1),
        }
    }

    pub fn handle(&self) -> ManagerHandle {
        self.handle.clone()
    }

    /// Run the manager on its own task.
    pub fn spawn(self) -> (ManagerHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    pub async fn run(mut self) {
        info!(app = %self.settings.app_name, "notification manager started");
        while let Ok(command) = self.inbox.recv().await {
            trace!(command = command.name(), "manager command");
            if matches!(command, Command::Shutdown) {
                break;
            }
            self.handle_command(command);
        }
        self.inbox.close();
        info!(open = self.active.len(), "notification manager stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Register {
                key,
                request,
                events,
            } => {
                self.slots.insert(
                    key,
                    Slot {
                        request,
                        id: RequestId::Unset,
                        refs: RefCount::default(),
                        needs_update: false,
                        update_generation: 0,
                        events,
                        detached: false,
                        configured_urgency: None,
                    },
                );
            }
            Command::Dispatch {
                key,
                request,
                reply,
            } => {
                let dispatched = self.dispatch(key, request);
                let _ = reply.send(dispatched);
            }
            Command::Modify { key, request } => self.modify(key, request),
            Command::Update { key } => self.update(key),
            Command::FlushUpdate { key, generation } => {
                let due = self
                    .slots
                    .get(&key)
                    .is_some_and(|slot| slot.needs_update && slot.update_generation == generation);
                if due {
                    self.update(key);
                }
            }
            Command::Retain { key } => {
                if let Some(slot) = self.slots.get_mut(&key) {
                    slot.refs.acquire();
                }
            }
            Command::Release { key } => self.manual_release(key),
            Command::Close { key } => self.close_request(key),
            Command::CloseId { id, force } => match self.active.get(&id).copied() {
                Some(key) => self.close_request(key),
                None if force => debug!(%id, "forced close of an id that is not active"),
                None => trace!(%id, "close of unknown id ignored"),
            },
            Command::Detach { key } => self.detach(key),
            Command::BackendFinished { key, id, backend } => {
                if self.active.get(&id) == Some(&key) {
                    trace!(%id, %backend, "backend finished");
                    self.release(key);
                } else {
                    debug!(%id, %backend, "late completion for a closed request ignored");
                }
            }
            Command::ActionInvoked { id, action } => self.activate(id, action),
            Command::Replied { id, text } => self.reply(id, text),
            Command::InvalidateConfig { app_name } => {
                debug!(app = %app_name, "event configuration marked stale");
                self.stale_apps.insert(app_name);
            }
            Command::Inspect { key, reply } => {
                let snapshot = self.slots.get(&key).map(|slot| RequestSnapshot {
                    id: slot.id,
                    references: slot.refs.get(),
                    needs_update: slot.needs_update,
                });
                let _ = reply.send(snapshot);
            }
            Command::Stats { reply } => {
                let _ = reply.send(ManagerStats {
                    active: self.active.len(),
                    tracked: self.slots.len(),
                    backends: self.registry.loaded_names(),
                });
            }
            Command::Shutdown => {}
        }
    }

    fn app_name_of(&self, request: &NotificationRequest) -> String {
        request
            .app_name(&self.settings.app_name, &self.settings.default_component)
            .to_string()
    }

    fn resolve(&mut self, request: &NotificationRequest) -> EventConfig {
        let app_name = self.app_name_of(request);
        if self.stale_apps.remove(&app_name) {
            self.resolver.invalidate(&app_name);
        }
        self.resolver
            .resolve(&app_name, &request.contexts, request.event_id())
    }

    fn dispatch(&mut self, key: RequestKey, request: NotificationRequest) -> Dispatched {
        let Some(slot) = self.slots.get_mut(&key) else {
            warn!(%key, "dispatch for an unregistered request");
            return Dispatched {
                id: RequestId::Unset,
                urgency: None,
            };
        };
        slot.request = request;
        slot.configured_urgency = None;
        slot.needs_update = false;
        slot.update_generation += 1;
        if slot.id == RequestId::Closed {
            slot.id = RequestId::Unset;
        }
        let previous = slot.id;
        let request = slot.request.clone();

        let config = self.resolve(&request);
        let names = config.backend_names();
        if names.is_empty() {
            debug!(
                app = %config.app_name,
                event = %config.event_id,
                "no backend configured; closing"
            );
            self.transient_hold(key);
            return Dispatched {
                id: previous,
                urgency: None,
            };
        }

        let id = match previous.active().or_else(|| self.allocate(key)) {
            Some(id) => id,
            None => {
                self.transient_hold(key);
                return Dispatched {
                    id: previous,
                    urgency: None,
                };
            }
        };

        let urgency = configured_urgency(&config);
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.configured_urgency = urgency;
            slot.set_request(request);
        }

        let dispatched = self.fan_out(key, id, &config, &names);
        if dispatched == 0 {
            warn!(
                %id,
                backends = ?names,
                "none of the configured backends could be loaded"
            );
            self.transient_hold(key);
        }
        Dispatched {
            id: RequestId::Active(id),
            urgency,
        }
    }

    fn allocate(&mut self, key: RequestKey) -> Option<NotificationId> {
        let Some(raw) = self.next_id else {
            error!(%key, "notification ids exhausted; request not sent");
            return None;
        };
        let id = NotificationId::new(raw);
        self.next_id = raw.checked_add(1);
        self.active.insert(id, key);
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.id = RequestId::Active(id);
        }
        Some(id)
    }

    /// Take one hold per loadable backend, then notify each. Returns the
    /// number of backends notified.
    fn fan_out(
        &mut self,
        key: RequestKey,
        id: NotificationId,
        config: &EventConfig,
        names: &[String],
    ) -> usize {
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            if self.registry.ensure(name) {
                targets.push(name.as_str());
            } else {
                debug!(backend = %name, %id, "unknown backend skipped");
            }
        }

        let Some(slot) = self.slots.get_mut(&key) else {
            return 0;
        };
        for _ in &targets {
            slot.refs.acquire();
        }

        let envelope = Envelope {
            id,
            app_name: &config.app_name,
            request: &slot.request,
        };
        for name in &targets {
            if let Some(backend) = self.registry.loaded(name) {
                let completion = Completion::new(key, id, *name, self.outbox.clone());
                backend.notify(&envelope, config, completion);
            }
        }
        targets.len()
    }

    fn transient_hold(&mut self, key: RequestKey) {
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.refs.acquire();
        }
        self.release(key);
    }

    fn release(&mut self, key: RequestKey) {
        let Some(slot) = self.slots.get_mut(&key) else {
            return;
        };
        if slot.refs.release() {
            self.finalize(key);
        }
    }

    fn manual_release(&mut self, key: RequestKey) {
        let Some(slot) = self.slots.get(&key) else {
            return;
        };
        if slot.refs.is_zero() {
            if slot.id == RequestId::Closed {
                debug!(%key, "release after close ignored");
            } else {
                warn!(%key, "release without a matching retain ignored");
            }
            return;
        }
        self.release(key);
    }

    /// Caller-initiated close: ask the listed backends to stop, then end the
    /// episode without waiting for them.
    fn close_request(&mut self, key: RequestKey) {
        let Some(slot) = self.slots.get(&key) else {
            return;
        };
        let state = slot.id;
        let request = slot.request.clone();
        match state {
            RequestId::Closed => trace!(%key, "request already closed"),
            RequestId::Unset => self.finalize(key),
            RequestId::Active(id) => {
                let config = self.resolve(&request);
                let mut seen = HashSet::new();
                for name in config.backend_names() {
                    if !seen.insert(name.clone()) {
                        continue;
                    }
                    if let Some(backend) = self.registry.loaded(&name) {
                        backend.close(id);
                    }
                }
                self.finalize(key);
            }
        }
    }

    fn activate(&mut self, id: NotificationId, action: u32) {
        let Some(key) = self.active.get(&id).copied() else {
            debug!(%id, action, "action for an inactive request ignored");
            return;
        };
        let Some(slot) = self.slots.get(&key) else {
            return;
        };
        debug!(
            %id,
            action,
            label = slot.request.action_label(action).unwrap_or_default(),
            "request activated"
        );
        slot.emit(NotificationEvent::Activated(action));
        if slot.request.hint_enabled(RESIDENT_HINT) {
            trace!(%id, "resident request stays open after activation");
            return;
        }
        self.close_request(key);
    }

    fn reply(&mut self, id: NotificationId, text: String) {
        let Some(key) = self.active.get(&id).copied() else {
            debug!(%id, "reply for an inactive request ignored");
            return;
        };
        let Some(slot) = self.slots.get(&key) else {
            return;
        };
        let Some(reply) = &slot.request.reply_action else {
            debug!(%id, "reply for a request without a reply action ignored");
            return;
        };
        if text.is_empty() && reply.fallback == ReplyFallback::UseRegularAction {
            slot.emit(NotificationEvent::ReplyActivated);
        } else {
            slot.emit(NotificationEvent::Replied(text));
        }
        self.close_request(key);
    }

    /// End the current episode: emit `Closed` once and forget the id.
    fn finalize(&mut self, key: RequestKey) {
        let Some(slot) = self.slots.get_mut(&key) else {
            return;
        };
        if slot.id == RequestId::Closed {
            return;
        }
        if let RequestId::Active(id) = slot.id {
            if self.active.get(&id) == Some(&key) {
                self.active.remove(&id);
            }
            debug!(%id, "request closed");
        }
        slot.id = RequestId::Closed;
        slot.refs.reset();
        slot.needs_update = false;
        slot.update_generation += 1;
        slot.emit(NotificationEvent::Closed);

        if slot.detached {
            self.slots.remove(&key);
        }
    }

    fn detach(&mut self, key: RequestKey) {
        let Some(slot) = self.slots.get_mut(&key) else {
            return;
        };
        if slot.id.is_active() {
            slot.detached = true;
        } else {
            self.slots.remove(&key);
        }
    }

    fn modify(&mut self, key: RequestKey, request: NotificationRequest) {
        let Some(slot) = self.slots.get_mut(&key) else {
            return;
        };
        slot.set_request(request);
        if !slot.id.is_active() {
            return;
        }
        slot.needs_update = true;
        slot.update_generation += 1;

        let flush = Command::FlushUpdate {
            key,
            generation: slot.update_generation,
        };
        let outbox = self.outbox.clone();
        let delay = self.settings.update_debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = outbox.send(flush).await;
        });
    }

    /// Push the current content of an active request to every loaded backend.
    fn update(&mut self, key: RequestKey) {
        let Some(slot) = self.slots.get_mut(&key) else {
            return;
        };
        slot.needs_update = false;
        slot.update_generation += 1;
        let Some(id) = slot.id.active() else {
            return;
        };
        let request = slot.request.clone();
        let config = self.resolve(&request);
        let envelope = Envelope {
            id,
            app_name: &config.app_name,
            request: &request,
        };
        for backend in self.registry.loaded_mut() {
            backend.update(&envelope, &config);
        }
        trace!(%id, "request content pushed to backends");
    }
}

fn configured_urgency(config: &EventConfig) -> Option<Urgency> {
    let configured = config.read_entry(URGENCY_KEY);
    if configured.is_empty() {
        return None;
    }
    match configured.parse::<Urgency>() {
        Ok(Urgency::Default) => None,
        Ok(urgency) => Some(urgency),
        Err(err) => {
            debug!(event = %config.event_id, error = %err, "ignoring urgency entry");
            None
        }
    }
}
