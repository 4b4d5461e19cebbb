#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify_hub::config::Settings;
use notify_hub::{
    Backend, BackendRegistry, Completion, Envelope, EventConfig, FileResolver, ManagerHandle,
    Notification, NotificationEvent, NotificationId, NotificationManager, NotifyRc, RequestId,
    RESIDENT_HINT, ReplyAction, ReplyFallback, RequestSnapshot, StaticResolver, Urgency,
};
use tokio::task::JoinHandle;
use tokio::time::sleep;

const APP: &str = "tester";
const EVENT: &str = "testEvent";

#[derive(Clone, Default)]
struct Probe {
    pending: Arc<Mutex<Vec<Completion>>>,
    notified: Arc<Mutex<Vec<(NotificationId, Urgency)>>>,
    closed: Arc<Mutex<Vec<NotificationId>>>,
    updated: Arc<Mutex<Vec<(String, Urgency)>>>,
}

impl Probe {
    fn notify_count(&self) -> usize {
        self.notified.lock().unwrap().len()
    }

    fn last_urgency(&self) -> Option<Urgency> {
        self.notified.lock().unwrap().last().map(|(_, urgency)| *urgency)
    }

    fn closed_ids(&self) -> Vec<NotificationId> {
        self.closed.lock().unwrap().clone()
    }

    fn updated_titles(&self) -> Vec<String> {
        let updated = self.updated.lock().unwrap();
        updated.iter().map(|(title, _)| title.clone()).collect()
    }

    fn updated_urgencies(&self) -> Vec<Urgency> {
        let updated = self.updated.lock().unwrap();
        updated.iter().map(|(_, urgency)| *urgency).collect()
    }

    fn take(&self) -> Completion {
        let mut pending = self.pending.lock().unwrap();
        assert!(!pending.is_empty(), "no pending completion");
        pending.remove(0)
    }

    fn finish_next(&self) {
        self.take().finish();
    }
}

struct ProbeBackend {
    name: &'static str,
    probe: Probe,
    instant: bool,
}

impl Backend for ProbeBackend {
    fn option_name(&self) -> &str {
        self.name
    }

    fn notify(&mut self, envelope: &Envelope<'_>, _: &EventConfig, completion: Completion) {
        self.probe
            .notified
            .lock()
            .unwrap()
            .push((envelope.id, envelope.request.urgency));
        if self.instant {
            completion.finish();
        } else {
            self.probe.pending.lock().unwrap().push(completion);
        }
    }

    fn update(&mut self, envelope: &Envelope<'_>, _: &EventConfig) {
        self.probe
            .updated
            .lock()
            .unwrap()
            .push((envelope.request.title.clone(), envelope.request.urgency));
    }

    fn close(&mut self, id: NotificationId) {
        self.probe.closed.lock().unwrap().push(id);
    }
}

struct Harness {
    manager: ManagerHandle,
    task: JoinHandle<()>,
    popup: Probe,
    sound: Probe,
    instant: Probe,
}

fn registry(popup: &Probe, sound: &Probe, instant: &Probe) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    for (name, probe, finishes_at_once) in [
        ("Popup", popup.clone(), false),
        ("Sound", sound.clone(), false),
        ("Instant", instant.clone(), true),
    ] {
        registry.register(name, move || {
            Box::new(ProbeBackend {
                name,
                probe: probe.clone(),
                instant: finishes_at_once,
            })
        });
    }
    registry
}

fn settings() -> notify_hub::config::ManagerSettings {
    let mut settings = Settings::defaults().manager;
    settings.app_name = APP.to_string();
    settings
}

fn start(rc: NotifyRc) -> Harness {
    let (popup, sound, instant) = (Probe::default(), Probe::default(), Probe::default());
    let resolver = StaticResolver::new().with_app(APP, rc);
    let (manager, task) =
        NotificationManager::new(settings(), resolver, registry(&popup, &sound, &instant)).spawn();
    Harness {
        manager,
        task,
        popup,
        sound,
        instant,
    }
}

fn action(actions: &str) -> NotifyRc {
    NotifyRc::new().with_entry(EVENT, "Action", actions)
}

/// Round-trip through the manager so every earlier message has been handled.
async fn settle(notification: &Notification) -> RequestSnapshot {
    notification.snapshot().await.unwrap()
}

fn drain(notification: &Notification) -> Vec<NotificationEvent> {
    std::iter::from_fn(|| notification.try_next_event()).collect()
}

fn active_id(id: RequestId) -> NotificationId {
    id.active().expect("request should hold an id")
}

#[tokio::test(start_paused = true)]
async fn single_backend_closes_when_it_finishes() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);

    let id = n.send_event().await.unwrap();
    assert!(id.as_raw() >= 0);

    sleep(Duration::from_millis(300)).await;
    assert!(drain(&n).is_empty());
    assert_eq!(settle(&n).await.id, id);

    h.popup.finish_next();
    let snapshot = settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
    assert_eq!(snapshot.id, RequestId::Closed);
    assert_eq!(snapshot.references, 0);
}

#[tokio::test(start_paused = true)]
async fn fan_in_waits_for_the_last_backend() {
    let h = start(action("Popup|Sound"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();
    assert_eq!(settle(&n).await.references, 2);

    sleep(Duration::from_millis(50)).await;
    h.sound.finish_next();
    assert_eq!(settle(&n).await.references, 1);
    assert!(drain(&n).is_empty());

    sleep(Duration::from_millis(350)).await;
    h.popup.finish_next();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn no_backend_closes_immediately() {
    for actions in ["None", ""] {
        let h = start(action(actions));
        let mut n = Notification::new(&h.manager, EVENT);

        let id = n.send_event().await.unwrap();
        assert_eq!(id, RequestId::Unset);
        assert_eq!(id.as_raw(), -1);
        assert_eq!(drain(&n), [NotificationEvent::Closed]);
        assert_eq!(h.popup.notify_count() + h.sound.notify_count(), 0);
        assert_eq!(h.manager.stats().await.unwrap().active, 0);
    }
}

#[tokio::test(start_paused = true)]
async fn missing_event_behaves_like_none() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, "otherEvent");
    assert_eq!(n.send_event().await.unwrap(), RequestId::Unset);
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn manual_hold_outlives_backends() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    let id = n.send_event().await.unwrap();
    n.retain().unwrap();

    h.popup.finish_next();
    let snapshot = settle(&n).await;
    assert!(drain(&n).is_empty());
    assert_eq!(snapshot.id, id);
    assert_eq!(snapshot.references, 1);

    n.release().unwrap();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn activation_closes_before_backends_finish() {
    let h = start(action("Popup|Sound"));
    let mut n = Notification::new(&h.manager, EVENT);
    let id = active_id(n.send_event().await.unwrap());

    h.manager.action_invoked(id, 1).unwrap();
    settle(&n).await;
    assert_eq!(
        drain(&n),
        [NotificationEvent::Activated(1), NotificationEvent::Closed]
    );
    assert_eq!(h.popup.closed_ids(), [id]);
    assert_eq!(h.sound.closed_ids(), [id]);

    // late completions change nothing
    h.popup.finish_next();
    h.sound.finish_next();
    let snapshot = settle(&n).await;
    assert!(drain(&n).is_empty());
    assert_eq!(snapshot.id, RequestId::Closed);
    assert_eq!(h.manager.stats().await.unwrap().active, 0);
}

#[tokio::test(start_paused = true)]
async fn backend_can_report_activation() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();

    let completion = h.popup.take();
    completion.invoke_action(0);
    settle(&n).await;
    assert_eq!(
        drain(&n),
        [NotificationEvent::Activated(0), NotificationEvent::Closed]
    );
    completion.finish();
    settle(&n).await;
    assert!(drain(&n).is_empty());
}

#[tokio::test(start_paused = true)]
async fn resident_request_stays_open_after_activation() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.set_hint(RESIDENT_HINT, "true");
    let id = active_id(n.send_event().await.unwrap());

    h.manager.action_invoked(id, 1).unwrap();
    let snapshot = settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Activated(1)]);
    assert_eq!(snapshot.id, RequestId::Active(id));
    assert!(h.popup.closed_ids().is_empty());

    h.popup.finish_next();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn reply_is_delivered_then_closes() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.set_reply_action(ReplyAction::new("Reply"));
    let id = active_id(n.send_event().await.unwrap());

    h.manager.reply(id, "on my way").unwrap();
    settle(&n).await;
    assert_eq!(
        drain(&n),
        [
            NotificationEvent::Replied("on my way".to_string()),
            NotificationEvent::Closed
        ]
    );
    assert_eq!(h.popup.closed_ids(), [id]);
}

#[tokio::test(start_paused = true)]
async fn empty_reply_falls_back_to_activation() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    let mut reply = ReplyAction::new("Reply");
    reply.fallback = ReplyFallback::UseRegularAction;
    n.set_reply_action(reply);
    n.send_event().await.unwrap();

    let completion = h.popup.take();
    completion.reply("");
    settle(&n).await;
    assert_eq!(
        drain(&n),
        [NotificationEvent::ReplyActivated, NotificationEvent::Closed]
    );
    completion.finish();
}

#[tokio::test(start_paused = true)]
async fn reply_without_reply_action_is_ignored() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    let id = active_id(n.send_event().await.unwrap());

    h.manager.reply(id, "ignored").unwrap();
    let snapshot = settle(&n).await;
    assert!(drain(&n).is_empty());
    assert_eq!(snapshot.id, RequestId::Active(id));
}

#[tokio::test(start_paused = true)]
async fn fresh_request_has_no_id() {
    let h = start(action("Popup"));
    let n = Notification::new(&h.manager, EVENT);
    let snapshot = settle(&n).await;
    assert_eq!(snapshot.id, RequestId::Unset);
    assert_eq!(snapshot.references, 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_backends_are_skipped() {
    let h = start(action("Popup|Bogus|Sound"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();
    assert_eq!(settle(&n).await.references, 2);
    assert_eq!(h.popup.notify_count(), 1);
    assert_eq!(h.sound.notify_count(), 1);
    assert_eq!(h.manager.stats().await.unwrap().backends, ["Popup", "Sound"]);
}

#[tokio::test(start_paused = true)]
async fn only_unknown_backends_close_right_away() {
    let h = start(action("Bogus"));
    let mut n = Notification::new(&h.manager, EVENT);
    let id = n.send_event().await.unwrap();
    assert!(id.is_active());
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
    assert_eq!(settle(&n).await.id, RequestId::Closed);
}

#[tokio::test(start_paused = true)]
async fn duplicated_backend_is_held_twice() {
    let h = start(action("Popup|Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();
    assert_eq!(settle(&n).await.references, 2);

    h.popup.finish_next();
    settle(&n).await;
    assert!(drain(&n).is_empty());
    h.popup.finish_next();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn synchronous_completion_does_not_close_early() {
    let h = start(action("Instant|Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();

    let snapshot = settle(&n).await;
    assert_eq!(h.instant.notify_count(), 1);
    assert_eq!(snapshot.references, 1);
    assert!(drain(&n).is_empty());

    h.popup.finish_next();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn closing_twice_reports_once() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    let id = active_id(n.send_event().await.unwrap());

    n.close().unwrap();
    n.close().unwrap();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
    assert_eq!(h.popup.closed_ids(), [id]);
}

#[tokio::test(start_paused = true)]
async fn close_by_id_only_touches_listed_backends() {
    let h = start(
        action("Popup").with_entry("soundOnly", "Action", "Sound"),
    );
    let mut loud = Notification::new(&h.manager, "soundOnly");
    loud.send_event().await.unwrap();

    let mut n = Notification::new(&h.manager, EVENT);
    let id = active_id(n.send_event().await.unwrap());
    h.manager.close(id, false).unwrap();
    settle(&n).await;

    assert_eq!(drain(&n), [NotificationEvent::Closed]);
    assert_eq!(h.popup.closed_ids(), [id]);
    assert!(h.sound.closed_ids().is_empty());
    assert!(drain(&loud).is_empty());
}

#[tokio::test(start_paused = true)]
async fn balanced_holds_keep_request_open() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();

    for _ in 0..3 {
        n.retain().unwrap();
    }
    for _ in 0..3 {
        n.release().unwrap();
    }
    let snapshot = settle(&n).await;
    assert!(drain(&n).is_empty());
    assert_eq!(snapshot.references, 1);

    h.popup.finish_next();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn hold_on_unsent_request_closes_on_release() {
    let h = start(action("Popup"));
    let n = Notification::new(&h.manager, EVENT);
    n.retain().unwrap();
    n.release().unwrap();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
    assert_eq!(h.popup.notify_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn release_after_close_is_ignored() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();
    n.retain().unwrap();
    n.close().unwrap();
    n.release().unwrap();
    let snapshot = settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
    assert_eq!(snapshot.references, 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_completion_still_releases() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();

    drop(h.popup.take());
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn resend_while_active_keeps_the_id() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    let first = n.send_event().await.unwrap();
    let second = n.send_event().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(settle(&n).await.references, 2);
    assert_eq!(h.popup.notify_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn resend_after_close_starts_a_new_episode() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    let first = active_id(n.send_event().await.unwrap());
    n.close().unwrap();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);

    let second = active_id(n.send_event().await.unwrap());
    assert!(second > first);
    h.popup.take().finish();
    h.popup.finish_next();
    settle(&n).await;
    assert_eq!(drain(&n), [NotificationEvent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn ids_are_not_reused() {
    let h = start(action("Instant"));
    let mut seen = Vec::new();
    for _ in 0..5 {
        let mut n = Notification::new(&h.manager, EVENT);
        seen.push(active_id(n.send_event().await.unwrap()));
    }
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test(start_paused = true)]
async fn urgency_comes_from_config_unless_set() {
    let rc = action("Popup").with_entry(EVENT, "Urgency", "High");
    let h = start(rc);

    let mut implicit = Notification::new(&h.manager, EVENT);
    implicit.send_event().await.unwrap();
    assert_eq!(h.popup.last_urgency(), Some(Urgency::High));

    let mut explicit = Notification::new(&h.manager, EVENT);
    explicit.set_urgency(Urgency::Low);
    explicit.send_event().await.unwrap();
    assert_eq!(h.popup.last_urgency(), Some(Urgency::Low));
}

#[tokio::test(start_paused = true)]
async fn configured_urgency_survives_content_changes() {
    let rc = action("Popup").with_entry(EVENT, "Urgency", "Critical");
    let h = start(rc);
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();
    assert_eq!(n.urgency(), Urgency::Critical);
    assert_eq!(n.request().urgency, Urgency::Default);

    n.set_title("changed");
    n.update().unwrap();
    settle(&n).await;
    assert_eq!(h.popup.last_urgency(), Some(Urgency::Critical));
    assert_eq!(h.popup.updated_urgencies(), [Urgency::Critical]);

    // an explicit urgency still wins over the configured one
    n.set_urgency(Urgency::Low);
    n.update().unwrap();
    settle(&n).await;
    assert_eq!(n.urgency(), Urgency::Low);
    assert_eq!(h.popup.updated_urgencies(), [Urgency::Critical, Urgency::Low]);
}

#[tokio::test(start_paused = true)]
async fn content_changes_are_debounced() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.set_title("first");
    n.send_event().await.unwrap();

    n.set_title("second");
    n.set_title("third");
    assert!(settle(&n).await.needs_update);
    assert!(h.popup.updated_titles().is_empty());

    sleep(Duration::from_millis(150)).await;
    assert!(!settle(&n).await.needs_update);
    assert_eq!(h.popup.updated_titles(), ["third"]);

    n.set_title("third");
    assert!(!settle(&n).await.needs_update);
}

#[tokio::test(start_paused = true)]
async fn explicit_update_flushes_now() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();
    n.set_text("changed");
    n.update().unwrap();
    assert!(!settle(&n).await.needs_update);
    assert_eq!(h.popup.updated_titles().len(), 1);

    // the pending timer must not trigger a second refresh
    sleep(Duration::from_millis(150)).await;
    settle(&n).await;
    assert_eq!(h.popup.updated_titles().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn changes_before_sending_do_not_update() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.set_title("draft");
    sleep(Duration::from_millis(150)).await;
    assert!(!settle(&n).await.needs_update);
    assert!(h.popup.updated_titles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_handle_is_forgotten_after_close() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    n.send_event().await.unwrap();
    drop(n);
    let _unsent = Notification::new(&h.manager, EVENT);

    let stats = h.manager.stats().await.unwrap();
    assert_eq!(stats.tracked, 2);
    assert_eq!(stats.active, 1);

    h.popup.finish_next();
    let stats = h.manager.stats().await.unwrap();
    assert_eq!(stats.tracked, 1);
    assert_eq!(stats.active, 0);
}

#[tokio::test(start_paused = true)]
async fn default_event_flag_uses_default_component() {
    let (popup, sound, instant) = (Probe::default(), Probe::default(), Probe::default());
    let resolver = StaticResolver::new()
        .with_app(APP, action("Popup"))
        .with_app("system", action("Sound"))
        .with_app("kmail", action("Instant"));
    let (manager, _task) =
        NotificationManager::new(settings(), resolver, registry(&popup, &sound, &instant)).spawn();

    let mut n = Notification::with_flags(
        &manager,
        EVENT,
        notify_hub::NotificationFlags::DEFAULT_EVENT,
    );
    n.send_event().await.unwrap();
    assert_eq!(sound.notify_count(), 1);

    let mut component = Notification::new(&manager, EVENT);
    component.set_component_name("kmail");
    component.send_event().await.unwrap();
    assert_eq!(instant.notify_count(), 1);
    assert_eq!(popup.notify_count(), 0);
}

#[tokio::test]
async fn invalidated_config_is_reread() {
    let user = tempfile::tempdir().unwrap();
    let bundled = tempfile::tempdir().unwrap();
    let path = bundled.path().join(format!("{APP}.notifyrc"));
    std::fs::write(&path, format!("[event.{EVENT}]\nAction = \"Popup\"\n")).unwrap();

    let (popup, sound, instant) = (Probe::default(), Probe::default(), Probe::default());
    let resolver = FileResolver::new(user.path(), bundled.path(), 15);
    let (manager, _task) =
        NotificationManager::new(settings(), resolver, registry(&popup, &sound, &instant)).spawn();

    let mut first = Notification::new(&manager, EVENT);
    first.send_event().await.unwrap();
    std::fs::write(&path, format!("[event.{EVENT}]\nAction = \"Sound\"\n")).unwrap();

    let mut cached = Notification::new(&manager, EVENT);
    cached.send_event().await.unwrap();
    assert_eq!(popup.notify_count(), 2);

    manager.invalidate_config(APP).unwrap();
    manager.invalidate_config(APP).unwrap();
    let mut fresh = Notification::new(&manager, EVENT);
    fresh.send_event().await.unwrap();
    assert_eq!(sound.notify_count(), 1);
    assert_eq!(popup.notify_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn stopped_manager_rejects_requests() {
    let h = start(action("Popup"));
    let mut n = Notification::new(&h.manager, EVENT);
    h.manager.shutdown().unwrap();
    h.task.await.unwrap();

    assert!(!h.manager.is_running());
    assert!(n.send_event().await.is_err());
    assert!(n.next_event().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn context_selects_its_own_backends() {
    let inbox = notify_hub::Context::new("folder", "inbox");
    let mut rc = action("Popup");
    rc.set_context_entry(EVENT, &inbox, "Action", "Sound");
    let h = start(rc);

    let mut n = Notification::new(&h.manager, EVENT);
    n.add_context(inbox);
    n.send_event().await.unwrap();
    assert_eq!(h.sound.notify_count(), 1);
    assert_eq!(h.popup.notify_count(), 0);
}
