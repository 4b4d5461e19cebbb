use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use notify_hub::config::Settings;
use notify_hub::telemetry::init_tracing;
use notify_hub::{
    BackendRegistry, FileResolver, Notification, NotificationEvent, NotificationFlags,
    NotificationManager, RequestId,
};
use tokio::signal;
use tokio::time::sleep;
use tracing::{info, warn};

use super::cli::Cli;

const DEFAULT_CONFIG: &str = "notify-hub.toml";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Closed,
    Activated(u32),
    NotDispatched,
    TimedOut,
    Interrupted,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Closed | Self::Activated(_) | Self::NotDispatched => ExitCode::SUCCESS,
            Self::TimedOut => ExitCode::from(2),
            Self::Interrupted => ExitCode::from(130),
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let settings = Settings::from_env_and_file(&config_path)
        .with_context(|| format!("loading settings from {}", config_path.display()))?;

    let resolver = FileResolver::from_settings(&settings.notifyrc);
    let registry = BackendRegistry::with_builtins(&settings);
    let (manager, task) =
        NotificationManager::new(settings.manager.clone(), resolver, registry).spawn();

    let mut notification = Notification::with_flags(&manager, &cli.event, flags(&cli));
    notification.set_title(&cli.title);
    notification.set_text(&cli.text);
    if let Some(icon) = &cli.icon {
        notification.set_icon_name(icon);
    }
    if let Some(app) = &cli.app {
        notification.set_component_name(app);
    }
    notification.set_contexts(cli.contexts.clone());
    notification.set_actions(cli.actions.iter().cloned());
    if let Some(urgency) = cli.urgency {
        notification.set_urgency(urgency);
    }

    let id = notification.send_event().await?;
    let outcome = if id == RequestId::Unset {
        info!(event = %cli.event, "event has no backend configured");
        Outcome::NotDispatched
    } else {
        info!(event = %cli.event, %id, "event sent");
        wait_for_outcome(&notification, cli.timeout).await
    };

    if matches!(outcome, Outcome::TimedOut | Outcome::Interrupted) {
        info!(?outcome, "closing notification");
        notification.close()?;
    }

    drop(notification);
    manager.shutdown()?;
    if let Err(err) = task.await {
        warn!(error = %err, "manager task terminated unexpectedly");
    }
    Ok(outcome)
}

fn flags(cli: &Cli) -> NotificationFlags {
    let mut flags = NotificationFlags::default();
    if cli.persistent {
        flags.remove(NotificationFlags::CLOSE_ON_TIMEOUT);
        flags.insert(NotificationFlags::PERSISTENT);
    }
    if cli.loop_sound {
        flags.insert(NotificationFlags::LOOP_SOUND);
    }
    flags
}

async fn wait_for_outcome(notification: &Notification, timeout: Option<Duration>) -> Outcome {
    let deadline = async {
        match timeout {
            Some(limit) => sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut activated = None;
    loop {
        tokio::select! {
            biased;
            _ = signal::ctrl_c() => return Outcome::Interrupted,
            () = &mut deadline => return Outcome::TimedOut,
            event = notification.next_event() => match event {
                Some(NotificationEvent::Activated(action)) => {
                    info!(action, "notification activated");
                    activated = Some(action);
                }
                Some(NotificationEvent::Replied(text)) => info!(%text, "reply received"),
                Some(NotificationEvent::ReplyActivated) => info!("reply action picked"),
                Some(NotificationEvent::Closed) | None => {
                    return activated.map_or(Outcome::Closed, Outcome::Activated);
                }
            },
        }
    }
}
