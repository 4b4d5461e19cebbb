use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use humantime::parse_duration;
use notify_hub::{Context, Urgency};

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Send one event through the configured backends",
    long_about = None
)]
pub struct Cli {
    /// Event identifier looked up in the application's notifyrc file.
    pub event: String,

    /// Path to the TOML settings file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Application (component) the event belongs to.
    #[arg(long, value_name = "NAME")]
    pub app: Option<String>,

    #[arg(long, default_value = "")]
    pub title: String,

    #[arg(long, default_value = "")]
    pub text: String,

    /// Themed icon name.
    #[arg(long)]
    pub icon: Option<String>,

    /// Context selecting a specific configuration group, as `key=value`. Repeatable.
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub contexts: Vec<Context>,

    /// Action labels offered to the user. Repeatable.
    #[arg(long = "action", value_name = "LABEL")]
    pub actions: Vec<String>,

    /// Low, normal, high or critical. Defaults to the event's `Urgency` entry.
    #[arg(long)]
    pub urgency: Option<Urgency>,

    /// Keep the popup until it is dismissed.
    #[arg(long, action = ArgAction::SetTrue)]
    pub persistent: bool,

    /// Replay the sound until the notification closes.
    #[arg(long, action = ArgAction::SetTrue)]
    pub loop_sound: bool,

    /// Close the notification if it is still open after this long (e.g. "30s").
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Use a JSON layer for logs (`--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Explicit log filter (e.g. "notify_hub=debug").
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
