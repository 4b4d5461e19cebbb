use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::manager::Completion;
use crate::notifyrc::EventConfig;

use super::{Backend, Envelope};

const NAME: &str = "Execute";

/// Runs the shell command from the `Execute` entry and finishes right away.
///
/// Placeholders: `%i` id, `%e` event, `%a` application, `%n` display name,
/// `%t` title, `%d` text. Each is substituted shell-quoted; `%%` is a literal `%`.
#[derive(Debug)]
pub struct ExecuteBackend {
    display_name: String,
}

impl ExecuteBackend {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }
}

impl Backend for ExecuteBackend {
    fn option_name(&self) -> &str {
        NAME
    }

    fn notify(&mut self, envelope: &Envelope<'_>, config: &EventConfig, completion: Completion) {
        let template = config.read_entry(NAME);
        if !template.trim().is_empty() {
            let id = envelope.id.to_string();
            let line = expand_command(&template, |macro_char| match macro_char {
                'i' => Some(id.as_str()),
                'e' => Some(envelope.request.event_id()),
                'a' => Some(envelope.app_name),
                'n' => Some(self.display_name.as_str()),
                't' => Some(envelope.request.title.as_str()),
                'd' => Some(envelope.request.text.as_str()),
                _ => None,
            });
            if let Err(err) = spawn_detached(line.trim()) {
                warn!(error = %err, "failed to run notification command");
            }
        }
        completion.finish();
    }
}

/// Substitute `%x` placeholders, quoting every substituted value for the shell.
/// Unknown placeholders are left untouched.
pub(crate) fn expand_command<'a>(
    template: &str,
    lookup: impl Fn(char) -> Option<&'a str>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(macro_char) => match lookup(macro_char) {
                Some(value) => out.push_str(&shell_quote(value)),
                None => {
                    out.push('%');
                    out.push(macro_char);
                }
            },
            None => out.push('%'),
        }
    }
    out
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn spawn_detached(line: &str) -> Result<(), BackendError> {
    #[cfg(windows)]
    let mut command = {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(line);
        command
    };
    #[cfg(not(windows))]
    let mut command = {
        let mut command = Command::new("sh");
        command.arg("-c").arg(line);
        command
    };

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| BackendError::Spawn {
            backend: NAME,
            command: line.to_string(),
            source,
        })?;

    let line = line.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => debug!(command = %line, "notification command done"),
            Ok(status) => debug!(command = %line, %status, "notification command failed"),
            Err(err) => warn!(command = %line, error = %err, "lost track of notification command"),
        }
    });
    Ok(())
}
