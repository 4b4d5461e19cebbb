use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::manager::Completion;
use crate::notifyrc::EventConfig;

use super::{Backend, Envelope};

const NAME: &str = "Logfile";
const TIMESTAMP_FORMAT: &str = "%a %b %-d %H:%M:%S %Y";

/// Appends one line per notification to the file named by the `Logfile` entry.
#[derive(Debug, Default)]
pub struct LogfileBackend;

impl LogfileBackend {
    pub const fn new() -> Self {
        Self
    }
}

impl Backend for LogfileBackend {
    fn option_name(&self) -> &str {
        NAME
    }

    fn notify(&mut self, envelope: &Envelope<'_>, config: &EventConfig, completion: Completion) {
        let target = config.read_entry(NAME);
        if target.is_empty() {
            debug!(id = %envelope.id, "no log file configured");
            completion.finish();
            return;
        }

        let path = local_path(&target);
        let mut text = envelope.request.text.clone();
        if text.is_empty() {
            text = config.read_entry("Name");
        }
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let line = format_line(envelope.app_name, &timestamp, &text);

        tokio::spawn(async move {
            if let Err(err) = append(&path, &line).await {
                warn!(error = %err, "failed to write notification log");
            }
            completion.finish();
        });
    }
}

fn local_path(target: &str) -> PathBuf {
    Path::new(target.strip_prefix("file://").unwrap_or(target)).to_path_buf()
}

fn format_line(app_name: &str, timestamp: &str, text: &str) -> String {
    format!("- {app_name} {timestamp}: {text}\n")
}

async fn append(path: &Path, line: &str) -> Result<(), BackendError> {
    let io_err = |source| BackendError::Io {
        backend: NAME,
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_err)?;
    file.write_all(line.as_bytes()).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{append, format_line, local_path};

    #[test]
    fn file_urls_are_accepted() {
        assert_eq!(local_path("file:///tmp/n.log"), PathBuf::from("/tmp/n.log"));
        assert_eq!(local_path("/tmp/n.log"), PathBuf::from("/tmp/n.log"));
    }

    #[test]
    fn line_layout() {
        assert_eq!(
            format_line("mailer", "Sun Oct 18 10:00:00 2026", "3 new messages"),
            "- mailer Sun Oct 18 10:00:00 2026: 3 new messages\n"
        );
    }

    #[tokio::test]
    async fn append_keeps_previous_lines() {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => panic!("failed to create temp dir: {err}"),
        };
        let path = dir.path().join("events.log");
        for line in ["- a 1: one\n", "- a 2: two\n"] {
            if let Err(err) = append(&path, line).await {
                panic!("append failed: {err}");
            }
        }
        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(err) => panic!("failed to read log: {err}"),
        };
        assert_eq!(body, "- a 1: one\n- a 2: two\n");
    }
}
