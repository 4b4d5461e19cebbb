use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::manager::Completion;
use crate::notifyrc::EventConfig;
use crate::request::NotificationId;
use crate::types::NotificationFlags;

use super::{Backend, Envelope};

const NAME: &str = "Sound";

/// Plays the `Sound` entry through an external player process.
///
/// With `LOOP_SOUND` the sound is replayed until the request is closed.
#[derive(Debug)]
pub struct SoundBackend {
    player: String,
    sound_dir: PathBuf,
    playing: HashMap<NotificationId, oneshot::Sender<()>>,
}

impl SoundBackend {
    pub fn new(player: impl Into<String>, sound_dir: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            sound_dir: sound_dir.into(),
            playing: HashMap::new(),
        }
    }

    fn locate(&self, sound: &str) -> PathBuf {
        let sound = sound.strip_prefix("file://").unwrap_or(sound);
        let path = Path::new(sound);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.sound_dir.join(path)
        }
    }
}

impl Backend for SoundBackend {
    fn option_name(&self) -> &str {
        NAME
    }

    fn notify(&mut self, envelope: &Envelope<'_>, config: &EventConfig, completion: Completion) {
        self.playing.retain(|_, stop| !stop.is_closed());

        let sound = config.read_entry(NAME);
        if sound.is_empty() {
            warn!(
                id = %envelope.id,
                event = %config.event_id,
                "sound requested without a Sound entry"
            );
            completion.finish();
            return;
        }
        let path = self.locate(&sound);
        if !path.exists() {
            warn!(id = %envelope.id, path = %path.display(), "sound file not found");
            completion.finish();
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        self.playing.insert(envelope.id, stop_tx);
        let looping = envelope.request.flags.contains(NotificationFlags::LOOP_SOUND);
        let player = self.player.clone();
        tokio::spawn(async move {
            if let Err(err) = play(&player, &path, looping, stop_rx).await {
                warn!(error = %err, "sound playback failed");
            }
            completion.finish();
        });
    }

    fn close(&mut self, id: NotificationId) {
        if let Some(stop) = self.playing.remove(&id) {
            debug!(%id, "stopping sound");
            let _ = stop.send(());
        }
    }
}

async fn play(
    player: &str,
    path: &Path,
    looping: bool,
    mut stop: oneshot::Receiver<()>,
) -> Result<(), BackendError> {
    loop {
        let mut child = Command::new(player)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::Spawn {
                backend: NAME,
                command: format!("{player} {}", path.display()),
                source,
            })?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| BackendError::Io {
                    backend: NAME,
                    path: path.to_path_buf(),
                    source,
                })?;
                if !status.success() {
                    return Err(BackendError::Presentation {
                        backend: NAME,
                        message: format!("{player} exited with {status}"),
                    });
                }
                if !looping {
                    return Ok(());
                }
            }
            _ = &mut stop => {
                let _ = child.kill().await;
                return Ok(());
            }
        }
    }
}
