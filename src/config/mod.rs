use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;
use crate::error::Error as HubError;

mod defaults;
mod duration;
mod env;
mod raw;

pub(crate) use duration::HumantimeDuration;

const MAX_CACHE_SIZE: usize = 1024;
const MAX_UPDATE_DEBOUNCE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Settings {
    pub manager: ManagerSettings,
    pub notifyrc: NotifyRcSettings,
    pub backends: BackendSettings,
}

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Application name used when a request carries no component name.
    pub app_name: String,
    /// Component resolved for requests flagged `DEFAULT_EVENT`.
    pub default_component: String,
    /// Quiet period before content changes are pushed to backends.
    pub update_debounce: Duration,
}

#[derive(Debug, Clone)]
pub struct NotifyRcSettings {
    /// Per-user event files, consulted first.
    pub config_dir: PathBuf,
    /// Bundled event files shipped with applications.
    pub data_dir: PathBuf,
    pub cache_size: usize,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub sound_player: String,
    pub sound_dir: PathBuf,
    pub popup_timeout: Option<Duration>,
}

impl Settings {
    /// Load settings from a file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be parsed, when environment
    /// overrides are invalid, or when the resulting values fail validation.
    pub fn from_env_and_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut raw = raw::load(path).map_err(HubError::from)?;
        raw.apply_env_overrides().map_err(HubError::from)?;
        raw.validate_and_build()
    }

    /// Built-in defaults, without reading any file or environment variable.
    #[must_use]
    pub fn defaults() -> Self {
        raw::RawSettings::default().build_unchecked()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}
