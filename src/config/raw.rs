use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;

use crate::Result;
use crate::error::ConfigError;

use super::defaults::{
    default_app_name, default_cache_size, default_component, default_config_dir,
    default_data_dir, default_sound_dir, default_sound_player, default_update_debounce,
};
use super::env::{override_duration, override_parsed, override_path, override_string};
use super::{
    BackendSettings, HumantimeDuration, MAX_CACHE_SIZE, MAX_UPDATE_DEBOUNCE, ManagerSettings,
    NotifyRcSettings, Settings,
};

pub(super) fn load(path: impl AsRef<Path>) -> std::result::Result<RawSettings, ConfigError> {
    let mut builder = ::config::Config::builder();
    let path = path.as_ref();
    builder = builder.add_source(::config::File::from(path).required(false));
    builder = builder.add_source(
        ::config::Environment::with_prefix("NOTIFY_HUB")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .map_err(|err| ConfigError::Other(err.to_string()))?
        .try_deserialize()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawSettings {
    #[serde(default)]
    pub(super) manager: RawManager,
    #[serde(default)]
    pub(super) notifyrc: RawNotifyRc,
    #[serde(default)]
    pub(super) backends: RawBackends,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawManager {
    #[serde(default = "default_app_name")]
    pub(super) app_name: String,
    #[serde(default = "default_component")]
    pub(super) default_component: String,
    #[serde(default = "default_update_debounce")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) update_debounce: Duration,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawNotifyRc {
    #[serde(default)]
    pub(super) config_dir: Option<PathBuf>,
    #[serde(default)]
    pub(super) data_dir: Option<PathBuf>,
    #[serde(default = "default_cache_size")]
    pub(super) cache_size: usize,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawBackends {
    #[serde(default = "default_sound_player")]
    pub(super) sound_player: String,
    #[serde(default)]
    pub(super) sound_dir: Option<PathBuf>,
    #[serde(default)]
    #[serde_as(as = "Option<HumantimeDuration>")]
    pub(super) popup_timeout: Option<Duration>,
}

impl RawSettings {
    pub(super) fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        override_string("NOTIFY_HUB_APP_NAME", &mut self.manager.app_name)?;
        override_string(
            "NOTIFY_HUB_DEFAULT_COMPONENT",
            &mut self.manager.default_component,
        )?;
        override_duration(
            "NOTIFY_HUB_UPDATE_DEBOUNCE",
            &mut self.manager.update_debounce,
        )?;
        override_path("NOTIFY_HUB_CONFIG_DIR", &mut self.notifyrc.config_dir)?;
        override_path("NOTIFY_HUB_DATA_DIR", &mut self.notifyrc.data_dir)?;
        override_parsed("NOTIFY_HUB_CACHE_SIZE", &mut self.notifyrc.cache_size)?;
        override_string("NOTIFY_HUB_SOUND_PLAYER", &mut self.backends.sound_player)?;
        override_path("NOTIFY_HUB_SOUND_DIR", &mut self.backends.sound_dir)
    }

    pub(super) fn validate_and_build(self) -> Result<Settings> {
        if self.manager.app_name.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "manager.app_name",
                message: "application name cannot be empty".to_string(),
            }
            .into());
        }
        if self.manager.update_debounce > MAX_UPDATE_DEBOUNCE {
            return Err(ConfigError::InvalidField {
                field: "manager.update_debounce",
                message: format!(
                    "expected at most {}, got {}",
                    humantime::format_duration(MAX_UPDATE_DEBOUNCE),
                    humantime::format_duration(self.manager.update_debounce)
                ),
            }
            .into());
        }
        if !(1..=MAX_CACHE_SIZE).contains(&self.notifyrc.cache_size) {
            return Err(ConfigError::InvalidField {
                field: "notifyrc.cache_size",
                message: format!(
                    "expected between 1 and {MAX_CACHE_SIZE}, got {}",
                    self.notifyrc.cache_size
                ),
            }
            .into());
        }
        if self.backends.sound_player.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "backends.sound_player",
            }
            .into());
        }

        Ok(self.build_unchecked())
    }

    pub(super) fn build_unchecked(self) -> Settings {
        Settings {
            manager: ManagerSettings {
                app_name: self.manager.app_name,
                default_component: self.manager.default_component,
                update_debounce: self.manager.update_debounce,
            },
            notifyrc: NotifyRcSettings {
                config_dir: self.notifyrc.config_dir.unwrap_or_else(default_config_dir),
                data_dir: self.notifyrc.data_dir.unwrap_or_else(default_data_dir),
                cache_size: self.notifyrc.cache_size,
            },
            backends: BackendSettings {
                sound_player: self.backends.sound_player,
                sound_dir: self.backends.sound_dir.unwrap_or_else(default_sound_dir),
                popup_timeout: self.backends.popup_timeout,
            },
        }
    }
}

impl Default for RawManager {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            default_component: default_component(),
            update_debounce: default_update_debounce(),
        }
    }
}

impl Default for RawNotifyRc {
    fn default() -> Self {
        Self {
            config_dir: None,
            data_dir: None,
            cache_size: default_cache_size(),
        }
    }
}

impl Default for RawBackends {
    fn default() -> Self {
        Self {
            sound_player: default_sound_player(),
            sound_dir: None,
            popup_timeout: None,
        }
    }
}
