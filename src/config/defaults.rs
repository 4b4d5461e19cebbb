use std::path::PathBuf;
use std::time::Duration;

const DIR_NAME: &str = "notify-hub";

pub(super) fn default_app_name() -> String {
    "notify-hub".to_string()
}

pub(super) fn default_component() -> String {
    "system".to_string()
}

pub(super) const fn default_update_debounce() -> Duration {
    Duration::from_millis(100)
}

pub(super) fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(DIR_NAME)
}

pub(super) fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join(DIR_NAME)
        .join("events")
}

pub(super) const fn default_cache_size() -> usize {
    15
}

pub(super) fn default_sound_player() -> String {
    "paplay".to_string()
}

pub(super) fn default_sound_dir() -> PathBuf {
    PathBuf::from("/usr/share/sounds")
}
