//! `NOTIFY_HUB_*` overrides applied on top of the file and `NOTIFY_HUB__*` layers.
//! Unset or blank variables leave the target untouched.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use humantime::parse_duration;

use crate::error::ConfigError;

fn lookup(key: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(ConfigError::InvalidField {
            field: key,
            message: err.to_string(),
        }),
    }
}

fn override_with<T>(
    key: &'static str,
    target: &mut T,
    parse: impl FnOnce(&str) -> Result<T, String>,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key)? {
        *target = parse(&raw).map_err(|message| ConfigError::InvalidField { field: key, message })?;
    }
    Ok(())
}

pub(super) fn override_string(key: &'static str, target: &mut String) -> Result<(), ConfigError> {
    override_with(key, target, |raw| Ok(raw.to_string()))
}

pub(super) fn override_path(
    key: &'static str,
    target: &mut Option<PathBuf>,
) -> Result<(), ConfigError> {
    override_with(key, target, |raw| Ok(Some(PathBuf::from(raw))))
}

pub(super) fn override_parsed<T>(key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    override_with(key, target, |raw| raw.parse().map_err(|err: T::Err| err.to_string()))
}

pub(super) fn override_duration(
    key: &'static str,
    target: &mut Duration,
) -> Result<(), ConfigError> {
    override_with(key, target, |raw| parse_duration(raw).map_err(|err| err.to_string()))
}
