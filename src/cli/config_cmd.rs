//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;
    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let config = store.load().await?;
    presenter.output(&read_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()));
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &read_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()),
        );
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Validate a value and store it under `key`
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "device" => config.device = Some(non_empty(key, value)?),
        "audio_device" => config.audio_device = Some(non_empty(key, value)?),
        "model_dir" => config.model_dir = Some(non_empty(key, value)?),
        "output_dir" => config.output_dir = Some(non_empty(key, value)?),
        "model_url" => {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(invalid(key, "Value must be an http(s) URL"));
            }
            config.model_url = Some(value.to_string());
        }
        "width" => config.width = Some(parse_positive(key, value)? as u32),
        "height" => config.height = Some(parse_positive(key, value)? as u32),
        "detection_interval_ms" => config.detection_interval_ms = Some(parse_positive(key, value)?),
        "chunk_interval_ms" => config.chunk_interval_ms = Some(parse_positive(key, value)?),
        "video_bitrate" => config.video_bitrate = Some(parse_positive(key, value)?),
        "stop_grace_ms" => {
            config.stop_grace_ms = Some(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid(key, "Value must be a whole number of milliseconds"))?,
            )
        }
        "audio" => config.audio = Some(parse_bool(key, value)?),
        "notify" => config.notify = Some(parse_bool(key, value)?),
        _ => return check_key(key),
    }
    Ok(())
}

fn read_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "device" => config.device.clone(),
        "audio_device" => config.audio_device.clone(),
        "width" => config.width.map(|v| v.to_string()),
        "height" => config.height.map(|v| v.to_string()),
        "audio" => config.audio.map(|v| v.to_string()),
        "model_dir" => config.model_dir.clone(),
        "model_url" => config.model_url.clone(),
        "detection_interval_ms" => config.detection_interval_ms.map(|v| v.to_string()),
        "chunk_interval_ms" => config.chunk_interval_ms.map(|v| v.to_string()),
        "stop_grace_ms" => config.stop_grace_ms.map(|v| v.to_string()),
        "video_bitrate" => config.video_bitrate.map(|v| v.to_string()),
        "output_dir" => config.output_dir.clone(),
        "notify" => config.notify.map(|v| v.to_string()),
        _ => None,
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(key, "Value must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn parse_positive(key: &str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 && n <= u32::MAX as u64 => Ok(n),
        _ => Err(invalid(key, "Value must be a positive whole number")),
    }
}

/// Parse a boolean value
fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(key, "Value must be 'true' or 'false'")),
    }
}
