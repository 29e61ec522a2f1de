use log::{LevelFilter, debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::pdf::{DEFAULT_MARGIN_PX, DEFAULT_WORKERS};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagechat";

const SETTINGS_HEADER: &str = "\
# pagechat configuration
# Command-line flags override these values for a single session.

";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Proxy that serves document bytes for `?url=<document>`
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Assistant endpoint accepting `{message, fileUrl, pageNumber}`
    #[serde(default = "default_chat_url")]
    pub chat_url: String,

    /// Horizontal space kept free around the page, in pixels
    #[serde(default = "default_margin_px")]
    pub margin_px: u32,

    /// Pixel size of one terminal cell, used to size the page container
    #[serde(default = "default_cell_width_px")]
    pub cell_width_px: u16,

    #[serde(default = "default_cell_height_px")]
    pub cell_height_px: u16,

    #[serde(default = "default_render_threads")]
    pub render_threads: usize,

    /// Transport timeout for fetch and chat calls; none when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_timeout_secs: Option<u64>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_proxy_url() -> String {
    "http://localhost:5000/api/pdf-proxy".to_string()
}

fn default_chat_url() -> String {
    "http://localhost:5000/api/test-me".to_string()
}

fn default_margin_px() -> u32 {
    DEFAULT_MARGIN_PX
}

fn default_cell_width_px() -> u16 {
    8
}

fn default_cell_height_px() -> u16 {
    16
}

fn default_render_threads() -> usize {
    DEFAULT_WORKERS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            proxy_url: default_proxy_url(),
            chat_url: default_chat_url(),
            margin_px: default_margin_px(),
            cell_width_px: default_cell_width_px(),
            cell_height_px: default_cell_height_px(),
            render_threads: default_render_threads(),
            http_timeout_secs: None,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    /// Parsed log level, falling back to `Info` for unknown names
    #[must_use]
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

#[must_use]
pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, creating the file if missing
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_or_create(&path);
}

/// Load settings from `path`, writing defaults there if it does not exist
pub fn load_settings_or_create(path: &Path) {
    if path.exists() {
        load_settings_from_path(path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        save_settings_to_file(&current(), path);
    }
}

pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match parse_settings(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                replace(settings);
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

pub fn parse_settings(content: &str) -> Result<Settings, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

// Public API for accessing/modifying settings

/// Snapshot of the active settings
#[must_use]
pub fn current() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_else(|e| e.into_inner().clone())
}

/// Replace the active settings for this session without saving
pub fn replace(settings: Settings) {
    let mut global = SETTINGS
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    *global = settings;
}

/// Apply an in-session change without saving
pub fn update(f: impl FnOnce(&mut Settings)) {
    let mut global = SETTINGS
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    f(&mut global);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn missing_fields_take_defaults() {
        let settings = parse_settings("proxy_url: \"http://proxy/fetch\"\n").unwrap();
        assert_eq!(settings.proxy_url, "http://proxy/fetch");
        assert_eq!(settings.chat_url, default_chat_url());
        assert_eq!(settings.margin_px, 40);
        assert_eq!(settings.http_timeout(), None);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse_settings("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let settings = Settings {
            log_level: "chatty".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.log_level_filter(), LevelFilter::Info);

        let settings = Settings {
            log_level: "debug".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.log_level_filter(), LevelFilter::Debug);
    }

    #[test]
    #[serial]
    fn creates_file_with_defaults_then_reads_it_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILENAME);
        replace(Settings::default());

        load_settings_or_create(&path);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# pagechat configuration"));

        fs::write(&path, "chat_url: \"http://chat/ask\"\nrender_threads: 4\n").unwrap();
        load_settings_or_create(&path);
        let loaded = current();
        assert_eq!(loaded.chat_url, "http://chat/ask");
        assert_eq!(loaded.render_threads, 4);

        replace(Settings::default());
    }

    #[test]
    #[serial]
    fn invalid_file_keeps_previous_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "render_threads: [not, a, number]\n").unwrap();

        replace(Settings::default());
        load_settings_from_path(&path);
        assert_eq!(current(), Settings::default());
    }
}
