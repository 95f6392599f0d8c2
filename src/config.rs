use crate::{
    error::ConfigError,
    layout::Layout,
    theme::{Palette, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND},
};
use anyhow::Context;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const API_KEY_VAR: &str = "LASTFM_API_KEY";
pub const USERNAME_VAR: &str = "LASTFM_USERNAME";
pub const IMAGE_FILENAME_VAR: &str = "TUNEDISPLAY_IMAGE_FILENAME";
pub const DEFAULT_IMAGE_FILENAME: &str = "lastfm_nowplaying_art.png";

const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY";
const USERNAME_PLACEHOLDER: &str = "YOUR_USERNAME";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub lastfm: LastFmConfig,
    pub display: DisplayConfig,
}

impl Config {
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }

        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            candidates.push(current_dir.join("config.toml"));
            candidates.push(current_dir.join("config").join("config.toml"));
            candidates.push(current_dir.join("config").join("tunedisplay.toml"));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("config.toml"));
                candidates.push(dir.join("config").join("config.toml"));
                candidates.push(dir.join("config").join("tunedisplay.toml"));
            }
        }

        for path in candidates {
            if path.exists() {
                return Self::read(&path);
            }
        }

        Ok(Config::default())
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    fn parse(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }
}

/// Credential fallbacks from the config file. The environment wins.
#[derive(Debug, Clone, Default)]
pub struct LastFmConfig {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub image_filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub layout: Option<String>,
    pub fullscreen: bool,
    pub always_on_top: bool,
    pub hide_cursor: bool,
    pub opacity: f32,
    pub background: String,
    pub foreground: String,
    pub title_size: f32,
    pub artist_size: f32,
    pub album_size: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            layout: None,
            fullscreen: true,
            always_on_top: true,
            hide_cursor: true,
            opacity: 0.55,
            background: DEFAULT_BACKGROUND.to_string(),
            foreground: DEFAULT_FOREGROUND.to_string(),
            title_size: 32.0,
            artist_size: 24.0,
            album_size: 18.0,
            width: 600.0,
            height: 600.0,
        }
    }
}

/// Values read from the process environment (after `.env` is loaded).
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub image_filename: Option<String>,
}

impl EnvCredentials {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var(API_KEY_VAR).ok(),
            username: env::var(USERNAME_VAR).ok(),
            image_filename: env::var(IMAGE_FILENAME_VAR).ok(),
        }
    }
}

/// Command-line switches that override the file configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub no_art: bool,
    pub interval_secs: u64,
    pub layout: Option<String>,
    pub windowed: bool,
    pub headless: bool,
    pub open_art: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub username: String,
}

impl Credentials {
    pub fn resolve(env: &EnvCredentials, file: &LastFmConfig) -> Result<Self, ConfigError> {
        let api_key = first_present(&env.api_key, &file.api_key)
            .filter(|key| key != API_KEY_PLACEHOLDER)
            .ok_or(ConfigError::MissingApiKey)?;
        let username = first_present(&env.username, &file.username)
            .filter(|user| user != USERNAME_PLACEHOLDER)
            .ok_or(ConfigError::MissingUsername)?;
        Ok(Self { api_key, username })
    }
}

fn first_present(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Everything the lifecycle needs, validated.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Credentials,
    pub image_path: PathBuf,
    pub interval: Duration,
    pub art_enabled: bool,
    pub layout: Layout,
    pub palette: Palette,
    pub headless: bool,
    pub open_art: bool,
    pub warnings: Vec<String>,
}

impl Settings {
    pub fn resolve(
        config: &Config,
        env: &EnvCredentials,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        let credentials = Credentials::resolve(env, &config.lastfm)?;
        if overrides.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        let image_path = first_present(&env.image_filename, &config.lastfm.image_filename)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_FILENAME));

        let mut warnings = Vec::new();
        let layout = Layout::resolve(
            &config.display,
            overrides.layout.as_deref(),
            overrides.windowed,
            &mut warnings,
        );
        let palette = Palette::resolve(&config.display, &mut warnings);

        Ok(Self {
            credentials,
            image_path,
            interval: Duration::from_secs(overrides.interval_secs),
            art_enabled: !overrides.no_art,
            layout,
            palette,
            headless: overrides.headless,
            open_art: overrides.open_art,
            warnings,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    lastfm: LastFmSection,
    #[serde(default)]
    display: DisplaySection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let defaults = DisplayConfig::default();
        let display = value.display;
        let display = DisplayConfig {
            layout: display.layout,
            fullscreen: display.fullscreen.unwrap_or(defaults.fullscreen),
            always_on_top: display.always_on_top.unwrap_or(defaults.always_on_top),
            hide_cursor: display.hide_cursor.unwrap_or(defaults.hide_cursor),
            opacity: display.opacity.unwrap_or(defaults.opacity),
            background: display.background.unwrap_or(defaults.background),
            foreground: display.foreground.unwrap_or(defaults.foreground),
            title_size: display.title_size.unwrap_or(defaults.title_size),
            artist_size: display.artist_size.unwrap_or(defaults.artist_size),
            album_size: display.album_size.unwrap_or(defaults.album_size),
            width: display.width.unwrap_or(defaults.width),
            height: display.height.unwrap_or(defaults.height),
        };

        Config {
            lastfm: LastFmConfig {
                api_key: value.lastfm.api_key,
                username: value.lastfm.username,
                image_filename: value.lastfm.image_filename,
            },
            display,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LastFmSection {
    api_key: Option<String>,
    username: Option<String>,
    image_filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplaySection {
    layout: Option<String>,
    fullscreen: Option<bool>,
    always_on_top: Option<bool>,
    hide_cursor: Option<bool>,
    opacity: Option<f32>,
    background: Option<String>,
    foreground: Option<String>,
    title_size: Option<f32>,
    artist_size: Option<f32>,
    album_size: Option<f32>,
    width: Option<f32>,
    height: Option<f32>,
}
