use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, io::ErrorKind, path::Path};

pub const CONFIG_PATH: &str = "~/.config/niri-taskbar.toml";

const DEFAULT_FULLSCREEN_METHOD: &str = "MaximizeWindowToEdges";

/// One icon theme or an ordered list of themes to try.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum IconTheme {
    Single(String),
    List(Vec<String>),
}

impl IconTheme {
    pub fn names(&self) -> Vec<String> {
        match self {
            IconTheme::Single(name) => vec![name.clone()],
            IconTheme::List(names) => names.clone(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TaskbarConfig {
    #[serde(default)]
    pub icon_theme: Option<IconTheme>,
    #[serde(default = "default_icon_size")]
    pub icon_size: u16,
    #[serde(default)]
    pub on_click: Option<String>,
    #[serde(default)]
    pub on_click_middle: Option<String>,
    #[serde(default)]
    pub on_click_right: Option<String>,
    /// Niri action used for `maximize`.
    #[serde(default)]
    pub fullscreen_method: Option<String>,
}

fn default_icon_size() -> u16 {
    16
}

impl TaskbarConfig {
    pub fn icon_themes(&self) -> Vec<String> {
        self.icon_theme
            .as_ref()
            .map(IconTheme::names)
            .unwrap_or_default()
    }

    pub fn fullscreen_method(&self) -> &str {
        self.fullscreen_method
            .as_deref()
            .unwrap_or(DEFAULT_FULLSCREEN_METHOD)
    }

    pub fn has_click_actions(&self) -> bool {
        self.on_click.is_some() || self.on_click_middle.is_some() || self.on_click_right.is_some()
    }
}

impl Default for TaskbarConfig {
    fn default() -> Self {
        Self {
            icon_theme: None,
            icon_size: default_icon_size(),
            on_click: None,
            on_click_middle: None,
            on_click_right: None,
            fullscreen_method: None,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "default_log_level", alias = "log_level")]
    pub log_level: String,
    #[serde(flatten)]
    pub taskbar: TaskbarConfig,
}

fn default_log_level() -> String {
    "warn".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            taskbar: TaskbarConfig::default(),
        }
    }
}

pub fn read_config(path: Option<&Path>) -> Result<Config> {
    let expanded;
    let path = match path {
        Some(path) => path,
        None => {
            expanded = shellexpand::path::tilde(Path::new(CONFIG_PATH));
            &*expanded
        }
    };

    match fs::read_to_string(path) {
        Ok(content) => {
            log::info!("Reading config file {path:?}");
            parse_config(&content).with_context(|| format!("Invalid config file {path:?}"))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("No config file at {path:?}, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read config file {path:?}")),
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
