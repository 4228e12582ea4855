use freedesktop_icons::lookup;
use linicon_theme::get_icon_theme;
use log::debug;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdgIcon {
    Image(PathBuf),
    Svg(PathBuf),
}

impl XdgIcon {
    pub fn path(&self) -> &PathBuf {
        match self {
            XdgIcon::Image(path) | XdgIcon::Svg(path) => path,
        }
    }
}

/// Resolves an application id to an icon.
pub trait IconResolver {
    fn resolve(&mut self, app_id: &str) -> Option<XdgIcon>;
}

/// Looks icons up in the configured themes first, then the user's theme,
/// then the default one. The `Icon=` of the app's desktop entry is tried
/// before names derived from the app id. Misses are cached too.
pub struct XdgIconResolver {
    themes: Vec<String>,
    size: u16,
    cache: HashMap<String, Option<XdgIcon>>,
}

impl XdgIconResolver {
    pub fn new(themes: Vec<String>, size: u16) -> Self {
        Self {
            themes,
            size,
            cache: HashMap::new(),
        }
    }

    fn find_icon_path(&self, icon_name: &str) -> Option<PathBuf> {
        for theme in &self.themes {
            let found = lookup(icon_name)
                .with_size(self.size)
                .with_theme(theme)
                .with_cache()
                .find();
            if found.is_some() {
                return found;
            }
        }

        let base_lookup = lookup(icon_name).with_size(self.size).with_cache();
        match get_icon_theme() {
            Some(theme) => base_lookup.with_theme(&theme).find().or_else(|| {
                lookup(icon_name)
                    .with_size(self.size)
                    .with_cache()
                    .find()
            }),
            None => base_lookup.find(),
        }
    }

    /// `Icon=` values are either a theme icon name or an absolute path.
    fn find_desktop_icon(&self, icon: &str) -> Option<PathBuf> {
        let path = Path::new(icon);
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }

        self.find_icon_path(icon)
    }
}

impl IconResolver for XdgIconResolver {
    fn resolve(&mut self, app_id: &str) -> Option<XdgIcon> {
        if let Some(cached) = self.cache.get(app_id) {
            return cached.clone();
        }

        let names = candidate_names(app_id);
        let result = desktop_entry_icon(&application_directories(), &names)
            .and_then(|icon| self.find_desktop_icon(&icon))
            .or_else(|| names.iter().find_map(|name| self.find_icon_path(name)))
            .map(icon_from_path);
        if result.is_none() {
            debug!("no icon found for {app_id}");
        }

        self.cache.insert(app_id.to_string(), result.clone());
        result
    }
}

fn icon_from_path(path: PathBuf) -> XdgIcon {
    if path.extension().is_some_and(|ext| ext == "svg") {
        debug!("svg icon found. Path: {path:?}");

        XdgIcon::Svg(path)
    } else {
        debug!("raster icon found. Path: {path:?}");

        XdgIcon::Image(path)
    }
}

/// `org.gnome.Nautilus` -> `org.gnome.Nautilus`, `org.gnome.nautilus`, `nautilus`
fn candidate_names(app_id: &str) -> Vec<String> {
    let mut names = vec![app_id.to_string()];

    let lower = app_id.to_lowercase();
    if !names.contains(&lower) {
        names.push(lower.clone());
    }

    if let Some(last) = lower.rsplit('.').next()
        && !last.is_empty()
        && !names.iter().any(|n| n == last)
    {
        names.push(last.to_string());
    }

    names
}

/// `Icon=` of the first `<name>.desktop` found, trying the names in order.
fn desktop_entry_icon(dirs: &[PathBuf], names: &[String]) -> Option<String> {
    names.iter().find_map(|name| {
        dirs.iter().find_map(|dir| {
            let contents = fs::read_to_string(dir.join(format!("{name}.desktop"))).ok()?;
            let icon = parse_icon_key(&contents);
            if let Some(icon) = &icon {
                debug!("desktop entry {name} names icon {icon}");
            }
            icon
        })
    })
}

/// The `Icon` key of the `[Desktop Entry]` group.
fn parse_icon_key(contents: &str) -> Option<String> {
    let mut in_main_group = false;

    for line in contents.lines().map(str::trim) {
        if line.starts_with('[') {
            in_main_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_group {
            continue;
        }

        if let Some((key, value)) = line.split_once('=')
            && key.trim() == "Icon"
        {
            let value = value.trim();
            return (!value.is_empty()).then(|| value.to_string());
        }
    }

    None
}

fn application_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(data_home) = env::var("XDG_DATA_HOME") {
        dirs.push(PathBuf::from(data_home).join("applications"));
    }

    if let Ok(home) = env::var("HOME") {
        dirs.push(PathBuf::from(home).join(".local/share/applications"));
    }

    let data_dirs =
        env::var("XDG_DATA_DIRS").unwrap_or_else(|_| "/usr/local/share:/usr/share".into());
    for dir in data_dirs.split(':') {
        if dir.is_empty() {
            continue;
        }
        dirs.push(PathBuf::from(dir).join("applications"));
    }

    dirs.dedup();
    dirs
}
