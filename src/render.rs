use crate::{modules::taskbar::Renderer, services::xdg_icons::XdgIcon};
use itertools::Itertools;
use log::error;
use serde::Serialize;
use std::{collections::HashMap, io::Write, path::PathBuf};

#[derive(Debug, Clone, Default, Serialize)]
struct RenderedEntry {
    id: u64,
    #[serde(skip)]
    position: usize,
    app_id: String,
    active: bool,
    icon: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Frame<'a> {
    text: String,
    tooltip: String,
    class: Vec<&'static str>,
    entries: Vec<&'a RenderedEntry>,
}

/// Prints one JSON line per changed pass, waybar custom module style.
pub struct JsonRenderer<W: Write> {
    out: W,
    entries: HashMap<u64, RenderedEntry>,
    empty: bool,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            entries: HashMap::new(),
            empty: true,
        }
    }

    fn frame(&self) -> Frame<'_> {
        let entries = self
            .entries
            .values()
            .sorted_by_key(|e| e.position)
            .collect::<Vec<_>>();

        let text = entries
            .iter()
            .map(|e| match (e.app_id.as_str(), e.active) {
                ("", true) => "[?]".to_string(),
                ("", false) => "?".to_string(),
                (app_id, true) => format!("[{app_id}]"),
                (app_id, false) => app_id.to_string(),
            })
            .join(" ");
        let tooltip = entries.iter().map(|e| e.app_id.as_str()).join("\n");

        let mut class = vec!["taskbar"];
        if self.empty {
            class.push("empty");
        }

        Frame {
            text,
            tooltip,
            class,
            entries,
        }
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn create_entry(&mut self, window_id: u64, position: usize) {
        self.entries.insert(
            window_id,
            RenderedEntry {
                id: window_id,
                position,
                ..RenderedEntry::default()
            },
        );
    }

    fn update_entry(&mut self, window_id: u64, position: usize, app_id: &str, is_active: bool) {
        let entry = self.entries.entry(window_id).or_insert_with(|| RenderedEntry {
            id: window_id,
            ..RenderedEntry::default()
        });
        entry.position = position;
        entry.app_id = app_id.to_string();
        entry.active = is_active;
    }

    fn set_icon(&mut self, window_id: u64, icon: Option<XdgIcon>) {
        if let Some(entry) = self.entries.get_mut(&window_id) {
            entry.icon = icon.map(|i| i.path().clone());
        }
    }

    fn remove_entry(&mut self, window_id: u64) {
        self.entries.remove(&window_id);
    }

    fn set_empty(&mut self, empty: bool) {
        self.empty = empty;
    }

    fn flush(&mut self) {
        let line = match serde_json::to_string(&self.frame()) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize taskbar frame: {e}");
                return;
            }
        };

        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            error!("Failed to write taskbar frame: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn frames(renderer: &JsonRenderer<Vec<u8>>) -> Vec<Value> {
        String::from_utf8(renderer.out.clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn flush_prints_entries_in_position_order() {
        let mut renderer = JsonRenderer::new(Vec::new());
        renderer.create_entry(2, 1);
        renderer.update_entry(2, 1, "foot", true);
        renderer.create_entry(1, 0);
        renderer.update_entry(1, 0, "firefox", false);
        renderer.set_icon(1, Some(XdgIcon::Svg("/icons/firefox.svg".into())));
        renderer.set_empty(false);
        renderer.flush();

        assert_eq!(
            frames(&renderer),
            vec![json!({
                "text": "firefox [foot]",
                "tooltip": "firefox\nfoot",
                "class": ["taskbar"],
                "entries": [
                    {"id": 1, "app_id": "firefox", "active": false, "icon": "/icons/firefox.svg"},
                    {"id": 2, "app_id": "foot", "active": true, "icon": null},
                ],
            })]
        );
    }

    #[test]
    fn empty_frame_carries_the_empty_class() {
        let mut renderer = JsonRenderer::new(Vec::new());
        renderer.create_entry(1, 0);
        renderer.remove_entry(1);
        renderer.set_empty(true);
        renderer.flush();

        let frame = &frames(&renderer)[0];
        assert_eq!(frame["class"], json!(["taskbar", "empty"]));
        assert_eq!(frame["text"], "");
        assert_eq!(frame["entries"], json!([]));
    }
}
