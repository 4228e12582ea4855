//! Taskbar: the windows of the active workspace on one output.

pub mod action;
pub mod events;
pub mod reconcile;

use self::{
    action::{MappingError, MouseButton},
    events::TaskbarEvents,
    reconcile::{Diff, Entry, EntryOp},
};
use crate::{
    config::TaskbarConfig,
    services::{
        compositor::CompositorService,
        xdg_icons::{IconResolver, XdgIcon},
    },
};
use log::{debug, error, warn};
use std::sync::Arc;

/// Widget side of the taskbar. Positions are indexes in display order.
pub trait Renderer {
    fn create_entry(&mut self, window_id: u64, position: usize);
    fn update_entry(&mut self, window_id: u64, position: usize, app_id: &str, is_active: bool);
    fn set_icon(&mut self, window_id: u64, icon: Option<XdgIcon>);
    fn remove_entry(&mut self, window_id: u64);
    fn set_empty(&mut self, empty: bool);
    /// Called once at the end of a pass that changed something.
    fn flush(&mut self) {}
}

pub struct Taskbar<R, I> {
    // dropped first: deregisters before the service handle goes away
    events: TaskbarEvents,
    output: String,
    config: TaskbarConfig,
    service: Arc<CompositorService>,
    entries: Vec<Entry>,
    empty: Option<bool>,
    renderer: R,
    icons: I,
}

impl<R: Renderer, I: IconResolver> Taskbar<R, I> {
    pub fn new(
        output: String,
        config: TaskbarConfig,
        service: Arc<CompositorService>,
        renderer: R,
        icons: I,
    ) -> Self {
        let events = TaskbarEvents::register(Arc::clone(&service));

        Self {
            events,
            output,
            config,
            service,
            entries: Vec::new(),
            empty: None,
            renderer,
            icons,
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn events(&self) -> &TaskbarEvents {
        &self.events
    }

    /// Runs a pass if one was requested since the last one.
    pub fn update_if_requested(&mut self) {
        if self.events.take_pending() {
            self.on_update_requested();
        }
    }

    /// Recomputes the entries from the current snapshot and applies the diff.
    pub fn on_update_requested(&mut self) {
        if !self.events.is_active() {
            return;
        }

        let (entries, diff) = {
            let state = self.service.lock_data();
            reconcile::reconcile(
                &self.output,
                state.workspaces(),
                state.windows(),
                &self.entries,
            )
        };

        let empty = entries.is_empty();
        let old_entries = std::mem::replace(&mut self.entries, entries);
        let changed = self.apply(&old_entries, diff);

        let empty_changed = self.empty != Some(empty);
        if empty_changed {
            self.empty = Some(empty);
            self.renderer.set_empty(empty);
        }

        if changed || empty_changed {
            self.renderer.flush();
        }
    }

    fn apply(&mut self, old_entries: &[Entry], diff: Diff) -> bool {
        let changed = !diff.is_empty();

        for op in diff.ops {
            match op {
                EntryOp::Remove { window_id } => {
                    debug!("removing entry for window {window_id}");
                    self.renderer.remove_entry(window_id);
                }
                EntryOp::Create { position, entry } => {
                    debug!("creating entry for window {}", entry.window_id);
                    self.renderer.create_entry(entry.window_id, position);
                    self.render_entry(position, &entry);
                    self.load_icon(&entry);
                }
                EntryOp::Update { position, entry } => {
                    self.render_entry(position, &entry);
                    let app_changed = old_entries
                        .iter()
                        .find(|e| e.window_id == entry.window_id)
                        .is_none_or(|old| old.app_id != entry.app_id);
                    if app_changed {
                        self.load_icon(&entry);
                    }
                }
            }
        }

        changed
    }

    fn render_entry(&mut self, position: usize, entry: &Entry) {
        self.renderer
            .update_entry(entry.window_id, position, &entry.app_id, entry.is_active);
    }

    fn load_icon(&mut self, entry: &Entry) {
        let icon = if entry.app_id.is_empty() {
            None
        } else {
            self.icons.resolve(&entry.app_id)
        };
        self.renderer.set_icon(entry.window_id, icon);
    }

    /// Handles a click on the entry of `window_id`. Always reports the click
    /// as handled: mapping and send failures are logged here.
    pub fn on_click(&mut self, window_id: u64, button: MouseButton) -> bool {
        if !self.events.is_active() || !self.config.has_click_actions() {
            return true;
        }
        if !self.entries.iter().any(|e| e.window_id == window_id) {
            debug!("Ignoring click on window {window_id}, it has no entry");
            return true;
        }
        debug!("Clicked window {window_id} with {button:?}");

        let request = match action::map(button, &self.config, window_id) {
            Ok(request) => request,
            Err(MappingError::Unbound(button)) => {
                debug!("No action bound to {button:?}");
                return true;
            }
            Err(MappingError::UnknownAction(name)) => {
                warn!("Unknown action {name}");
                return true;
            }
        };

        let Some(command) = request.to_command() else {
            return true;
        };
        if let Err(e) = self.service.send(command) {
            error!("Error sending {:?} for window {window_id}: {e}", request.action);
        }

        true
    }

    /// Stops listening before anything else is released.
    pub fn shutdown(mut self) {
        self.events.unregister();
        debug!("taskbar on {} shut down", self.output);
    }
}
