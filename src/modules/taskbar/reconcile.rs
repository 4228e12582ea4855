use crate::services::compositor::{Window, Workspace};
use itertools::Itertools;
use std::{cmp::Ordering, collections::HashMap};

/// Never a niri window id.
const NO_ACTIVE_WINDOW: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub window_id: u64,
    pub app_id: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOp {
    Remove { window_id: u64 },
    Create { position: usize, entry: Entry },
    Update { position: usize, entry: Entry },
}

/// Ordered edit script turning the previous entries into the new ones.
/// Removals come first, then creations and updates in display order.
///
/// Positions are indexes in the new entry list. An entry without an op kept
/// both its content and its index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub ops: Vec<EntryOp>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The workspace shown on `output`: the first active one, if any.
pub fn active_workspace<'a>(output: &str, workspaces: &'a [Workspace]) -> Option<&'a Workspace> {
    workspaces
        .iter()
        .find(|ws| ws.output == output && ws.is_active)
}

/// Windows without a scrolling layout position go first, then columns left to
/// right and each column top to bottom.
pub fn compare_layout(a: &Window, b: &Window) -> Ordering {
    match (a.position(), b.position()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

/// One entry per window id on `workspace`, in layout order. A repeated id
/// keeps its first position.
pub fn entries(workspace: &Workspace, windows: &[Window]) -> Vec<Entry> {
    let active_window_id = workspace.active_window_id.unwrap_or(NO_ACTIVE_WINDOW);

    windows
        .iter()
        .filter(|w| w.workspace_id == workspace.id)
        .sorted_by(|a, b| compare_layout(a, b))
        .unique_by(|w| w.id)
        .map(|w| Entry {
            window_id: w.id,
            app_id: w.app_id.clone().unwrap_or_default(),
            is_active: w.id == active_window_id,
        })
        .collect()
}

pub fn diff(previous: &[Entry], next: &[Entry]) -> Diff {
    let next_ids: HashMap<u64, &Entry> = next.iter().map(|e| (e.window_id, e)).collect();

    let mut ops: Vec<EntryOp> = previous
        .iter()
        .filter(|e| !next_ids.contains_key(&e.window_id))
        .map(|e| EntryOp::Remove {
            window_id: e.window_id,
        })
        .collect();

    let kept: HashMap<u64, (usize, &Entry)> = previous
        .iter()
        .enumerate()
        .filter(|(_, e)| next_ids.contains_key(&e.window_id))
        .map(|(position, e)| (e.window_id, (position, e)))
        .collect();

    for (position, entry) in next.iter().enumerate() {
        match kept.get(&entry.window_id) {
            None => ops.push(EntryOp::Create {
                position,
                entry: entry.clone(),
            }),
            Some((old_position, old)) if *old_position != position || *old != entry => {
                ops.push(EntryOp::Update {
                    position,
                    entry: entry.clone(),
                })
            }
            Some(_) => {}
        }
    }

    Diff { ops }
}

/// One reconciliation pass over a consistent snapshot.
///
/// No active workspace on `output` yields no entries and removes everything
/// shown before.
pub fn reconcile(
    output: &str,
    workspaces: &[Workspace],
    windows: &[Window],
    previous: &[Entry],
) -> (Vec<Entry>, Diff) {
    let next = match active_workspace(output, workspaces) {
        Some(workspace) => entries(workspace, windows),
        None => {
            log::debug!("No active workspace found for output {output}");
            Vec::new()
        }
    };
    let diff = diff(previous, &next);

    (next, diff)
}
