#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub id: u64,
    pub output: String,
    pub is_active: bool,
    pub active_window_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowLayout {
    /// `(column, index in column)` in the scrolling layout, `None` for floating windows.
    pub pos_in_scrolling_layout: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: u64,
    pub workspace_id: u64,
    pub app_id: Option<String>,
    pub layout: Option<WindowLayout>,
}

impl Window {
    pub fn position(&self) -> Option<(u32, u32)> {
        self.layout.and_then(|l| l.pos_in_scrolling_layout)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompositorState {
    pub workspaces: Vec<Workspace>,
    pub windows: Vec<Window>,
}

impl CompositorState {
    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }
}

/// Event kinds forwarded to listeners. Payloads stay inside the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    WorkspacesChanged,
    WorkspaceActivated,
    WorkspaceActiveWindowChanged,
    WindowsChanged,
    WindowOpenedOrChanged,
    WindowClosed,
    WindowFocusChanged,
    WindowLayoutsChanged,
}
