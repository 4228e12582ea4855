use super::{
    CommandTransport, CompositorService,
    types::{CompositorState, EventKind, Window, WindowLayout, Workspace},
};
use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use log::{debug, error, info};
use niri_ipc::{
    Event, Reply, Request, Response,
    state::{EventStreamState, EventStreamStatePart},
};
use std::{
    env,
    ffi::OsString,
    os::unix::net::UnixStream as StdUnixStream,
    sync::{Arc, Weak},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};

pub fn is_available() -> bool {
    socket_path().is_some()
}

/// Opens the event stream, waits for the initial workspace and window lists,
/// and spawns the reader that keeps the returned service up to date.
pub async fn connect() -> Result<Arc<CompositorService>> {
    let socket = socket_path()
        .ok_or_else(|| anyhow!("NIRI_SOCKET or NIRI_SOCKET_PATH environment variable not set"))?;
    let mut stream = open(&socket).await?;

    let request_json = serde_json::to_string(&Request::EventStream)? + "\n";
    stream.write_all(request_json.as_bytes()).await?;
    stream.flush().await?;

    let mut reader = BufReader::new(stream);

    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let reply: Reply = serde_json::from_str(&line).context("Failed to parse handshake")?;
    if let Err(e) = reply {
        return Err(anyhow!("Niri refused EventStream: {}", e));
    }

    let _ = reader.get_mut().shutdown().await;

    // niri starts every event stream with the full workspace and window lists
    let mut internal_state = EventStreamState::default();
    let (mut has_workspaces, mut has_windows) = (false, false);
    while !(has_workspaces && has_windows) {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(anyhow!("Niri closed the event stream during startup"));
        }
        let Some(event) = parse_event(&line) else {
            continue;
        };
        match event {
            Event::WorkspacesChanged { .. } => has_workspaces = true,
            Event::WindowsChanged { .. } => has_windows = true,
            _ => {}
        }
        internal_state.apply(event);
    }

    let service = Arc::new(CompositorService::new(
        map_state(&internal_state),
        Box::new(NiriTransport { socket }),
    ));
    info!(
        "Connected to niri: {} workspaces, {} windows",
        internal_state.workspaces.workspaces.len(),
        internal_state.windows.windows.len()
    );

    let weak = Arc::downgrade(&service);
    tokio::spawn(async move {
        if let Err(e) = read_events(reader, internal_state, weak).await {
            error!("Niri event stream failed: {e}");
        }
    });

    Ok(service)
}

/// Name of the output niri currently has focused.
pub async fn focused_output() -> Result<String> {
    let socket = socket_path()
        .ok_or_else(|| anyhow!("NIRI_SOCKET or NIRI_SOCKET_PATH environment variable not set"))?;
    let mut stream = open(&socket).await?;

    match request(&mut stream, &Request::FocusedOutput).await? {
        Ok(Response::FocusedOutput(Some(output))) => Ok(output.name),
        Ok(Response::FocusedOutput(None)) => Err(anyhow!("Niri reports no focused output")),
        Ok(other) => Err(anyhow!("Unexpected reply to FocusedOutput: {other:?}")),
        Err(e) => Err(anyhow!("Niri error: {}", e)),
    }
}

async fn read_events(
    mut reader: BufReader<UnixStream>,
    mut internal_state: EventStreamState,
    service: Weak<CompositorService>,
) -> Result<()> {
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            info!("Niri closed the event stream");
            break;
        }

        let Some(event) = parse_event(&line) else {
            continue;
        };
        let kind = event_kind(&event);
        internal_state.apply(event);

        let Some(service) = service.upgrade() else {
            debug!("No module left listening, stopping the niri reader");
            break;
        };

        if let Some(kind) = kind {
            let state = map_state(&internal_state);
            service.apply(kind, move |current| *current = state);
        }
    }

    Ok(())
}

fn parse_event(line: &str) -> Option<Event> {
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            // niri's IPC is not version bound: new events and fields show up
            // before niri-ipc knows about them
            debug!("Failed to parse Niri event -> {:?}", e);
            None
        }
    }
}

fn event_kind(event: &Event) -> Option<EventKind> {
    match event {
        Event::WorkspacesChanged { .. } => Some(EventKind::WorkspacesChanged),
        Event::WorkspaceActivated { .. } => Some(EventKind::WorkspaceActivated),
        Event::WorkspaceActiveWindowChanged { .. } => {
            Some(EventKind::WorkspaceActiveWindowChanged)
        }
        Event::WindowsChanged { .. } => Some(EventKind::WindowsChanged),
        Event::WindowOpenedOrChanged { .. } => Some(EventKind::WindowOpenedOrChanged),
        Event::WindowClosed { .. } => Some(EventKind::WindowClosed),
        Event::WindowFocusChanged { .. } => Some(EventKind::WindowFocusChanged),
        Event::WindowLayoutsChanged { .. } => Some(EventKind::WindowLayoutsChanged),
        _ => None,
    }
}

fn map_state(niri: &EventStreamState) -> CompositorState {
    let workspaces = niri
        .workspaces
        .workspaces
        .values()
        .sorted_by_key(|w| (w.output.clone(), w.idx))
        .map(|w| Workspace {
            id: w.id,
            output: w.output.clone().unwrap_or_default(),
            is_active: w.is_active,
            active_window_id: w.active_window_id,
        })
        .collect();

    let windows = niri
        .windows
        .windows
        .values()
        .sorted_by_key(|w| w.id)
        .filter_map(|w| {
            Some(Window {
                id: w.id,
                workspace_id: w.workspace_id?,
                app_id: w.app_id.clone(),
                layout: Some(WindowLayout {
                    pos_in_scrolling_layout: w
                        .layout
                        .pos_in_scrolling_layout
                        .map(|(column, index)| (clamp(column), clamp(index))),
                }),
            })
        })
        .collect();

    CompositorState {
        workspaces,
        windows,
    }
}

fn clamp(coordinate: usize) -> u32 {
    u32::try_from(coordinate).unwrap_or(u32::MAX)
}

fn socket_path() -> Option<OsString> {
    env::var_os("NIRI_SOCKET").or_else(|| env::var_os("NIRI_SOCKET_PATH"))
}

async fn open(socket: &OsString) -> Result<UnixStream> {
    let std_stream = StdUnixStream::connect(socket)
        .with_context(|| format!("Failed to connect to niri socket {socket:?}"))?;
    std_stream.set_nonblocking(true)?;
    UnixStream::from_std(std_stream).context("Failed to convert stream")
}

async fn request(stream: &mut UnixStream, request: &Request) -> Result<Reply> {
    let mut json = serde_json::to_string(request)?;
    json.push('\n');
    write_request(stream, json).await
}

async fn write_request(stream: &mut UnixStream, json: String) -> Result<Reply> {
    stream.write_all(json.as_bytes()).await?;
    stream.flush().await?;

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).await?;

    serde_json::from_str(&response_line).context("Failed to parse niri reply")
}

/// Writes each command on its own connection from a spawned task.
struct NiriTransport {
    socket: OsString,
}

impl CommandTransport for NiriTransport {
    fn send(&self, command: serde_json::Value) -> Result<()> {
        let mut json = serde_json::to_string(&command)?;
        json.push('\n');

        let runtime = tokio::runtime::Handle::try_current()
            .context("No tokio runtime to send the niri command on")?;
        let socket = self.socket.clone();
        runtime.spawn(async move {
            let res: Result<()> = async {
                let mut stream = open(&socket).await?;
                write_request(&mut stream, json)
                    .await?
                    .map_err(|e| anyhow!("Niri error: {}", e))
                    .map(|_| ())
            }
            .await;

            if let Err(e) = res {
                error!("Failed to send command {command}: {e}");
            }
        });

        Ok(())
    }
}
